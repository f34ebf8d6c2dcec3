//! Type resolution during compilation.
//!
//! Every `type` statement resolves to a compiled type in the context arena.
//! An unrestricted reference reuses the referent; restrictions create a new
//! derived entry whose constraints were checked against the base
//! (monotonic tightening).

use std::collections::HashSet;

use super::{resolve_identity_in_scope, Locals, ModCompile, Scope};
use crate::ast::{AstType, AstTypedef, ParsedModule};
use crate::log::{Error, ValidationCode};
use crate::schema::{Context, TypeId};
use crate::types::{
    compile_pattern, parse_decimal64, parse_parts, CompiledPattern, CompiledType, LeafrefInfo,
    TypeKind,
};

/// Compile all module-level typedefs. Typedefs may reference each other in
/// any source order, so unresolved ones are retried until a pass makes no
/// progress.
pub(crate) fn compile_module_typedefs(
    ctx: &mut Context,
    mc: &mut ModCompile,
    parsed: &ParsedModule,
) -> Result<(), Error> {
    let mut remaining: Vec<usize> = (0..parsed.typedefs.len()).collect();
    let mut names = HashSet::new();
    for typedef in &parsed.typedefs {
        if !names.insert(typedef.name.as_str()) {
            ctx.record_error(
                Error::Exists,
                format!("duplicate typedef \"{}\"", typedef.name),
                None,
                None,
            );
            return Err(Error::Exists);
        }
    }

    while !remaining.is_empty() {
        let before = remaining.len();
        let mut unresolved = Vec::new();

        for idx in remaining {
            let typedef = &parsed.typedefs[idx];
            let scope = Scope::current(mc, parsed);
            let mut locals = Locals::default();
            match resolve_type(ctx, mc, &scope, &mut locals, &typedef.ty) {
                Ok(base_id) => {
                    let name = ctx.intern(&typedef.name);
                    let default = typedef.default.as_deref().map(|d| ctx.intern(d));
                    let mut compiled = ctx.types[base_id.to_index()].clone();
                    compiled.name = Some(name);
                    compiled.module = Some(mc.id);
                    compiled.base = Some(base_id);
                    if default.is_some() {
                        compiled.default = default;
                    }
                    let id = TypeId::from_index(ctx.types.len()).expect("type arena overflow");
                    ctx.types.push(compiled);
                    mc.typedefs.push((name, id));
                }
                Err(Error::NotFound) => unresolved.push(idx),
                Err(err) => return Err(err),
            }
        }

        if unresolved.len() == before {
            let typedef = &parsed.typedefs[unresolved[0]];
            ctx.record_error(
                Error::Validation(ValidationCode::Reference),
                format!(
                    "type \"{}\" of typedef \"{}\" not found or circular",
                    typedef.ty.name, typedef.name
                ),
                None,
                None,
            );
            return Err(Error::Validation(ValidationCode::Reference));
        }
        remaining = unresolved;
    }
    Ok(())
}

/// Compile statement-local typedefs (container, list, grouping, rpc,
/// notification scopes) into one scope frame. Local typedefs may reference
/// each other in any order.
pub(crate) fn compile_local_typedefs_into(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    typedefs: &[AstTypedef],
) -> Result<Vec<(String, TypeId)>, Error> {
    let mut frame: Vec<(String, TypeId)> = Vec::new();
    let mut remaining: Vec<&AstTypedef> = typedefs.iter().collect();

    while !remaining.is_empty() {
        let before = remaining.len();
        let mut unresolved = Vec::new();

        for typedef in remaining {
            let mut locals = Locals::default();
            locals.typedefs.push(frame.clone());
            match resolve_type(ctx, mc, scope, &mut locals, &typedef.ty) {
                Ok(base_id) => {
                    let name = ctx.intern(&typedef.name);
                    let default = typedef.default.as_deref().map(|d| ctx.intern(d));
                    let mut compiled = ctx.types[base_id.to_index()].clone();
                    compiled.name = Some(name);
                    compiled.module = Some(mc.id);
                    compiled.base = Some(base_id);
                    if default.is_some() {
                        compiled.default = default;
                    }
                    let id = TypeId::from_index(ctx.types.len()).expect("type arena overflow");
                    ctx.types.push(compiled);
                    frame.push((typedef.name.clone(), id));
                }
                Err(Error::NotFound) => unresolved.push(typedef),
                Err(err) => return Err(err),
            }
        }

        if unresolved.len() == before {
            let typedef = unresolved[0];
            ctx.record_error(
                Error::Validation(ValidationCode::Reference),
                format!(
                    "type \"{}\" of typedef \"{}\" not found or circular",
                    typedef.ty.name, typedef.name
                ),
                None,
                None,
            );
            return Err(Error::Validation(ValidationCode::Reference));
        }
        remaining = unresolved;
    }
    Ok(frame)
}

fn has_restrictions(ast: &AstType) -> bool {
    ast.range.is_some()
        || ast.length.is_some()
        || !ast.patterns.is_empty()
        || ast.fraction_digits.is_some()
        || ast.path.is_some()
        || ast.require_instance.is_some()
        || !ast.bases.is_empty()
        || !ast.enums.is_empty()
        || !ast.bits.is_empty()
        || !ast.union.is_empty()
}

/// Shared handle for an unrestricted built-in.
fn builtin_type(ctx: &mut Context, kind: TypeKind) -> TypeId {
    if let Some(&id) = ctx.builtin_types.get(&kind) {
        return id;
    }
    let id = TypeId::from_index(ctx.types.len()).expect("type arena overflow");
    ctx.types.push(CompiledType::plain(kind));
    ctx.builtin_types.insert(kind, id);
    id
}

/// Resolve a `type` statement to a compiled type.
///
/// Lookup order for unprefixed non-built-in names: statement-local typedef
/// scopes innermost first, then the scope module's typedefs. `NotFound` is
/// returned (without recording) when the referent is simply not known yet;
/// callers with retry loops rely on that.
pub(crate) fn resolve_type(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    ast: &AstType,
) -> Result<TypeId, Error> {
    enum Base {
        Builtin(TypeKind),
        Derived(TypeId),
    }

    let base = match ast.name.split_once(':') {
        Some((prefix, local)) => {
            let Some(module) = scope.resolve_prefix(ctx, prefix) else {
                ctx.record_error(
                    Error::Validation(ValidationCode::Reference),
                    format!("unknown prefix in type \"{}\"", ast.name),
                    None,
                    None,
                );
                return Err(Error::Validation(ValidationCode::Reference));
            };
            if module == scope.module {
                match find_local_typedef(ctx, mc, scope, locals, local) {
                    Some(id) => Base::Derived(id),
                    None => return Err(Error::NotFound),
                }
            } else {
                let name_id = ctx.dict.find(local);
                let found = name_id.and_then(|name_id| {
                    ctx.modules[module.to_index()]
                        .typedefs
                        .iter()
                        .find(|(n, _)| *n == name_id)
                        .map(|&(_, id)| id)
                });
                match found {
                    Some(id) => Base::Derived(id),
                    None => return Err(Error::NotFound),
                }
            }
        }
        None => match TypeKind::from_name(&ast.name) {
            Some(kind) => Base::Builtin(kind),
            None => match find_local_typedef(ctx, mc, scope, locals, &ast.name) {
                Some(id) => Base::Derived(id),
                None => return Err(Error::NotFound),
            },
        },
    };

    if !has_restrictions(ast) {
        return Ok(match base {
            Base::Builtin(kind) => {
                if kind == TypeKind::Decimal64 {
                    ctx.record_error(
                        Error::Validation(ValidationCode::Semantics),
                        "decimal64 requires \"fraction-digits\"",
                        None,
                        None,
                    );
                    return Err(Error::Validation(ValidationCode::Semantics));
                }
                builtin_type(ctx, kind)
            }
            Base::Derived(id) => id,
        });
    }

    let (mut derived, base_id) = match base {
        Base::Builtin(kind) => (CompiledType::plain(kind), None),
        Base::Derived(id) => {
            let mut compiled = ctx.types[id.to_index()].clone();
            compiled.name = None;
            compiled.module = None;
            compiled.base = Some(id);
            (compiled, Some(id))
        }
    };
    let is_builtin_base = base_id.is_none();

    apply_restrictions(ctx, mc, scope, locals, ast, &mut derived, is_builtin_base)?;

    let id = TypeId::from_index(ctx.types.len()).expect("type arena overflow");
    ctx.types.push(derived);
    Ok(id)
}

fn find_local_typedef(
    ctx: &Context,
    mc: &ModCompile,
    scope: &Scope,
    locals: &Locals,
    name: &str,
) -> Option<TypeId> {
    for frame in locals.typedefs.iter().rev() {
        if let Some((_, id)) = frame.iter().find(|(n, _)| n == name) {
            return Some(*id);
        }
    }
    let name_id = ctx.dict.find(name)?;
    let module_typedefs = if scope.module == mc.id {
        &mc.typedefs
    } else {
        &scope.module_typedefs
    };
    module_typedefs
        .iter()
        .find(|(n, _)| *n == name_id)
        .map(|&(_, id)| id)
}

fn semantic_error(ctx: &Context, message: impl Into<String>) -> Error {
    ctx.record_error(
        Error::Validation(ValidationCode::Semantics),
        message,
        None,
        None,
    );
    Error::Validation(ValidationCode::Semantics)
}

#[allow(clippy::too_many_lines)]
fn apply_restrictions(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    ast: &AstType,
    derived: &mut CompiledType,
    base_is_builtin: bool,
) -> Result<(), Error> {
    let kind = derived.kind;

    // fraction-digits: mandatory when the base is the bare decimal64
    // built-in, immutable afterwards.
    match (kind, ast.fraction_digits, base_is_builtin) {
        (TypeKind::Decimal64, Some(digits), true) => derived.fraction_digits = digits,
        (TypeKind::Decimal64, None, true) => {
            return Err(semantic_error(ctx, "decimal64 requires \"fraction-digits\""));
        }
        (TypeKind::Decimal64, Some(_), false) => {
            return Err(semantic_error(
                ctx,
                "\"fraction-digits\" cannot be changed in a derived type",
            ));
        }
        (_, Some(_), _) => {
            return Err(semantic_error(ctx, "\"fraction-digits\" requires decimal64"));
        }
        _ => {}
    }

    if let Some(range) = &ast.range {
        let base_parts = effective_range(derived);
        let new_parts = match kind {
            k if k.is_integer() => parse_parts(range, &base_parts, |s| s.parse::<i128>().ok()),
            TypeKind::Decimal64 => {
                let digits = derived.fraction_digits;
                parse_parts(range, &base_parts, |s| parse_decimal64(s, digits))
            }
            _ => return Err(semantic_error(ctx, "\"range\" requires a numeric type")),
        };
        match new_parts {
            Ok(parts) => derived.range = parts,
            Err(err) => {
                return Err(semantic_error(
                    ctx,
                    format!("invalid \"range\" of type \"{}\": {err}", ast.name),
                ));
            }
        }
    }

    if let Some(length) = &ast.length {
        if !matches!(kind, TypeKind::String | TypeKind::Binary) {
            return Err(semantic_error(ctx, "\"length\" requires string or binary"));
        }
        let base_parts = if derived.length.is_empty() {
            vec![(0u64, u64::MAX)]
        } else {
            derived.length.clone()
        };
        match parse_parts(length, &base_parts, |s| s.parse::<u64>().ok()) {
            Ok(parts) => derived.length = parts,
            Err(err) => {
                return Err(semantic_error(
                    ctx,
                    format!("invalid \"length\" of type \"{}\": {err}", ast.name),
                ));
            }
        }
    }

    for pattern in &ast.patterns {
        if kind != TypeKind::String {
            return Err(semantic_error(ctx, "\"pattern\" requires a string type"));
        }
        let regex = match compile_pattern(&pattern.expr) {
            Ok(regex) => regex,
            Err(err) => {
                return Err(semantic_error(
                    ctx,
                    format!("invalid pattern \"{}\": {err}", pattern.expr),
                ));
            }
        };
        let source = ctx.intern(&pattern.expr);
        let error_message = pattern.error_message.as_deref().map(|m| ctx.intern(m));
        let error_app_tag = pattern.error_app_tag.as_deref().map(|t| ctx.intern(t));
        // Derived patterns intersect with the base's: all must match.
        derived.patterns.push(CompiledPattern {
            source,
            regex,
            invert: pattern.invert,
            error_message,
            error_app_tag,
        });
    }

    if !ast.enums.is_empty() {
        if kind != TypeKind::Enumeration {
            return Err(semantic_error(ctx, "\"enum\" requires an enumeration type"));
        }
        let base_items = derived.enums.clone();
        let mut items = Vec::with_capacity(ast.enums.len());
        let mut next_value: i32 = 0;
        for item in &ast.enums {
            let name = ctx.intern(&item.name);
            if base_items.is_empty() {
                // Fresh enumeration: canonical value assignment.
                let value = item.value.unwrap_or(next_value);
                next_value = value.saturating_add(1);
                if items.iter().any(|&(n, _)| n == name) {
                    return Err(semantic_error(
                        ctx,
                        format!("duplicate enum \"{}\"", item.name),
                    ));
                }
                items.push((name, value));
            } else {
                // Derived enumeration: subset of the base, values must agree.
                let Some(&(_, base_value)) = base_items.iter().find(|&&(n, _)| n == name) else {
                    return Err(semantic_error(
                        ctx,
                        format!("enum \"{}\" is not part of the base type", item.name),
                    ));
                };
                if item.value.is_some_and(|v| v != base_value) {
                    return Err(semantic_error(
                        ctx,
                        format!("enum \"{}\" changes its base value", item.name),
                    ));
                }
                items.push((name, base_value));
            }
        }
        derived.enums = items;
    } else if kind == TypeKind::Enumeration && base_is_builtin {
        return Err(semantic_error(ctx, "enumeration requires \"enum\" items"));
    }

    if !ast.bits.is_empty() {
        if kind != TypeKind::Bits {
            return Err(semantic_error(ctx, "\"bit\" requires a bits type"));
        }
        let base_items = derived.bits.clone();
        let mut items = Vec::with_capacity(ast.bits.len());
        let mut next_position: u32 = 0;
        for item in &ast.bits {
            let name = ctx.intern(&item.name);
            if base_items.is_empty() {
                let position = item.position.unwrap_or(next_position);
                next_position = position.saturating_add(1);
                if items.iter().any(|&(n, _)| n == name) {
                    return Err(semantic_error(
                        ctx,
                        format!("duplicate bit \"{}\"", item.name),
                    ));
                }
                items.push((name, position));
            } else {
                let Some(&(_, base_position)) = base_items.iter().find(|&&(n, _)| n == name)
                else {
                    return Err(semantic_error(
                        ctx,
                        format!("bit \"{}\" is not part of the base type", item.name),
                    ));
                };
                if item.position.is_some_and(|p| p != base_position) {
                    return Err(semantic_error(
                        ctx,
                        format!("bit \"{}\" changes its base position", item.name),
                    ));
                }
                items.push((name, base_position));
            }
        }
        derived.bits = items;
    } else if kind == TypeKind::Bits && base_is_builtin {
        return Err(semantic_error(ctx, "bits requires \"bit\" items"));
    }

    if !ast.union.is_empty() {
        if kind != TypeKind::Union || !base_is_builtin {
            return Err(semantic_error(
                ctx,
                "union members can only be declared on the union built-in",
            ));
        }
        // Members compile first, in declared order.
        for member in &ast.union {
            let member_id = resolve_type(ctx, mc, scope, locals, member)?;
            derived.union.push(member_id);
        }
    } else if kind == TypeKind::Union && base_is_builtin {
        return Err(semantic_error(ctx, "union requires member types"));
    }

    if let Some(path) = &ast.path {
        if kind != TypeKind::Leafref || !base_is_builtin {
            return Err(semantic_error(ctx, "\"path\" requires the leafref built-in"));
        }
        let expr = match ctx.add_expr(path) {
            Ok(expr) => expr,
            Err(err) => {
                ctx.record_error(
                    Error::Validation(ValidationCode::Xpath),
                    format!("invalid leafref path \"{path}\": {}", err.message),
                    None,
                    None,
                );
                return Err(Error::Validation(ValidationCode::Xpath));
            }
        };
        derived.leafref = Some(LeafrefInfo {
            path: expr,
            prefixes: scope.prefix_table(),
            cur_module: scope.module,
            require_instance: ast.require_instance.unwrap_or(true),
            target: None,
        });
    } else if kind == TypeKind::Leafref && base_is_builtin {
        return Err(semantic_error(ctx, "leafref requires a \"path\""));
    } else if let (Some(require), Some(leafref)) =
        (ast.require_instance, derived.leafref.as_mut())
    {
        leafref.require_instance = require;
    } else if let Some(require) = ast.require_instance {
        if kind != TypeKind::InstanceIdentifier {
            return Err(semantic_error(
                ctx,
                "\"require-instance\" requires leafref or instance-identifier",
            ));
        }
        derived.require_instance = require;
    }

    if !ast.bases.is_empty() {
        if kind != TypeKind::Identityref {
            return Err(semantic_error(ctx, "\"base\" requires an identityref type"));
        }
        for base_name in &ast.bases {
            let extra = mc.identities.clone();
            let Some(identity) = resolve_identity_in_scope(ctx, scope, &extra, base_name) else {
                ctx.record_error(
                    Error::Validation(ValidationCode::Reference),
                    format!("base identity \"{base_name}\" not found"),
                    None,
                    None,
                );
                return Err(Error::Validation(ValidationCode::Reference));
            };
            derived.identity_bases.push(identity);
        }
    } else if kind == TypeKind::Identityref && base_is_builtin {
        return Err(semantic_error(ctx, "identityref requires a \"base\""));
    }

    Ok(())
}

/// The effective range parts of a type: its own restriction if any, else the
/// built-in bounds of its kind.
fn effective_range(ty: &CompiledType) -> Vec<(i128, i128)> {
    if !ty.range.is_empty() {
        return ty.range.clone();
    }
    match ty.kind {
        k if k.is_integer() => vec![k.integer_bounds().expect("integer kind")],
        TypeKind::Decimal64 => vec![(i128::from(i64::MIN), i128::from(i64::MAX))],
        _ => Vec::new(),
    }
}

/// Clone a leafref type for one leaf use site. Leafref targets are
/// position-dependent, so a typedef'd leafref gets a private compiled entry
/// per leaf.
pub(crate) fn clone_leafref_for_use(ctx: &mut Context, ty: TypeId) -> TypeId {
    if ctx.types[ty.to_index()].kind != TypeKind::Leafref {
        return ty;
    }
    let mut compiled = ctx.types[ty.to_index()].clone();
    if compiled.name.is_some() {
        compiled.base = Some(ty);
        compiled.name = None;
        compiled.module = None;
        let id = TypeId::from_index(ctx.types.len()).expect("type arena overflow");
        ctx.types.push(compiled);
        id
    } else {
        ty
    }
}
