//! Augment and deviation application, plus deferred leafref linking.
//!
//! Both run after the owning module's own tree is compiled and registered:
//! augments may target any compiled module (including the augmenting one),
//! and leafref targets may sit inside augmented subtrees, so leafref
//! resolution comes last.

use std::collections::HashSet;

use super::tree::{compile_bound_expr, compile_data_defs};
use super::{Locals, ModCompile, Scope};
use crate::ast::{AstDeviate, AstNode};
use crate::log::{Error, ValidationCode};
use crate::schema::{Context, ModuleId, NodeFlags, NodeId, SchemaNode, SchemaNodeKind, StrId};
use crate::types::TypeKind;

fn reference_error(ctx: &Context, message: impl Into<String>) -> Error {
    ctx.record_error(
        Error::Validation(ValidationCode::Reference),
        message,
        None,
        None,
    );
    Error::Validation(ValidationCode::Reference)
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

/// Resolve an absolute schema path (`/pfx:a/b/...`) from a scope. Choice and
/// case nodes are explicit steps here, unlike in data paths.
pub(crate) fn resolve_schema_path(
    ctx: &Context,
    scope: &Scope,
    path: &str,
) -> Option<NodeId> {
    let mut current: Option<NodeId> = None;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let (module, name) = match segment.split_once(':') {
            Some((prefix, name)) => (scope.resolve_prefix(ctx, prefix)?, name),
            None => (
                current.map_or(scope.module, |node| ctx.node(node).module),
                segment,
            ),
        };
        let name_id = ctx.dict.find(name)?;
        let candidates: Vec<NodeId> = match current {
            Some(node) => {
                let node = ctx.node(node);
                let mut all = node.children().to_vec();
                if let SchemaNodeKind::Rpc { input, output } = &node.kind {
                    all.extend_from_slice(input);
                    all.extend_from_slice(output);
                }
                all
            }
            None => {
                let m = &ctx.modules[module.to_index()];
                let mut all = m.children.clone();
                all.extend_from_slice(&m.rpcs);
                all.extend_from_slice(&m.notifications);
                all
            }
        };
        current = candidates.into_iter().find(|&cand| {
            let node = ctx.node(cand);
            node.name == name_id && node.module == module
        });
        current?;
    }
    current
}

/// Apply all top-level augments of the module being finalized.
pub(crate) fn apply_augments(ctx: &mut Context, mc: &mut ModCompile) -> Result<(), Error> {
    let augments = ctx.modules[mc.id.to_index()].parsed.augments.clone();
    let scope = Scope::of_module(ctx, mc.id);

    for augment in &augments {
        if !scope.features_satisfied(ctx, &augment.if_features) {
            continue;
        }
        let Some(target) = resolve_schema_path(ctx, &scope, &augment.target) else {
            return Err(reference_error(
                ctx,
                format!("augment target \"{}\" not found", augment.target),
            ));
        };

        let target_config = ctx.node(target).flags.contains(NodeFlags::CONFIG);
        let target_is_choice = matches!(ctx.node(target).kind, SchemaNodeKind::Choice { .. });
        let target_holds_children = matches!(
            ctx.node(target).kind,
            SchemaNodeKind::Container { .. }
                | SchemaNodeKind::List { .. }
                | SchemaNodeKind::Case { .. }
                | SchemaNodeKind::Notification { .. }
        );
        let mut locals = Locals::default();

        let added = if target_is_choice {
            augment_choice(
                ctx,
                mc,
                &scope,
                &mut locals,
                &augment.children,
                target,
                target_config,
            )?
        } else if target_holds_children {
            compile_data_defs(
                ctx,
                mc,
                &scope,
                &mut locals,
                &augment.children,
                Some(target),
                mc.id,
                target_config,
            )?
        } else {
            return Err(semantic_error(
                ctx,
                format!("augment target \"{}\" cannot hold children", augment.target),
            ));
        };

        // An augment's when gates every added node; the compiled condition
        // is shared across them and evaluates with the target as context.
        if let Some(cond) = &augment.when {
            let mut bound = compile_bound_expr(ctx, &scope, cond)?;
            bound.parent_ctx = true;
            for &node in &added {
                ctx.nodes[node.to_index()].when.push(bound.clone());
            }
        }

        match &mut ctx.nodes[target.to_index()].kind {
            SchemaNodeKind::Container { children }
            | SchemaNodeKind::List { children, .. }
            | SchemaNodeKind::Case { children }
            | SchemaNodeKind::Notification { children } => children.extend(added.iter().copied()),
            SchemaNodeKind::Choice { cases, .. } => cases.extend(added.iter().copied()),
            _ => {}
        }

        let target_module = ctx.node(target).module;
        if target_module != mc.id {
            let back_refs = &mut ctx.modules[target_module.to_index()].augmented_by;
            if !back_refs.contains(&mc.id) {
                back_refs.push(mc.id);
            }
        }
    }
    Ok(())
}

/// Augmenting a choice adds cases; shorthand children get an implicit case.
fn augment_choice(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    children: &[AstNode],
    target: NodeId,
    target_config: bool,
) -> Result<Vec<NodeId>, Error> {
    let mut cases = Vec::new();
    for ast in children {
        match ast {
            AstNode::Case(case) => {
                if !scope.features_satisfied(ctx, &case.common.if_features) {
                    continue;
                }
                let case_name = ctx.intern(&case.common.name);
                let case_id = NodeId::from_index(ctx.nodes.len()).expect("node arena overflow");
                ctx.nodes.push(SchemaNode {
                    name: case_name,
                    module: mc.id,
                    parent: Some(target),
                    flags: NodeFlags::default(),
                    when: Vec::new(),
                    musts: Vec::new(),
                    exts: Vec::new(),
                    kind: SchemaNodeKind::Case {
                        children: Vec::new(),
                    },
                });
                let case_children = compile_data_defs(
                    ctx,
                    mc,
                    scope,
                    locals,
                    &case.children,
                    Some(case_id),
                    mc.id,
                    target_config,
                )?;
                ctx.nodes[case_id.to_index()].kind = SchemaNodeKind::Case {
                    children: case_children,
                };
                cases.push(case_id);
            }
            shorthand => {
                let name = ctx.intern(&shorthand.common().name);
                let case_id = NodeId::from_index(ctx.nodes.len()).expect("node arena overflow");
                ctx.nodes.push(SchemaNode {
                    name,
                    module: mc.id,
                    parent: Some(target),
                    flags: NodeFlags::default(),
                    when: Vec::new(),
                    musts: Vec::new(),
                    exts: Vec::new(),
                    kind: SchemaNodeKind::Case {
                        children: Vec::new(),
                    },
                });
                let case_children = compile_data_defs(
                    ctx,
                    mc,
                    scope,
                    locals,
                    core::slice::from_ref(shorthand),
                    Some(case_id),
                    mc.id,
                    target_config,
                )?;
                if case_children.is_empty() {
                    continue;
                }
                ctx.nodes[case_id.to_index()].kind = SchemaNodeKind::Case {
                    children: case_children,
                };
                cases.push(case_id);
            }
        }
    }
    Ok(cases)
}

/// Apply all deviations of the module being finalized.
#[allow(clippy::too_many_lines)]
pub(crate) fn apply_deviations(ctx: &mut Context, mc: &mut ModCompile) -> Result<(), Error> {
    let deviations = ctx.modules[mc.id.to_index()].parsed.deviations.clone();
    let scope = Scope::of_module(ctx, mc.id);
    // (target, property) pairs already touched; a second touch conflicts.
    let mut touched: HashSet<(NodeId, &'static str)> = HashSet::new();
    let mut touch = |ctx: &Context, target: NodeId, property: &'static str| -> Result<(), Error> {
        if touched.insert((target, property)) {
            Ok(())
        } else {
            ctx.record_error(
                Error::Exists,
                format!("conflicting deviations of property \"{property}\""),
                Some(ctx.schema_path(target)),
                None,
            );
            Err(Error::Exists)
        }
    };

    for deviation in &deviations {
        let Some(target) = resolve_schema_path(ctx, &scope, &deviation.target) else {
            return Err(reference_error(
                ctx,
                format!("deviation target \"{}\" not found", deviation.target),
            ));
        };
        let target_module = ctx.node(target).module;

        for deviate in &deviation.deviates {
            match deviate {
                AstDeviate::NotSupported => {
                    touch(ctx, target, "existence")?;
                    remove_from_parent(ctx, target);
                }
                AstDeviate::Add(props) | AstDeviate::Replace(props) => {
                    let replacing = matches!(deviate, AstDeviate::Replace(_));

                    if let Some(ast_type) = &props.ty {
                        if !replacing {
                            return Err(semantic_error(
                                ctx,
                                "\"deviate add\" cannot add a type",
                            ));
                        }
                        touch(ctx, target, "type")?;
                        let mut locals = Locals::default();
                        let new_ty = match super::types::resolve_type(
                            ctx, mc, &scope, &mut locals, ast_type,
                        ) {
                            Ok(ty) => ty,
                            Err(Error::NotFound) => {
                                return Err(reference_error(
                                    ctx,
                                    format!("unknown type \"{}\" in deviation", ast_type.name),
                                ));
                            }
                            Err(err) => return Err(err),
                        };
                        let new_ty = super::types::clone_leafref_for_use(ctx, new_ty);
                        if ctx.types[new_ty.to_index()].kind == TypeKind::Leafref {
                            mc.pending_leafrefs.push((target, new_ty));
                        }
                        if !ctx.node(target).is_leafy() {
                            return Err(semantic_error(
                                ctx,
                                "type deviation requires a leaf or leaf-list target",
                            ));
                        }
                        if let SchemaNodeKind::Leaf { ty, .. }
                        | SchemaNodeKind::LeafList { ty, .. } =
                            &mut ctx.nodes[target.to_index()].kind
                        {
                            *ty = new_ty;
                        }
                    }

                    if let Some(units_value) = &props.units {
                        touch(ctx, target, "units")?;
                        let existing = match &ctx.node(target).kind {
                            SchemaNodeKind::Leaf { units, .. }
                            | SchemaNodeKind::LeafList { units, .. } => units.is_some(),
                            _ => {
                                return Err(semantic_error(
                                    ctx,
                                    "units deviation requires a leaf or leaf-list target",
                                ));
                            }
                        };
                        if !replacing && existing {
                            return Err(semantic_error(
                                ctx,
                                "\"deviate add\" of \"units\" that already exist",
                            ));
                        }
                        let units_id = ctx.intern(units_value);
                        if let SchemaNodeKind::Leaf { units, .. }
                        | SchemaNodeKind::LeafList { units, .. } =
                            &mut ctx.nodes[target.to_index()].kind
                        {
                            *units = Some(units_id);
                        }
                    }

                    if !props.musts.is_empty() {
                        touch(ctx, target, "must")?;
                        if replacing {
                            return Err(semantic_error(
                                ctx,
                                "\"deviate replace\" cannot replace \"must\"",
                            ));
                        }
                        let musts = super::tree::compile_bound_musts(ctx, &scope, &props.musts)?;
                        ctx.nodes[target.to_index()].musts.extend(musts);
                    }

                    if !props.defaults.is_empty() {
                        touch(ctx, target, "default")?;
                        let leaf_default_exists = match &ctx.node(target).kind {
                            SchemaNodeKind::Leaf { default, .. } => default.is_some(),
                            SchemaNodeKind::LeafList { .. } => false,
                            _ => {
                                return Err(semantic_error(
                                    ctx,
                                    "default deviation requires a leaf or leaf-list target",
                                ));
                            }
                        };
                        if !replacing && leaf_default_exists {
                            return Err(semantic_error(
                                ctx,
                                "\"deviate add\" of \"default\" that already exists",
                            ));
                        }
                        let values: Vec<StrId> = props
                            .defaults
                            .iter()
                            .map(|value| ctx.intern(value))
                            .collect();
                        match &mut ctx.nodes[target.to_index()].kind {
                            SchemaNodeKind::Leaf { default, .. } => *default = Some(values[0]),
                            SchemaNodeKind::LeafList { defaults, .. } => {
                                if replacing {
                                    *defaults = values;
                                } else {
                                    defaults.extend(values);
                                }
                            }
                            _ => {}
                        }
                    }

                    if let Some(config) = props.config {
                        touch(ctx, target, "config")?;
                        set_config_recursive(ctx, target, config);
                    }

                    if let Some(mandatory) = props.mandatory {
                        touch(ctx, target, "mandatory")?;
                        let flags = &mut ctx.nodes[target.to_index()].flags;
                        if mandatory {
                            flags.insert(NodeFlags::MANDATORY);
                        } else {
                            flags.remove(NodeFlags::MANDATORY);
                        }
                    }

                    if props.min_elements.is_some() || props.max_elements.is_some() {
                        let multi = matches!(
                            ctx.node(target).kind,
                            SchemaNodeKind::LeafList { .. } | SchemaNodeKind::List { .. }
                        );
                        if !multi {
                            return Err(semantic_error(
                                ctx,
                                "min/max-elements deviation requires a list or leaf-list target",
                            ));
                        }
                    }
                    if let Some(min) = props.min_elements {
                        touch(ctx, target, "min-elements")?;
                        if let SchemaNodeKind::LeafList { min_elements, .. }
                        | SchemaNodeKind::List { min_elements, .. } =
                            &mut ctx.nodes[target.to_index()].kind
                        {
                            *min_elements = min;
                        }
                    }
                    if props.max_elements.is_some() {
                        touch(ctx, target, "max-elements")?;
                        if let SchemaNodeKind::LeafList { max_elements, .. }
                        | SchemaNodeKind::List { max_elements, .. } =
                            &mut ctx.nodes[target.to_index()].kind
                        {
                            *max_elements = props.max_elements;
                        }
                    }
                }
                AstDeviate::Delete(props) => {
                    if props.units.is_some() {
                        touch(ctx, target, "units")?;
                        match &mut ctx.nodes[target.to_index()].kind {
                            SchemaNodeKind::Leaf { units, .. }
                            | SchemaNodeKind::LeafList { units, .. } => *units = None,
                            _ => {}
                        }
                    }
                    if !props.defaults.is_empty() {
                        touch(ctx, target, "default")?;
                        let values: Vec<StrId> = props
                            .defaults
                            .iter()
                            .map(|value| ctx.intern(value))
                            .collect();
                        match &mut ctx.nodes[target.to_index()].kind {
                            SchemaNodeKind::Leaf { default, .. } => {
                                if values.first() == default.as_ref() {
                                    *default = None;
                                }
                            }
                            SchemaNodeKind::LeafList { defaults, .. } => {
                                defaults.retain(|d| !values.contains(d));
                            }
                            _ => {}
                        }
                    }
                    if !props.musts.is_empty() {
                        touch(ctx, target, "must")?;
                        let conds: Vec<String> =
                            props.musts.iter().map(|m| m.cond.clone()).collect();
                        let node = &mut ctx.nodes[target.to_index()];
                        let exprs = &ctx.exprs;
                        node.musts.retain(|must| {
                            !conds.contains(&exprs[must.cond.expr.to_index()].source)
                        });
                    }
                    if !props.uniques.is_empty() {
                        touch(ctx, target, "unique")?;
                        // Unique groups are matched by arity only; deleting
                        // by exact path text would require keeping the
                        // original arguments around.
                        if let SchemaNodeKind::List { uniques, .. } =
                            &mut ctx.nodes[target.to_index()].kind
                        {
                            for unique in &props.uniques {
                                let arity = unique.split_whitespace().count();
                                if let Some(pos) =
                                    uniques.iter().position(|group| group.len() == arity)
                                {
                                    uniques.remove(pos);
                                }
                            }
                        }
                    }
                }
            }
        }

        if target_module != mc.id {
            let back_refs = &mut ctx.modules[target_module.to_index()].deviated_by;
            if !back_refs.contains(&mc.id) {
                back_refs.push(mc.id);
            }
        }
    }
    Ok(())
}

fn remove_from_parent(ctx: &mut Context, target: NodeId) {
    match ctx.node(target).parent {
        Some(parent) => match &mut ctx.nodes[parent.to_index()].kind {
            SchemaNodeKind::Container { children }
            | SchemaNodeKind::List { children, .. }
            | SchemaNodeKind::Case { children }
            | SchemaNodeKind::Notification { children } => {
                children.retain(|&child| child != target);
            }
            SchemaNodeKind::Choice { cases, default_case } => {
                cases.retain(|&case| case != target);
                if *default_case == Some(target) {
                    *default_case = None;
                }
            }
            _ => {}
        },
        None => {
            let module = ctx.node(target).module;
            let module = &mut ctx.modules[module.to_index()];
            module.children.retain(|&child| child != target);
            module.rpcs.retain(|&child| child != target);
            module.notifications.retain(|&child| child != target);
        }
    }
}

fn set_config_recursive(ctx: &mut Context, node: NodeId, config: bool) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        let n = &mut ctx.nodes[current.to_index()];
        if config {
            n.flags.insert(NodeFlags::CONFIG);
        } else {
            n.flags.remove(NodeFlags::CONFIG);
        }
        stack.extend_from_slice(ctx.nodes[current.to_index()].children());
    }
}

/// Resolve pending leafref targets. Deferred to the end of module
/// finalization because targets may live in subtrees added by augments.
pub(crate) fn resolve_leafrefs(ctx: &mut Context, mc: &mut ModCompile) -> Result<(), Error> {
    let pending = std::mem::take(&mut mc.pending_leafrefs);
    for (leaf, ty) in pending {
        let Some(info) = ctx.types[ty.to_index()].leafref.clone() else {
            continue;
        };
        let path_text = ctx.exprs[info.path.to_index()].source.clone();
        let target = resolve_leafref_target(ctx, leaf, &path_text, &info.prefixes, info.cur_module);
        let Some(target) = target else {
            ctx.record_error(
                Error::Validation(ValidationCode::Reference),
                format!("leafref path \"{path_text}\" does not point at a leaf"),
                Some(ctx.schema_path(leaf)),
                None,
            );
            return Err(Error::Validation(ValidationCode::Reference));
        };
        if let Some(leafref) = ctx.types[ty.to_index()].leafref.as_mut() {
            leafref.target = Some(target);
        }
    }
    Ok(())
}

/// Walk a leafref path over the compiled schema. Predicates are irrelevant
/// to the target's schema node and are skipped; choice/case are transparent,
/// as in any data path.
fn resolve_leafref_target(
    ctx: &Context,
    leaf: NodeId,
    path: &str,
    prefixes: &[(StrId, ModuleId)],
    cur_module: ModuleId,
) -> Option<NodeId> {
    let stripped = strip_predicates(path);
    let absolute = stripped.starts_with('/');
    let mut current: Option<NodeId> = if absolute { None } else { Some(leaf) };
    let mut module_hint = cur_module;

    for segment in stripped.split('/').filter(|s| !s.is_empty()) {
        if segment == ".." {
            current = data_parent(ctx, current?);
            continue;
        }
        let (module, name) = match segment.split_once(':') {
            Some((prefix, name)) => {
                let prefix_id = ctx.dict.find(prefix)?;
                let module = prefixes
                    .iter()
                    .find(|(p, _)| *p == prefix_id)
                    .map(|&(_, m)| m)?;
                (module, name)
            }
            None => (module_hint, segment),
        };
        module_hint = module;
        let name_id = ctx.dict.find(name)?;
        let candidates = match current {
            Some(node) => ctx.data_children(Some(node), None),
            None => ctx.data_children(None, Some(module)),
        };
        current = candidates.into_iter().find(|&cand| {
            let node = ctx.node(cand);
            node.name == name_id && node.module == module
        });
        current?;
    }

    let target = current?;
    ctx.node(target).is_leafy().then_some(target)
}

/// Parent in the data sense: choice and case nodes are skipped.
fn data_parent(ctx: &Context, node: NodeId) -> Option<NodeId> {
    let mut current = ctx.node(node).parent;
    while let Some(parent) = current {
        match ctx.node(parent).kind {
            SchemaNodeKind::Choice { .. } | SchemaNodeKind::Case { .. } => {
                current = ctx.node(parent).parent;
            }
            _ => return Some(parent),
        }
    }
    None
}

fn strip_predicates(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for ch in path.chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_predicates() {
        assert_eq!(
            strip_predicates("/a:b[key = current()/../x]/a:c"),
            "/a:b/a:c"
        );
        assert_eq!(strip_predicates("../name"), "../name");
        assert_eq!(strip_predicates("a[b[c]]/d"), "a/d");
    }
}
