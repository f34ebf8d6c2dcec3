//! Schema compiler.
//!
//! Transforms parsed modules into the compiled graph on the context. The
//! pending set is ordered topologically over `import` edges and compiled as
//! one dependency set; each module goes through two phases:
//!
//! 1. features, identities, and module-level typedefs (cross-reference
//!    targets),
//! 2. the data-definition tree, followed by augments, deviations, and the
//!    deferred leafref target resolution.
//!
//! A failure aborts the offending module (and drops the rest of the pending
//! set); previously compiled modules remain valid.

mod augment;
mod tree;
mod types;

use std::collections::{HashMap, HashSet};

use crate::ast::{AstGrouping, ParsedModule, YangVersion};
use crate::log::{Error, ValidationCode};
use crate::schema::{
    Context, ContextOptions, Feature, IdentityId, Import, Module, ModuleId, NodeId, StrId, TypeId,
};
use crate::schema::identity::Identity;

/// Working state while one module compiles.
pub(crate) struct ModCompile {
    pub id: ModuleId,
    pub name: StrId,
    pub prefix: StrId,
    pub yang_version: YangVersion,
    pub imports: Vec<Import>,
    pub typedefs: Vec<(StrId, TypeId)>,
    pub features: Vec<Feature>,
    pub identities: Vec<IdentityId>,
    pub children: Vec<NodeId>,
    pub rpcs: Vec<NodeId>,
    pub notifications: Vec<NodeId>,
    /// Leafref-typed leaves awaiting target resolution.
    pub pending_leafrefs: Vec<(NodeId, TypeId)>,
}

/// Prefix/typedef/grouping scope used while compiling statements. Grouping
/// expansion swaps in the grouping module's scope so embedded expressions and
/// type references resolve as if the statements had stayed in that module.
#[derive(Clone)]
pub(crate) struct Scope {
    /// Module whose namespace unprefixed names resolve to.
    pub module: ModuleId,
    /// The scope module's own prefix.
    pub prefix: StrId,
    /// The scope module's import bindings.
    pub imports: Vec<Import>,
    /// Module-level typedefs visible in this scope.
    pub module_typedefs: Vec<(StrId, TypeId)>,
    /// Module-level groupings visible in this scope.
    pub groupings: Vec<AstGrouping>,
    /// The scope module's features, for `if-feature` evaluation.
    pub features: Vec<Feature>,
}

impl Scope {
    /// Scope of the module currently being compiled.
    pub fn current(mc: &ModCompile, parsed: &ParsedModule) -> Self {
        Self {
            module: mc.id,
            prefix: mc.prefix,
            imports: mc.imports.clone(),
            module_typedefs: mc.typedefs.clone(),
            groupings: parsed.groupings.clone(),
            features: mc.features.clone(),
        }
    }

    /// Scope of an already-compiled module (grouping expansion across an
    /// import).
    pub fn of_module(ctx: &Context, id: ModuleId) -> Self {
        let module = &ctx.modules[id.to_index()];
        Self {
            module: id,
            prefix: module.prefix,
            imports: module.imports.clone(),
            module_typedefs: module.typedefs.clone(),
            groupings: module.parsed.groupings.clone(),
            features: module.features.clone(),
        }
    }

    /// Resolve a prefix to a module within this scope.
    pub fn resolve_prefix(&self, ctx: &Context, prefix: &str) -> Option<ModuleId> {
        let prefix_id = ctx.dict.find(prefix)?;
        if prefix_id == self.prefix {
            return Some(self.module);
        }
        self.imports
            .iter()
            .find(|imp| imp.prefix == prefix_id)
            .map(|imp| imp.module)
    }

    /// Prefix-to-module table for binding compiled expressions.
    pub fn prefix_table(&self) -> Vec<(StrId, ModuleId)> {
        let mut table = vec![(self.prefix, self.module)];
        table.extend(self.imports.iter().map(|imp| (imp.prefix, imp.module)));
        table
    }

    /// Evaluate an `if-feature` list: every named feature must be enabled.
    pub fn features_satisfied(&self, ctx: &Context, if_features: &[String]) -> bool {
        if_features.iter().all(|name| {
            let (module_features, feature_name) = match name.split_once(':') {
                Some((prefix, local)) => {
                    let Some(module) = self.resolve_prefix(ctx, prefix) else {
                        return false;
                    };
                    if module == self.module {
                        (self.features.clone(), local)
                    } else {
                        (ctx.modules[module.to_index()].features.clone(), local)
                    }
                }
                None => (self.features.clone(), name.as_str()),
            };
            let Some(name_id) = ctx.dict.find(feature_name) else {
                return false;
            };
            module_features
                .iter()
                .any(|f| f.name == name_id && f.enabled)
        })
    }
}

/// Nested (statement-local) typedef and grouping scopes.
#[derive(Default)]
pub(crate) struct Locals {
    pub typedefs: Vec<Vec<(String, TypeId)>>,
    pub groupings: Vec<Vec<AstGrouping>>,
}

/// Compile every pending module on the context in dependency order.
pub(crate) fn compile_pending(ctx: &mut Context) -> Result<(), Error> {
    let mut pending = std::mem::take(&mut ctx.pending);
    let submodules = std::mem::take(&mut ctx.pending_submodules);

    // Splice submodules into their owning modules (include semantics).
    for submodule in submodules {
        let Some((owner_name, _)) = submodule.belongs_to.clone() else {
            ctx.record_error(
                Error::Invalid,
                format!("submodule \"{}\" has no \"belongs-to\"", submodule.name),
                None,
                None,
            );
            return Err(Error::Invalid);
        };
        let Some((owner, _, _)) = pending
            .iter_mut()
            .find(|(parsed, _, _)| parsed.name == owner_name)
        else {
            ctx.record_error(
                Error::Invalid,
                format!(
                    "submodule \"{}\" cannot be compiled without its module \"{owner_name}\"",
                    submodule.name
                ),
                None,
                None,
            );
            return Err(Error::Invalid);
        };
        splice_submodule(owner, submodule);
    }

    let order = dependency_order(ctx, &pending)?;
    for idx in order {
        let (parsed, source, implement) = std::mem::replace(
            &mut pending[idx],
            (ParsedModule::default(), None, false),
        );
        compile_module(ctx, parsed, source, implement)?;
    }
    Ok(())
}

fn splice_submodule(owner: &mut ParsedModule, sub: ParsedModule) {
    owner.imports.extend(sub.imports);
    owner.features.extend(sub.features);
    owner.identities.extend(sub.identities);
    owner.typedefs.extend(sub.typedefs);
    owner.groupings.extend(sub.groupings);
    owner.body.extend(sub.body);
    owner.augments.extend(sub.augments);
    owner.deviations.extend(sub.deviations);
    owner.rpcs.extend(sub.rpcs);
    owner.notifications.extend(sub.notifications);
}

/// Topological order of the pending set over import edges. Imports that
/// resolve to already-compiled modules impose no ordering.
fn dependency_order(
    ctx: &Context,
    pending: &[(ParsedModule, Option<String>, bool)],
) -> Result<Vec<usize>, Error> {
    let name_to_idx: HashMap<&str, usize> = pending
        .iter()
        .enumerate()
        .map(|(idx, (parsed, _, _))| (parsed.name.as_str(), idx))
        .collect();

    let mut order = Vec::with_capacity(pending.len());
    let mut state = vec![0u8; pending.len()]; // 0 new, 1 visiting, 2 done

    fn visit(
        idx: usize,
        pending: &[(ParsedModule, Option<String>, bool)],
        name_to_idx: &HashMap<&str, usize>,
        state: &mut [u8],
        order: &mut Vec<usize>,
    ) -> Result<(), String> {
        match state[idx] {
            2 => return Ok(()),
            1 => return Err(pending[idx].0.name.clone()),
            _ => {}
        }
        state[idx] = 1;
        for import in &pending[idx].0.imports {
            if let Some(&dep) = name_to_idx.get(import.module.as_str()) {
                visit(dep, pending, name_to_idx, state, order)?;
            }
        }
        state[idx] = 2;
        order.push(idx);
        Ok(())
    }

    for idx in 0..pending.len() {
        if let Err(name) = visit(idx, pending, &name_to_idx, &mut state, &mut order) {
            ctx.record_error(
                Error::Invalid,
                format!("circular import involving module \"{name}\""),
                None,
                None,
            );
            return Err(Error::Invalid);
        }
    }

    if crate::log::debug_group_enabled(crate::log::DebugGroups::DEPSETS) {
        let names: Vec<_> = order
            .iter()
            .map(|&idx| pending[idx].0.name.as_str())
            .collect();
        crate::log::debug(
            crate::log::DebugGroups::DEPSETS,
            &format!("dependency set order: {names:?}"),
        );
    }
    Ok(order)
}

fn compile_module(
    ctx: &mut Context,
    parsed: ParsedModule,
    source: Option<String>,
    implement: bool,
) -> Result<ModuleId, Error> {
    let implement = implement || ctx.options.contains(ContextOptions::ALL_IMPLEMENTED);

    // At most one revision of a name may be implemented per context.
    if implement {
        if let Some(existing) = ctx.get_module(&parsed.name, None) {
            if existing.implemented {
                ctx.record_error(
                    Error::Exists,
                    format!("module \"{}\" is already implemented", parsed.name),
                    None,
                    None,
                );
                return Err(Error::Exists);
            }
        }
    }

    let id = ModuleId::from_index(ctx.modules.len()).expect("module arena overflow");
    let name = ctx.intern(&parsed.name);
    let revision = latest_revision(&parsed).map(|rev| ctx.intern(&rev));
    let namespace = ctx.intern(parsed.namespace.as_deref().unwrap_or(""));
    let prefix = ctx.intern(parsed.prefix.as_deref().unwrap_or(""));

    if ctx.module_index.contains_key(&(name, revision)) {
        ctx.record_error(
            Error::Exists,
            format!("module \"{}\" is already present in the context", parsed.name),
            None,
            None,
        );
        return Err(Error::Exists);
    }

    // Import resolution.
    let mut imports = Vec::with_capacity(parsed.imports.len());
    for import in &parsed.imports {
        let Some(target) = ctx.get_module(&import.module, import.revision_date.as_deref()) else {
            ctx.record_error(
                Error::NotFound,
                format!(
                    "module \"{}\" imported by \"{}\" is not in the context",
                    import.module, parsed.name
                ),
                None,
                None,
            );
            return Err(Error::NotFound);
        };
        let target_id = target.id;
        let import_prefix = ctx.intern(&import.prefix);
        imports.push(Import {
            prefix: import_prefix,
            module: target_id,
        });
    }

    let mut mc = ModCompile {
        id,
        name,
        prefix,
        yang_version: parsed.yang_version,
        imports,
        typedefs: Vec::new(),
        features: Vec::new(),
        identities: Vec::new(),
        children: Vec::new(),
        rpcs: Vec::new(),
        notifications: Vec::new(),
        pending_leafrefs: Vec::new(),
    };

    // Phase 1: features, identities, typedefs.
    for feature in &parsed.features {
        let feature_name = ctx.intern(&feature.name);
        mc.features.push(Feature {
            name: feature_name,
            enabled: true,
        });
    }

    compile_identities(ctx, &mut mc, &parsed)?;
    types::compile_module_typedefs(ctx, &mut mc, &parsed)?;

    // Phase 2: the data tree.
    let scope = Scope::current(&mc, &parsed);
    let mut locals = Locals::default();
    let children = tree::compile_data_defs(
        ctx,
        &mut mc,
        &scope,
        &mut locals,
        &parsed.body,
        None,
        id,
        true,
    )?;
    mc.children = children;
    for rpc in &parsed.rpcs {
        if let Some(node_id) = tree::compile_rpc(ctx, &mut mc, &scope, &mut locals, rpc, None, id)? {
            mc.rpcs.push(node_id);
        }
    }
    for notification in &parsed.notifications {
        if let Some(node_id) =
            tree::compile_notification(ctx, &mut mc, &scope, &mut locals, notification, None, id)?
        {
            mc.notifications.push(node_id);
        }
    }

    let module = Module {
        id,
        name,
        revision,
        namespace,
        prefix,
        yang_version: parsed.yang_version,
        implemented: implement,
        imports: mc.imports.clone(),
        includes: parsed
            .includes
            .iter()
            .map(|inc| ctx.intern(&inc.module))
            .collect(),
        features: mc.features.clone(),
        identities: mc.identities.clone(),
        typedefs: mc.typedefs.clone(),
        children: mc.children.clone(),
        rpcs: mc.rpcs.clone(),
        notifications: mc.notifications.clone(),
        augmented_by: Vec::new(),
        deviated_by: Vec::new(),
        parsed,
        source,
    };
    ctx.module_index.insert((name, revision), id);
    ctx.ns_index.insert(namespace, id);
    ctx.modules.push(module);

    // Augments, deviations, and deferred leafref linking run with the module
    // registered; roll it back if any of them fail.
    let result = augment::apply_augments(ctx, &mut mc)
        .and_then(|()| augment::apply_deviations(ctx, &mut mc))
        .and_then(|()| augment::resolve_leafrefs(ctx, &mut mc));
    if let Err(err) = result {
        let module = ctx.modules.pop().expect("module just pushed");
        ctx.module_index.shift_remove(&(module.name, module.revision));
        ctx.ns_index.remove(&module.namespace);
        return Err(err);
    }

    Ok(id)
}

fn latest_revision(parsed: &ParsedModule) -> Option<String> {
    parsed
        .revisions
        .iter()
        .map(|rev| rev.date.clone())
        .max()
}

fn compile_identities(
    ctx: &mut Context,
    mc: &mut ModCompile,
    parsed: &ParsedModule,
) -> Result<(), Error> {
    // Identities may reference each other in any order, including bases in
    // other modules; create first, resolve bases second.
    let first_index = ctx.identities.len();
    for ast in &parsed.identities {
        let identity_name = ctx.intern(&ast.name);
        let exists = mc
            .identities
            .iter()
            .any(|&id| ctx.identities[id.to_index()].name == identity_name);
        if exists {
            ctx.record_error(
                Error::Exists,
                format!("duplicate identity \"{}\"", ast.name),
                None,
                None,
            );
            return Err(Error::Exists);
        }
        let id = IdentityId::from_index(ctx.identities.len()).expect("identity arena overflow");
        ctx.identities.push(Identity {
            id,
            name: identity_name,
            module: mc.id,
            bases: Vec::new(),
            derived: Vec::new(),
        });
        mc.identities.push(id);
    }

    for (offset, ast) in parsed.identities.iter().enumerate() {
        let id = IdentityId::from_index(first_index + offset).expect("identity id");
        for base_name in &ast.bases {
            let base = resolve_identity_ref(ctx, mc, base_name);
            let Some(base) = base else {
                ctx.record_error(
                    Error::Validation(ValidationCode::Reference),
                    format!(
                        "base identity \"{base_name}\" of \"{}\" not found",
                        ast.name
                    ),
                    None,
                    None,
                );
                return Err(Error::Validation(ValidationCode::Reference));
            };
            ctx.identities[id.to_index()].bases.push(base);
            ctx.identities[base.to_index()].derived.push(id);
        }
    }
    Ok(())
}

/// Resolve a possibly-prefixed identity name from the current module.
fn resolve_identity_ref(ctx: &Context, mc: &ModCompile, name: &str) -> Option<IdentityId> {
    let (module_identities, local) = match name.split_once(':') {
        Some((prefix, local)) => {
            let prefix_id = ctx.dict.find(prefix)?;
            if prefix_id == mc.prefix {
                (mc.identities.clone(), local)
            } else {
                let import = mc.imports.iter().find(|imp| imp.prefix == prefix_id)?;
                (
                    ctx.modules[import.module.to_index()].identities.clone(),
                    local,
                )
            }
        }
        None => (mc.identities.clone(), name),
    };
    let name_id = ctx.dict.find(local)?;
    module_identities
        .into_iter()
        .find(|&id| ctx.identities[id.to_index()].name == name_id)
}

/// Resolve a possibly-prefixed identity name from an arbitrary scope module
/// (used by identityref base statements inside types).
pub(crate) fn resolve_identity_in_scope(
    ctx: &Context,
    scope: &Scope,
    extra: &[IdentityId],
    name: &str,
) -> Option<IdentityId> {
    let (candidates, local): (Vec<IdentityId>, &str) = match name.split_once(':') {
        Some((prefix, local)) => {
            let module = scope.resolve_prefix(ctx, prefix)?;
            if module == scope.module {
                let mut own: Vec<IdentityId> = ctx
                    .modules
                    .get(module.to_index())
                    .map(|m| m.identities.clone())
                    .unwrap_or_default();
                own.extend_from_slice(extra);
                (own, local)
            } else {
                (ctx.modules[module.to_index()].identities.clone(), local)
            }
        }
        None => {
            let mut own: Vec<IdentityId> = ctx
                .modules
                .get(scope.module.to_index())
                .map(|m| m.identities.clone())
                .unwrap_or_default();
            own.extend_from_slice(extra);
            (own, name)
        }
    };
    let name_id = ctx.dict.find(local)?;
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|id| seen.insert(*id))
        .find(|&id| ctx.identities[id.to_index()].name == name_id)
}
