//! Data tree validation.
//!
//! Pass A walks the tree in document order checking structural constraints
//! (duplicates, keys, unique groups, min/max-elements, mandatory presence,
//! leafref referential integrity). Pass B evaluates `when` (pruning false
//! subtrees, with shared compiled conditions memoized per evaluation),
//! inserts defaults into the pruned tree, and then evaluates `must`
//! top-down. Mounted subtrees are validated against their inner context with
//! parent-reference subtrees made visible.
//!
//! The main passes never descend into mounted subtrees, so every schema
//! reference in them resolves through the outer context; the mounted pass
//! re-enters `validate` with the inner context and a working copy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::log::{Error, ValidationCode};
use crate::schema::{Context, DataId, ExprId, NodeFlags, NodeId, SchemaNodeKind, StrId, TypeId};
use crate::types::TypeKind;
use crate::xpath::{eval, eval_boolean, EvalEnv, Value};

use super::tree::{DataFlags, DataTree};
use super::value::parse_value;

/// Validate a data tree against its context.
///
/// # Errors
///
/// `Validation(Data)` with details in the thread-local error chain.
pub fn validate(ctx: &Context, tree: &mut DataTree) -> Result<(), Error> {
    pass_a(ctx, tree)?;
    let mut when_memo = WhenMemo::new();
    prune_whens(ctx, tree, &mut when_memo)?;
    insert_defaults(ctx, tree)?;
    check_musts(ctx, tree)?;
    validate_mounted(ctx, tree)?;
    Ok(())
}

fn data_error(
    ctx: &Context,
    message: impl Into<String>,
    path: Option<String>,
    app_tag: Option<String>,
) -> Error {
    ctx.record_error(Error::Validation(ValidationCode::Data), message, path, app_tag);
    Error::Validation(ValidationCode::Data)
}

/// Whether a node roots a mounted subtree (its checks belong to the inner
/// schema run).
fn is_mount_root(tree: &DataTree, id: DataId) -> bool {
    tree.node(id).flags.contains(DataFlags::EXT)
}

/// Reachable nodes in document order, not descending into mounted subtrees.
fn walk_main(tree: &DataTree) -> Vec<DataId> {
    let mut out = Vec::new();
    let mut stack: Vec<DataId> = tree.roots().iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        if is_mount_root(tree, id) {
            continue;
        }
        out.push(id);
        stack.extend(tree.node(id).children.iter().rev().copied());
    }
    out
}

// ============================================================================
// Pass A
// ============================================================================

fn pass_a(ctx: &Context, tree: &DataTree) -> Result<(), Error> {
    // Top level plus every reachable interior node act as parents.
    let mut parents: Vec<Option<DataId>> = vec![None];
    parents.extend(walk_main(tree).into_iter().map(Some));

    for parent in parents {
        let parent_schema = match parent {
            Some(id) => {
                let schema_id = tree.node(id).schema;
                if !ctx.node(schema_id).is_data_node() {
                    continue;
                }
                Some(schema_id)
            }
            None => None,
        };
        check_instance_counts(ctx, tree, parent)?;
        check_mandatory(ctx, tree, parent, parent_schema)?;
    }

    // Per-leaf referential checks.
    for id in walk_main(tree) {
        let schema = ctx.node(tree.node(id).schema);
        if let Some(ty) = schema.leaf_type() {
            check_leafref(ctx, tree, id, ty)?;
            check_instance_id(ctx, tree, id, ty)?;
        }
    }
    Ok(())
}

/// Duplicate instances, list keys/uniques, and min/max-elements for the
/// children of one parent.
fn check_instance_counts(
    ctx: &Context,
    tree: &DataTree,
    parent: Option<DataId>,
) -> Result<(), Error> {
    let children: Vec<DataId> = match parent {
        Some(id) => tree.node(id).children.clone(),
        None => tree.roots().to_vec(),
    };

    let mut by_schema: Vec<(NodeId, Vec<DataId>)> = Vec::new();
    for &child in &children {
        if is_mount_root(tree, child) {
            continue;
        }
        let schema = tree.node(child).schema;
        match by_schema.iter_mut().find(|(s, _)| *s == schema) {
            Some((_, ids)) => ids.push(child),
            None => by_schema.push((schema, vec![child])),
        }
    }

    for (schema_id, instances) in &by_schema {
        let schema = ctx.node(*schema_id);
        let path = || {
            instances
                .first()
                .map(|&id| tree.data_path(ctx, id))
        };
        match &schema.kind {
            SchemaNodeKind::Container { .. }
            | SchemaNodeKind::Leaf { .. }
            | SchemaNodeKind::Anydata
            | SchemaNodeKind::Anyxml => {
                if instances.len() > 1 {
                    return Err(data_error(
                        ctx,
                        format!("duplicate instance of \"{}\"", ctx.str(schema.name)),
                        path(),
                        None,
                    ));
                }
            }
            SchemaNodeKind::LeafList {
                min_elements,
                max_elements,
                ..
            } => {
                check_cardinality(
                    ctx,
                    schema.name,
                    instances.len(),
                    *min_elements,
                    *max_elements,
                    path(),
                )?;
            }
            SchemaNodeKind::List {
                keys,
                uniques,
                min_elements,
                max_elements,
                ..
            } => {
                check_cardinality(
                    ctx,
                    schema.name,
                    instances.len(),
                    *min_elements,
                    *max_elements,
                    path(),
                )?;
                check_list_keys(ctx, tree, instances, keys)?;
                check_uniques(ctx, tree, instances, uniques)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_cardinality(
    ctx: &Context,
    name: StrId,
    count: usize,
    min: u32,
    max: Option<u32>,
    path: Option<String>,
) -> Result<(), Error> {
    if count < min as usize {
        return Err(data_error(
            ctx,
            format!("too few \"{}\" instances ({count} < {min})", ctx.str(name)),
            path,
            None,
        ));
    }
    if let Some(max) = max {
        if count > max as usize {
            return Err(data_error(
                ctx,
                format!("too many \"{}\" instances ({count} > {max})", ctx.str(name)),
                path,
                None,
            ));
        }
    }
    Ok(())
}

fn check_list_keys(
    ctx: &Context,
    tree: &DataTree,
    instances: &[DataId],
    keys: &[NodeId],
) -> Result<(), Error> {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    for &instance in instances {
        let mut tuple = Vec::with_capacity(keys.len());
        for &key in keys {
            let value = tree
                .children_of_schema(Some(instance), key)
                .first()
                .and_then(|&k| tree.node(k).value.as_ref().map(|v| v.canonical.clone()));
            let Some(value) = value else {
                return Err(data_error(
                    ctx,
                    format!("list key \"{}\" is missing", ctx.str(ctx.node(key).name)),
                    Some(tree.data_path(ctx, instance)),
                    None,
                ));
            };
            tuple.push(value);
        }
        if !keys.is_empty() && !seen.insert(tuple) {
            return Err(data_error(
                ctx,
                "duplicate list instance (key values already used)",
                Some(tree.data_path(ctx, instance)),
                None,
            ));
        }
    }
    Ok(())
}

fn check_uniques(
    ctx: &Context,
    tree: &DataTree,
    instances: &[DataId],
    uniques: &[Vec<NodeId>],
) -> Result<(), Error> {
    for group in uniques {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        for &instance in instances {
            let mut tuple = Vec::with_capacity(group.len());
            let mut complete = true;
            for &target in group {
                match find_descendant_value(tree, instance, target) {
                    Some(value) => tuple.push(value),
                    None => {
                        // An absent value makes the entry non-participating.
                        complete = false;
                        break;
                    }
                }
            }
            if complete && !seen.insert(tuple) {
                return Err(data_error(
                    ctx,
                    format!(
                        "unique constraint violated among \"{}\" instances",
                        ctx.str(ctx.node(tree.node(instance).schema).name)
                    ),
                    Some(tree.data_path(ctx, instance)),
                    None,
                ));
            }
        }
    }
    Ok(())
}

/// Value of the descendant leaf instantiating `target` under a list entry.
fn find_descendant_value(tree: &DataTree, entry: DataId, target: NodeId) -> Option<String> {
    let mut stack = vec![entry];
    while let Some(id) = stack.pop() {
        for &child in &tree.node(id).children {
            if tree.node(child).schema == target {
                return tree.node(child).value.as_ref().map(|v| v.canonical.clone());
            }
            stack.push(child);
        }
    }
    None
}

/// Mandatory presence, choice-aware: inside a choice only the selected
/// case's members are required, and a mandatory choice requires some case.
fn check_mandatory(
    ctx: &Context,
    tree: &DataTree,
    parent: Option<DataId>,
    parent_schema: Option<NodeId>,
) -> Result<(), Error> {
    let schema_children: Vec<NodeId> = match parent_schema {
        Some(schema) => ctx.node(schema).children().to_vec(),
        None => ctx
            .modules()
            .filter(|m| m.implemented)
            .flat_map(|m| m.children.clone())
            .collect(),
    };
    check_mandatory_members(ctx, tree, parent, &schema_children)
}

fn check_mandatory_members(
    ctx: &Context,
    tree: &DataTree,
    parent: Option<DataId>,
    members: &[NodeId],
) -> Result<(), Error> {
    for &member in members {
        let node = ctx.node(member);
        match &node.kind {
            SchemaNodeKind::Choice {
                cases,
                default_case,
            } => {
                let selected = cases
                    .iter()
                    .copied()
                    .find(|&case| case_instantiated(ctx, tree, parent, case));
                match selected {
                    Some(case) => {
                        let SchemaNodeKind::Case { children } = &ctx.node(case).kind else {
                            continue;
                        };
                        check_mandatory_members(ctx, tree, parent, children)?;
                    }
                    None => {
                        if node.flags.contains(NodeFlags::MANDATORY) && default_case.is_none() {
                            return Err(data_error(
                                ctx,
                                format!(
                                    "no case of mandatory choice \"{}\" instantiated",
                                    ctx.str(node.name)
                                ),
                                parent.map(|p| tree.data_path(ctx, p)),
                                None,
                            ));
                        }
                    }
                }
            }
            SchemaNodeKind::Case { children } => {
                check_mandatory_members(ctx, tree, parent, children)?;
            }
            _ => {
                if node.flags.contains(NodeFlags::MANDATORY)
                    && node.when.is_empty()
                    && tree.children_of_schema(parent, member).is_empty()
                {
                    return Err(data_error(
                        ctx,
                        format!("mandatory node \"{}\" is missing", ctx.str(node.name)),
                        parent.map(|p| tree.data_path(ctx, p)),
                        None,
                    ));
                }
            }
        }
    }
    Ok(())
}

fn case_instantiated(ctx: &Context, tree: &DataTree, parent: Option<DataId>, case: NodeId) -> bool {
    let SchemaNodeKind::Case { children } = &ctx.node(case).kind else {
        return false;
    };
    children.iter().any(|&child| match &ctx.node(child).kind {
        SchemaNodeKind::Choice { cases, .. } => cases
            .iter()
            .any(|&nested| case_instantiated(ctx, tree, parent, nested)),
        SchemaNodeKind::Case { .. } => case_instantiated(ctx, tree, parent, child),
        _ => !tree.children_of_schema(parent, child).is_empty(),
    })
}

fn check_leafref(
    ctx: &Context,
    tree: &DataTree,
    leaf: DataId,
    ty: TypeId,
) -> Result<(), Error> {
    let compiled = ctx.ty(ty);
    let Some(info) = &compiled.leafref else {
        return Ok(());
    };
    if !info.require_instance {
        return Ok(());
    }
    let Some(value) = tree.node(leaf).value.as_ref().map(|v| v.canonical.clone()) else {
        return Ok(());
    };

    let env = EvalEnv {
        ctx,
        tree,
        prefixes: &info.prefixes,
        cur_module: info.cur_module,
        current: leaf,
    };
    let expr = ctx.expr(info.path);
    let result = eval(&env, expr, Some(leaf))?;
    let found = match result {
        Value::NodeSet(nodes) => nodes.iter().any(|&node| {
            tree.node(node)
                .value
                .as_ref()
                .is_some_and(|v| v.canonical == value)
        }),
        _ => false,
    };
    if !found {
        return Err(data_error(
            ctx,
            format!(
                "invalid leafref value \"{value}\" - no existing target instance \"{}\"",
                expr.source
            ),
            Some(tree.data_path(ctx, leaf)),
            None,
        ));
    }
    Ok(())
}

/// instance-identifier presence: some instance of the named path must exist.
/// Key predicates narrow entries in the original; the schema-existence walk
/// here covers the stripped path.
fn check_instance_id(
    ctx: &Context,
    tree: &DataTree,
    leaf: DataId,
    ty: TypeId,
) -> Result<(), Error> {
    let compiled = ctx.ty(ty);
    if compiled.kind != TypeKind::InstanceIdentifier || !compiled.require_instance {
        return Ok(());
    }
    let Some(value) = tree.node(leaf).value.as_ref().map(|v| v.canonical.clone()) else {
        return Ok(());
    };

    let stripped = strip_predicates(&value);
    let mut current: Vec<DataId> = tree.roots().to_vec();
    let mut first = true;
    for segment in stripped.split('/').filter(|s| !s.is_empty()) {
        let name = segment.rsplit(':').next().unwrap_or(segment);
        if !first {
            current = current
                .iter()
                .flat_map(|&id| tree.node(id).children.clone())
                .collect();
        }
        first = false;
        current.retain(|&id| {
            let schema = ctx.node(tree.node(id).schema);
            ctx.str(schema.name) == name
        });
        if current.is_empty() {
            return Err(data_error(
                ctx,
                format!("required instance \"{value}\" does not exist"),
                Some(tree.data_path(ctx, leaf)),
                None,
            ));
        }
    }
    Ok(())
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

// ============================================================================
// Pass B
// ============================================================================

type WhenMemo = HashMap<(ExprId, Option<DataId>), bool>;

/// Evaluate `when` conditions top-down and detach false subtrees. Shared
/// compiled conditions are memoized per (expression, context node), so a
/// `when` inherited by many siblings from one grouping expansion evaluates
/// at most once.
fn prune_whens(ctx: &Context, tree: &mut DataTree, memo: &mut WhenMemo) -> Result<(), Error> {
    let mut queue: Vec<DataId> = tree.roots().to_vec();
    while let Some(id) = queue.pop() {
        if is_mount_root(tree, id) {
            continue;
        }

        let mut pruned = false;
        {
            let whens = &ctx.node(tree.node(id).schema).when;
            for when in whens {
                let context_node = if when.parent_ctx {
                    tree.node(id).parent
                } else {
                    Some(id)
                };
                let key = (when.expr, context_node);
                let holds = match memo.get(&key) {
                    Some(&holds) => holds,
                    None => {
                        let env = EvalEnv {
                            ctx,
                            tree,
                            prefixes: &when.prefixes,
                            cur_module: when.cur_module,
                            current: id,
                        };
                        let holds = eval_boolean(&env, ctx.expr(when.expr), context_node)?;
                        memo.insert(key, holds);
                        holds
                    }
                };
                if !holds {
                    pruned = true;
                    break;
                }
            }
        }

        if pruned {
            tree.detach(id);
        } else {
            queue.extend(tree.node(id).children.iter().copied());
        }
    }
    Ok(())
}

/// Insert defaults into the pruned tree: leaves declared `default` with no
/// value get one (flagged `DEFAULT`), leaf-lists receive their ordered
/// default list only when empty. Choice members default only inside the
/// selected (or default) case. When-gated nodes keep no default: their
/// condition cannot be evaluated against a node that does not exist.
fn insert_defaults(ctx: &Context, tree: &mut DataTree) -> Result<(), Error> {
    let mut parents: Vec<Option<DataId>> = vec![None];
    parents.extend(walk_main(tree).into_iter().map(Some));

    for parent in parents {
        let members: Vec<NodeId> = match parent {
            Some(id) => {
                let schema_id = tree.node(id).schema;
                if !matches!(
                    ctx.node(schema_id).kind,
                    SchemaNodeKind::Container { .. } | SchemaNodeKind::List { .. }
                ) {
                    continue;
                }
                ctx.node(schema_id).children().to_vec()
            }
            None => ctx
                .modules()
                .filter(|m| m.implemented)
                .flat_map(|m| m.children.clone())
                .collect(),
        };
        insert_default_members(ctx, tree, parent, &members)?;
    }
    Ok(())
}

fn insert_default_members(
    ctx: &Context,
    tree: &mut DataTree,
    parent: Option<DataId>,
    members: &[NodeId],
) -> Result<(), Error> {
    for &member in members {
        let node = ctx.node(member);
        if !node.when.is_empty() {
            continue;
        }
        match &node.kind {
            SchemaNodeKind::Leaf { ty, default, .. } => {
                if node.flags.contains(NodeFlags::KEY) {
                    continue;
                }
                let Some(default) = default else { continue };
                if !tree.children_of_schema(parent, member).is_empty() {
                    continue;
                }
                let Ok(value) = parse_value(ctx, *ty, ctx.str(*default)) else {
                    continue;
                };
                let id = tree.add_node(parent, member, Some(value));
                tree.node_mut(id).flags.insert(DataFlags::DEFAULT);
            }
            SchemaNodeKind::LeafList { ty, defaults, .. } => {
                if defaults.is_empty() || !tree.children_of_schema(parent, member).is_empty() {
                    continue;
                }
                for &default in defaults {
                    let Ok(value) = parse_value(ctx, *ty, ctx.str(default)) else {
                        continue;
                    };
                    let id = tree.add_node(parent, member, Some(value));
                    tree.node_mut(id).flags.insert(DataFlags::DEFAULT);
                }
            }
            SchemaNodeKind::Choice {
                cases,
                default_case,
            } => {
                let selected = cases
                    .iter()
                    .copied()
                    .find(|&case| case_instantiated(ctx, tree, parent, case))
                    .or(*default_case);
                if let Some(case) = selected {
                    if let SchemaNodeKind::Case { children } = &ctx.node(case).kind {
                        insert_default_members(ctx, tree, parent, children)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Evaluate `must` restrictions top-down over the pruned tree.
fn check_musts(ctx: &Context, tree: &DataTree) -> Result<(), Error> {
    for id in walk_main(tree) {
        let schema = ctx.node(tree.node(id).schema);
        for must in &schema.musts {
            let env = EvalEnv {
                ctx,
                tree,
                prefixes: &must.cond.prefixes,
                cur_module: must.cond.cur_module,
                current: id,
            };
            let expr = ctx.expr(must.cond.expr);
            if !eval_boolean(&env, expr, Some(id))? {
                let message = must
                    .error_message
                    .map(|m| ctx.str(m).to_owned())
                    .unwrap_or_else(|| {
                        format!("must condition \"{}\" not satisfied", expr.source)
                    });
                let app_tag = must.error_app_tag.map(|t| ctx.str(t).to_owned());
                return Err(data_error(
                    ctx,
                    message,
                    Some(tree.data_path(ctx, id)),
                    app_tag,
                ));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Mounted subtrees
// ============================================================================

/// Validate mounted subtrees: siblings sharing one inner context validate
/// together, with parent-reference subtrees duplicated into the working
/// tree so their nodes stay visible to XPath, and inserted defaults merged
/// back into the outer tree afterwards.
fn validate_mounted(ctx: &Context, tree: &mut DataTree) -> Result<(), Error> {
    // Group mounted roots by (parent, inner context).
    let mut groups: Vec<(Option<DataId>, Arc<Context>, Vec<DataId>, Vec<String>)> = Vec::new();
    for (&root, attach) in &tree.mounted {
        let parent = tree.node(root).parent;
        match groups
            .iter_mut()
            .find(|(p, inner, _, _)| *p == parent && Arc::ptr_eq(inner, &attach.ctx))
        {
            Some((_, _, roots, _)) => roots.push(root),
            None => groups.push((
                parent,
                Arc::clone(&attach.ctx),
                vec![root],
                attach.parent_refs.clone(),
            )),
        }
    }

    for (_, inner, mut roots, parent_refs) in groups {
        roots.sort();
        // Build the working tree: cloned mounted subtrees plus
        // parent-reference subtrees converted to the inner schema.
        let mut sub = DataTree::new();
        let mut clone_to_outer: HashMap<DataId, DataId> = HashMap::new();

        for &root in &roots {
            clone_subtree(tree, root, None, &mut sub, &mut clone_to_outer);
        }
        for parent_ref in &parent_refs {
            for outer_root in resolve_parent_ref(ctx, tree, parent_ref) {
                clone_converted(ctx, &inner, tree, outer_root, None, &mut sub);
            }
        }

        validate(&inner, &mut sub)?;

        // Restore the outer tree: inserted defaults are copied back under
        // their corresponding parents.
        for id in sub.walk() {
            let node = sub.node(id).clone();
            if !node.flags.contains(DataFlags::DEFAULT) {
                continue;
            }
            let outer_parent = node.parent.and_then(|p| clone_to_outer.get(&p).copied());
            if node.parent.is_some() && outer_parent.is_none() {
                // Landed under a parent-reference copy; the real node
                // already lives in the outer tree.
                continue;
            }
            let new_id = tree.add_node(outer_parent, node.schema, node.value.clone());
            tree.node_mut(new_id).flags.insert(DataFlags::DEFAULT);
            clone_to_outer.insert(id, new_id);
        }
    }
    Ok(())
}

fn clone_subtree(
    tree: &DataTree,
    outer_id: DataId,
    sub_parent: Option<DataId>,
    sub: &mut DataTree,
    clone_to_outer: &mut HashMap<DataId, DataId>,
) {
    let (schema, value, children) = {
        let node = tree.node(outer_id);
        (node.schema, node.value.clone(), node.children.clone())
    };
    let clone_id = sub.add_node(sub_parent, schema, value);
    clone_to_outer.insert(clone_id, outer_id);
    for child in children {
        clone_subtree(tree, child, Some(clone_id), sub, clone_to_outer);
    }
}

/// Clone an outer subtree while re-binding each node to the inner context's
/// schema node with the same module-name/name path. Nodes the inner schema
/// does not know are dropped.
fn clone_converted(
    ctx: &Context,
    inner: &Context,
    tree: &DataTree,
    outer_id: DataId,
    sub_parent: Option<DataId>,
    sub: &mut DataTree,
) {
    let node = tree.node(outer_id);
    let outer_schema = ctx.node(node.schema);
    let module_name = ctx.str(ctx.modules[outer_schema.module.to_index()].name);
    let name = ctx.str(outer_schema.name);

    let inner_module = inner.get_module(module_name, None).map(|m| m.id);
    let parent_schema = sub_parent.map(|p| sub.node(p).schema);
    let Some(inner_schema) = super::find_schema_child(inner, parent_schema, inner_module, name)
    else {
        return;
    };

    let clone_id = sub.add_node(sub_parent, inner_schema, node.value.clone());
    for child in node.children.clone() {
        clone_converted(ctx, inner, tree, child, Some(clone_id), sub);
    }
}

/// Match a parent-reference expression against the outer tree, returning the
/// roots of the selected subtrees.
fn resolve_parent_ref(ctx: &Context, tree: &DataTree, parent_ref: &str) -> Vec<DataId> {
    let stripped = strip_predicates(parent_ref);
    let mut current: Vec<DataId> = tree.roots().to_vec();
    let mut matched: Vec<DataId> = Vec::new();
    for segment in stripped.split('/').filter(|s| !s.is_empty()) {
        let name = segment.rsplit(':').next().unwrap_or(segment);
        matched = current
            .iter()
            .copied()
            .filter(|&id| {
                let eff = tree.context_of(ctx, id);
                eff.str(eff.node(tree.node(id).schema).name) == name
            })
            .collect();
        current = matched
            .iter()
            .flat_map(|&id| tree.node(id).children.clone())
            .collect();
    }
    matched
}
