//! Data-definition tree compilation.
//!
//! `uses` statements are expanded here by deep copy: the referenced
//! grouping's statements are cloned, `refine` and inline `augment` are
//! applied to the copy, and the copy compiles with the *grouping module's*
//! prefix/typedef scope while the produced nodes belong to the *use site's*
//! module and parent.

use super::types::{clone_leafref_for_use, compile_local_typedefs_into, resolve_type};
use super::{Locals, ModCompile, Scope};
use crate::ast::{
    AstAugment, AstGrouping, AstMust, AstNode, AstNodeCommon, AstOrderedBy, AstRefine, AstRpc,
    AstNotification, AstStatus, AstType,
};
use crate::log::{Error, ValidationCode};
use crate::mount;
use crate::schema::{
    BoundExpr, Context, ExtInstance, ModuleId, Must, NodeFlags, NodeId, SchemaNode,
    SchemaNodeKind, TypeId,
};
use crate::types::TypeKind;

fn semantic_error(ctx: &Context, message: impl Into<String>) -> Error {
    ctx.record_error(
        Error::Validation(ValidationCode::Semantics),
        message,
        None,
        None,
    );
    Error::Validation(ValidationCode::Semantics)
}

/// Compile an expression and bind it to the scope's prefixes.
pub(crate) fn compile_bound_expr(
    ctx: &mut Context,
    scope: &Scope,
    text: &str,
) -> Result<BoundExpr, Error> {
    let expr = ctx.add_expr(text).map_err(|err| {
        ctx.record_error(
            Error::Validation(ValidationCode::Xpath),
            format!("invalid expression \"{text}\": {}", err.message),
            None,
            None,
        );
        Error::Validation(ValidationCode::Xpath)
    })?;
    Ok(BoundExpr {
        expr,
        prefixes: scope.prefix_table(),
        cur_module: scope.module,
        parent_ctx: false,
    })
}

/// Compile `must` statements from outside the tree walk (deviations).
pub(crate) fn compile_bound_musts(
    ctx: &mut Context,
    scope: &Scope,
    musts: &[AstMust],
) -> Result<Vec<Must>, Error> {
    compile_musts(ctx, scope, musts)
}

fn compile_musts(ctx: &mut Context, scope: &Scope, musts: &[AstMust]) -> Result<Vec<Must>, Error> {
    let mut out = Vec::with_capacity(musts.len());
    for must in musts {
        let cond = compile_bound_expr(ctx, scope, &must.cond)?;
        let error_message = must.error_message.as_deref().map(|m| ctx.intern(m));
        let error_app_tag = must.error_app_tag.as_deref().map(|t| ctx.intern(t));
        out.push(Must {
            cond,
            error_message,
            error_app_tag,
        });
    }
    Ok(out)
}

fn compile_exts(
    ctx: &mut Context,
    scope: &Scope,
    common: &AstNodeCommon,
) -> Result<Vec<ExtInstance>, Error> {
    let mut out = Vec::with_capacity(common.ext_instances.len());
    for inst in &common.ext_instances {
        let def_module = scope.resolve_prefix(ctx, &inst.prefix);
        let name = ctx.intern(&inst.keyword);
        let argument = inst.argument.as_deref().map(|a| ctx.intern(a));
        out.push(ExtInstance {
            def_module,
            name,
            argument,
        });
    }
    Ok(out)
}

/// Push a node shell into the arena so children can reference their parent.
fn push_shell(
    ctx: &mut Context,
    name: &str,
    module: ModuleId,
    parent: Option<NodeId>,
) -> (NodeId, crate::schema::StrId) {
    let name_id = ctx.intern(name);
    let id = NodeId::from_index(ctx.nodes.len()).expect("node arena overflow");
    ctx.nodes.push(SchemaNode {
        name: name_id,
        module,
        parent,
        flags: NodeFlags::default(),
        when: Vec::new(),
        musts: Vec::new(),
        exts: Vec::new(),
        kind: SchemaNodeKind::Anydata,
    });
    (id, name_id)
}

fn common_flags(common: &AstNodeCommon, config: bool) -> NodeFlags {
    let mut flags = NodeFlags::default();
    if config {
        flags.insert(NodeFlags::CONFIG);
    }
    match common.status {
        AstStatus::Current => {}
        AstStatus::Deprecated => flags.insert(NodeFlags::DEPRECATED),
        AstStatus::Obsolete => flags.insert(NodeFlags::OBSOLETE),
    }
    flags
}

/// Compile a list of data-definition statements, expanding `uses` in place.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compile_data_defs(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    asts: &[AstNode],
    parent: Option<NodeId>,
    place_module: ModuleId,
    parent_config: bool,
) -> Result<Vec<NodeId>, Error> {
    let mut out = Vec::new();
    for ast in asts {
        match ast {
            AstNode::Uses(uses) => {
                let expanded = expand_uses(
                    ctx,
                    mc,
                    scope,
                    locals,
                    uses,
                    parent,
                    place_module,
                    parent_config,
                )?;
                out.extend(expanded);
            }
            _ => {
                if let Some(id) = compile_node(
                    ctx,
                    mc,
                    scope,
                    locals,
                    ast,
                    parent,
                    place_module,
                    parent_config,
                )? {
                    out.push(id);
                }
            }
        }
    }
    Ok(out)
}

/// Compile one non-`uses` data-definition statement. Returns `None` when the
/// node is excluded by `if-feature`.
#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
pub(crate) fn compile_node(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    ast: &AstNode,
    parent: Option<NodeId>,
    place_module: ModuleId,
    parent_config: bool,
) -> Result<Option<NodeId>, Error> {
    let common = ast.common();
    if !scope.features_satisfied(ctx, &common.if_features) {
        return Ok(None);
    }

    let config = common.config.unwrap_or(parent_config);
    if config && !parent_config {
        return Err(semantic_error(
            ctx,
            format!(
                "node \"{}\" cannot be \"config true\" under a \"config false\" parent",
                common.name
            ),
        ));
    }

    let (id, _) = push_shell(ctx, &common.name, place_module, parent);
    let mut flags = common_flags(common, config);
    let mut when = Vec::new();
    if let Some(cond) = &common.when {
        when.push(compile_bound_expr(ctx, scope, cond)?);
    }
    let exts = compile_exts(ctx, scope, common)?;

    let kind = match ast {
        AstNode::Container(container) => {
            if container.presence.is_some() {
                flags.insert(NodeFlags::PRESENCE);
            }
            let musts = compile_musts(ctx, scope, &container.musts)?;
            ctx.nodes[id.to_index()].musts = musts;

            locals
                .typedefs
                .push(compile_local_typedefs_into(ctx, mc, scope, &container.typedefs)?);
            locals.groupings.push(container.groupings.clone());
            let mut children = compile_data_defs(
                ctx,
                mc,
                scope,
                locals,
                &container.children,
                Some(id),
                place_module,
                config,
            )?;
            for action in &container.actions {
                if let Some(a) = compile_rpc(ctx, mc, scope, locals, action, Some(id), place_module)? {
                    children.push(a);
                }
            }
            for notification in &container.notifications {
                if let Some(n) =
                    compile_notification(ctx, mc, scope, locals, notification, Some(id), place_module)?
                {
                    children.push(n);
                }
            }
            locals.typedefs.pop();
            locals.groupings.pop();
            SchemaNodeKind::Container { children }
        }
        AstNode::Leaf(leaf) => {
            let ty = compile_leaf_type(ctx, mc, scope, locals, &leaf.ty, &common.name)?;
            let ty = clone_leafref_for_use(ctx, ty);
            if ctx.types[ty.to_index()].kind == TypeKind::Leafref {
                mc.pending_leafrefs.push((id, ty));
            }
            let default = match &leaf.default {
                Some(value) => Some(ctx.intern(value)),
                None => ctx.types[ty.to_index()].default,
            };
            if leaf.mandatory == Some(true) {
                if leaf.default.is_some() {
                    return Err(semantic_error(
                        ctx,
                        format!("leaf \"{}\" cannot be mandatory and have a default", common.name),
                    ));
                }
                flags.insert(NodeFlags::MANDATORY);
            }
            let units = leaf.units.as_deref().map(|u| ctx.intern(u));
            let musts = compile_musts(ctx, scope, &leaf.musts)?;
            ctx.nodes[id.to_index()].musts = musts;
            SchemaNodeKind::Leaf { ty, default, units }
        }
        AstNode::LeafList(leaf_list) => {
            let ty = compile_leaf_type(ctx, mc, scope, locals, &leaf_list.ty, &common.name)?;
            let ty = clone_leafref_for_use(ctx, ty);
            if ctx.types[ty.to_index()].kind == TypeKind::Leafref {
                mc.pending_leafrefs.push((id, ty));
            }
            if leaf_list.ordered_by == AstOrderedBy::User {
                flags.insert(NodeFlags::ORDERED_USER);
            }
            let defaults = leaf_list
                .defaults
                .iter()
                .map(|value| ctx.intern(value))
                .collect();
            let units = leaf_list.units.as_deref().map(|u| ctx.intern(u));
            let musts = compile_musts(ctx, scope, &leaf_list.musts)?;
            ctx.nodes[id.to_index()].musts = musts;
            SchemaNodeKind::LeafList {
                ty,
                defaults,
                units,
                min_elements: leaf_list.min_elements.unwrap_or(0),
                max_elements: leaf_list.max_elements,
            }
        }
        AstNode::List(list) => {
            if list.ordered_by == AstOrderedBy::User {
                flags.insert(NodeFlags::ORDERED_USER);
            }
            let musts = compile_musts(ctx, scope, &list.musts)?;
            ctx.nodes[id.to_index()].musts = musts;

            locals
                .typedefs
                .push(compile_local_typedefs_into(ctx, mc, scope, &list.typedefs)?);
            locals.groupings.push(list.groupings.clone());
            let mut children = compile_data_defs(
                ctx,
                mc,
                scope,
                locals,
                &list.children,
                Some(id),
                place_module,
                config,
            )?;
            for action in &list.actions {
                if let Some(a) = compile_rpc(ctx, mc, scope, locals, action, Some(id), place_module)? {
                    children.push(a);
                }
            }
            for notification in &list.notifications {
                if let Some(n) =
                    compile_notification(ctx, mc, scope, locals, notification, Some(id), place_module)?
                {
                    children.push(n);
                }
            }
            locals.typedefs.pop();
            locals.groupings.pop();

            // Keys resolve against the compiled children.
            let mut keys = Vec::new();
            if let Some(key_arg) = &list.key {
                for key_name in key_arg.split_whitespace() {
                    let key_id = ctx.dict.find(key_name).and_then(|name_id| {
                        children
                            .iter()
                            .copied()
                            .find(|&child| ctx.nodes[child.to_index()].name == name_id)
                    });
                    let Some(key_id) = key_id else {
                        return Err(semantic_error(
                            ctx,
                            format!(
                                "key \"{key_name}\" of list \"{}\" is not a child leaf",
                                common.name
                            ),
                        ));
                    };
                    if !matches!(ctx.nodes[key_id.to_index()].kind, SchemaNodeKind::Leaf { .. }) {
                        return Err(semantic_error(
                            ctx,
                            format!("key \"{key_name}\" of list \"{}\" is not a leaf", common.name),
                        ));
                    }
                    ctx.nodes[key_id.to_index()].flags.insert(NodeFlags::KEY);
                    keys.push(key_id);
                }
            } else if config {
                return Err(semantic_error(
                    ctx,
                    format!("configuration list \"{}\" has no \"key\"", common.name),
                ));
            }

            // Unique groups resolve to descendant leaves.
            let mut uniques = Vec::new();
            for unique in &list.uniques {
                let mut group = Vec::new();
                for path in unique.split_whitespace() {
                    let Some(target) = resolve_descendant_leaf(ctx, &children, path) else {
                        return Err(semantic_error(
                            ctx,
                            format!(
                                "unique path \"{path}\" of list \"{}\" does not name a leaf",
                                common.name
                            ),
                        ));
                    };
                    group.push(target);
                }
                uniques.push(group);
            }

            SchemaNodeKind::List {
                children,
                keys,
                uniques,
                min_elements: list.min_elements.unwrap_or(0),
                max_elements: list.max_elements,
            }
        }
        AstNode::Choice(choice) => {
            if choice.mandatory == Some(true) {
                flags.insert(NodeFlags::MANDATORY);
            }
            let mut cases = Vec::new();
            for case_ast in &choice.cases {
                match case_ast {
                    AstNode::Case(case) => {
                        if !scope.features_satisfied(ctx, &case.common.if_features) {
                            continue;
                        }
                        let (case_id, _) = push_shell(ctx, &case.common.name, place_module, Some(id));
                        let mut case_when = Vec::new();
                        if let Some(cond) = &case.common.when {
                            case_when.push(compile_bound_expr(ctx, scope, cond)?);
                        }
                        let case_children = compile_data_defs(
                            ctx,
                            mc,
                            scope,
                            locals,
                            &case.children,
                            Some(case_id),
                            place_module,
                            config,
                        )?;
                        let node = &mut ctx.nodes[case_id.to_index()];
                        node.flags = common_flags(&case.common, config);
                        node.when = case_when;
                        node.kind = SchemaNodeKind::Case {
                            children: case_children,
                        };
                        cases.push(case_id);
                    }
                    shorthand => {
                        // Shorthand case: an implicit case wraps the node.
                        let name = &shorthand.common().name;
                        let (case_id, _) = push_shell(ctx, name, place_module, Some(id));
                        let children = compile_data_defs(
                            ctx,
                            mc,
                            scope,
                            locals,
                            core::slice::from_ref(shorthand),
                            Some(case_id),
                            place_module,
                            config,
                        )?;
                        if children.is_empty() {
                            // The shorthand node was feature-excluded.
                            ctx.nodes[case_id.to_index()].kind =
                                SchemaNodeKind::Case { children };
                            continue;
                        }
                        let node = &mut ctx.nodes[case_id.to_index()];
                        node.kind = SchemaNodeKind::Case { children };
                        cases.push(case_id);
                    }
                }
            }
            let default_case = match &choice.default_case {
                Some(default_name) => {
                    if choice.mandatory == Some(true) {
                        return Err(semantic_error(
                            ctx,
                            format!(
                                "choice \"{}\" cannot be mandatory and have a default",
                                common.name
                            ),
                        ));
                    }
                    let found = ctx.dict.find(default_name).and_then(|name_id| {
                        cases
                            .iter()
                            .copied()
                            .find(|&case| ctx.nodes[case.to_index()].name == name_id)
                    });
                    if found.is_none() {
                        return Err(semantic_error(
                            ctx,
                            format!(
                                "default case \"{default_name}\" of choice \"{}\" not found",
                                common.name
                            ),
                        ));
                    }
                    found
                }
                None => None,
            };
            SchemaNodeKind::Choice {
                cases,
                default_case,
            }
        }
        AstNode::Case(_) => {
            return Err(semantic_error(
                ctx,
                format!("\"case\" statement \"{}\" outside a choice", common.name),
            ));
        }
        AstNode::Anydata(any) | AstNode::Anyxml(any) => {
            if any.mandatory == Some(true) {
                flags.insert(NodeFlags::MANDATORY);
            }
            let musts = compile_musts(ctx, scope, &any.musts)?;
            ctx.nodes[id.to_index()].musts = musts;
            if matches!(ast, AstNode::Anydata(_)) {
                SchemaNodeKind::Anydata
            } else {
                SchemaNodeKind::Anyxml
            }
        }
        AstNode::Uses(_) => unreachable!("uses handled by compile_data_defs"),
    };

    let node = &mut ctx.nodes[id.to_index()];
    node.flags = flags;
    node.when.extend(when);
    node.exts = exts;
    node.kind = kind;

    mount::check_mount_points(ctx, mc, id)?;

    Ok(Some(id))
}

fn compile_leaf_type(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    ast: &AstType,
    leaf_name: &str,
) -> Result<TypeId, Error> {
    match resolve_type(ctx, mc, scope, locals, ast) {
        Ok(id) => Ok(id),
        Err(Error::NotFound) => {
            ctx.record_error(
                Error::Validation(ValidationCode::Reference),
                format!("unknown type \"{}\" of \"{leaf_name}\"", ast.name),
                None,
                None,
            );
            Err(Error::Validation(ValidationCode::Reference))
        }
        Err(err) => Err(err),
    }
}

/// Resolve a descendant path like `a/b` (prefixes stripped) to a leaf among
/// the compiled children.
fn resolve_descendant_leaf(ctx: &Context, children: &[NodeId], path: &str) -> Option<NodeId> {
    let mut current: Vec<NodeId> = children.to_vec();
    let mut target = None;
    for segment in path.split('/') {
        let name = segment.rsplit(':').next().unwrap_or(segment);
        let name_id = ctx.dict.find(name)?;
        let found = current
            .iter()
            .copied()
            .find(|&child| ctx.nodes[child.to_index()].name == name_id)?;
        target = Some(found);
        current = ctx.nodes[found.to_index()].children().to_vec();
    }
    let target = target?;
    matches!(ctx.nodes[target.to_index()].kind, SchemaNodeKind::Leaf { .. }).then_some(target)
}

// ============================================================================
// uses expansion
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn expand_uses(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    uses: &crate::ast::AstUses,
    parent: Option<NodeId>,
    place_module: ModuleId,
    parent_config: bool,
) -> Result<Vec<NodeId>, Error> {
    if !scope.features_satisfied(ctx, &uses.common.if_features) {
        return Ok(Vec::new());
    }

    let (mut grouping, grouping_scope) = find_grouping(ctx, scope, locals, &uses.common.name)?;

    // Refines and inline augments apply to the copy, not the original.
    for refine in &uses.refines {
        apply_refine(ctx, &mut grouping.children, refine)?;
    }
    for augment in &uses.augments {
        apply_uses_augment(ctx, &mut grouping.children, augment)?;
    }

    // The copy compiles in the grouping module's scope so type references
    // and expression prefixes resolve as written there.
    let same_module = grouping_scope.module == scope.module;
    let mut fresh_locals = Locals::default();
    let locals_ref = if same_module { locals } else { &mut fresh_locals };

    locals_ref.typedefs.push(compile_local_typedefs_into(
        ctx,
        mc,
        &grouping_scope,
        &grouping.typedefs,
    )?);
    locals_ref.groupings.push(grouping.groupings.clone());
    let expanded = compile_data_defs(
        ctx,
        mc,
        &grouping_scope,
        locals_ref,
        &grouping.children,
        parent,
        place_module,
        parent_config,
    )?;
    locals_ref.typedefs.pop();
    locals_ref.groupings.pop();

    // `when` on the uses gates every expanded top-level node; the compiled
    // expression is shared and parent-scoped, which validation memoizes on.
    if let Some(cond) = &uses.common.when {
        let mut bound = compile_bound_expr(ctx, scope, cond)?;
        bound.parent_ctx = true;
        for &node in &expanded {
            ctx.nodes[node.to_index()].when.push(bound.clone());
        }
    }

    Ok(expanded)
}

/// Find a grouping by (possibly prefixed) name, returning a clone plus the
/// scope it must compile in.
fn find_grouping(
    ctx: &mut Context,
    scope: &Scope,
    locals: &Locals,
    name: &str,
) -> Result<(AstGrouping, Scope), Error> {
    let not_found = |ctx: &Context| {
        ctx.record_error(
            Error::Validation(ValidationCode::Reference),
            format!("grouping \"{name}\" not found"),
            None,
            None,
        );
        Error::Validation(ValidationCode::Reference)
    };

    match name.split_once(':') {
        Some((prefix, local)) => {
            let Some(module) = scope.resolve_prefix(ctx, prefix) else {
                return Err(not_found(ctx));
            };
            if module == scope.module {
                find_grouping_local(scope, locals, local)
                    .map(|g| (g, scope.clone()))
                    .ok_or_else(|| not_found(ctx))
            } else {
                let found = ctx.modules[module.to_index()]
                    .parsed
                    .groupings
                    .iter()
                    .find(|g| g.name == local)
                    .cloned();
                match found {
                    Some(grouping) => {
                        let foreign_scope = Scope::of_module(ctx, module);
                        Ok((grouping, foreign_scope))
                    }
                    None => Err(not_found(ctx)),
                }
            }
        }
        None => find_grouping_local(scope, locals, name)
            .map(|g| (g, scope.clone()))
            .ok_or_else(|| not_found(ctx)),
    }
}

fn find_grouping_local(scope: &Scope, locals: &Locals, name: &str) -> Option<AstGrouping> {
    for frame in locals.groupings.iter().rev() {
        if let Some(grouping) = frame.iter().find(|g| g.name == name) {
            return Some(grouping.clone());
        }
    }
    scope.groupings.iter().find(|g| g.name == name).cloned()
}

/// Navigate a descendant path in an AST child list.
fn find_ast_target<'a>(children: &'a mut [AstNode], path: &str) -> Option<&'a mut AstNode> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let first = segments.next()?;
    let first_name = first.rsplit(':').next().unwrap_or(first);
    let mut node = children
        .iter_mut()
        .find(|child| child.common().name == first_name)?;
    for segment in segments {
        let name = segment.rsplit(':').next().unwrap_or(segment);
        node = ast_children_mut(node)?
            .iter_mut()
            .find(|child| child.common().name == name)?;
    }
    Some(node)
}

fn ast_children_mut(node: &mut AstNode) -> Option<&mut Vec<AstNode>> {
    match node {
        AstNode::Container(n) => Some(&mut n.children),
        AstNode::List(n) => Some(&mut n.children),
        AstNode::Choice(n) => Some(&mut n.cases),
        AstNode::Case(n) => Some(&mut n.children),
        _ => None,
    }
}

fn apply_refine(
    ctx: &Context,
    children: &mut [AstNode],
    refine: &AstRefine,
) -> Result<(), Error> {
    let Some(target) = find_ast_target(children, &refine.target) else {
        return Err(semantic_error(
            ctx,
            format!("refine target \"{}\" not found in grouping", refine.target),
        ));
    };

    match target {
        AstNode::Container(container) => {
            if let Some(presence) = &refine.presence {
                container.presence = Some(presence.clone());
            }
            if let Some(config) = refine.config {
                container.common.config = Some(config);
            }
            container.musts.extend(refine.musts.iter().cloned());
        }
        AstNode::Leaf(leaf) => {
            if let Some(default) = refine.defaults.first() {
                leaf.default = Some(default.clone());
            }
            if let Some(mandatory) = refine.mandatory {
                leaf.mandatory = Some(mandatory);
            }
            if let Some(config) = refine.config {
                leaf.common.config = Some(config);
            }
            leaf.musts.extend(refine.musts.iter().cloned());
        }
        AstNode::LeafList(leaf_list) => {
            if !refine.defaults.is_empty() {
                leaf_list.defaults = refine.defaults.clone();
            }
            if let Some(min) = refine.min_elements {
                leaf_list.min_elements = Some(min);
            }
            if refine.max_elements.is_some() {
                leaf_list.max_elements = refine.max_elements;
            }
            if let Some(config) = refine.config {
                leaf_list.common.config = Some(config);
            }
            leaf_list.musts.extend(refine.musts.iter().cloned());
        }
        AstNode::List(list) => {
            if let Some(min) = refine.min_elements {
                list.min_elements = Some(min);
            }
            if refine.max_elements.is_some() {
                list.max_elements = refine.max_elements;
            }
            if let Some(config) = refine.config {
                list.common.config = Some(config);
            }
            list.musts.extend(refine.musts.iter().cloned());
        }
        AstNode::Choice(choice) => {
            if let Some(mandatory) = refine.mandatory {
                choice.mandatory = Some(mandatory);
            }
            if let Some(default) = refine.defaults.first() {
                choice.default_case = Some(default.clone());
            }
        }
        AstNode::Anydata(any) | AstNode::Anyxml(any) => {
            if let Some(mandatory) = refine.mandatory {
                any.mandatory = Some(mandatory);
            }
            any.musts.extend(refine.musts.iter().cloned());
        }
        AstNode::Case(_) | AstNode::Uses(_) => {
            return Err(semantic_error(
                ctx,
                format!("refine target \"{}\" cannot be refined", refine.target),
            ));
        }
    }
    Ok(())
}

fn apply_uses_augment(
    ctx: &Context,
    children: &mut [AstNode],
    augment: &AstAugment,
) -> Result<(), Error> {
    let Some(target) = find_ast_target(children, &augment.target) else {
        return Err(semantic_error(
            ctx,
            format!("augment target \"{}\" not found in grouping", augment.target),
        ));
    };
    let Some(target_children) = ast_children_mut(target) else {
        return Err(semantic_error(
            ctx,
            format!("augment target \"{}\" cannot hold children", augment.target),
        ));
    };
    let mut added = augment.children.clone();
    if let Some(when) = &augment.when {
        for child in &mut added {
            set_when(child, when);
        }
    }
    target_children.extend(added);
    Ok(())
}

fn set_when(node: &mut AstNode, when: &str) {
    let common = match node {
        AstNode::Container(n) => &mut n.common,
        AstNode::Leaf(n) => &mut n.common,
        AstNode::LeafList(n) => &mut n.common,
        AstNode::List(n) => &mut n.common,
        AstNode::Choice(n) => &mut n.common,
        AstNode::Case(n) => &mut n.common,
        AstNode::Anydata(n) | AstNode::Anyxml(n) => &mut n.common,
        AstNode::Uses(n) => &mut n.common,
    };
    if common.when.is_none() {
        common.when = Some(when.to_owned());
    }
}

// ============================================================================
// rpc / notification
// ============================================================================

pub(crate) fn compile_rpc(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    rpc: &AstRpc,
    parent: Option<NodeId>,
    place_module: ModuleId,
) -> Result<Option<NodeId>, Error> {
    if !scope.features_satisfied(ctx, &rpc.if_features) {
        return Ok(None);
    }
    let (id, _) = push_shell(ctx, &rpc.name, place_module, parent);

    locals
        .typedefs
        .push(compile_local_typedefs_into(ctx, mc, scope, &rpc.typedefs)?);
    locals.groupings.push(rpc.groupings.clone());

    // rpc input/output nodes carry no config; lists there need no keys.
    let mut input = Vec::new();
    if let Some(io) = &rpc.input {
        input = compile_data_defs(
            ctx,
            mc,
            scope,
            locals,
            &io.children,
            Some(id),
            place_module,
            false,
        )?;
    }
    let mut output = Vec::new();
    if let Some(io) = &rpc.output {
        output = compile_data_defs(
            ctx,
            mc,
            scope,
            locals,
            &io.children,
            Some(id),
            place_module,
            false,
        )?;
    }

    locals.typedefs.pop();
    locals.groupings.pop();

    ctx.nodes[id.to_index()].kind = SchemaNodeKind::Rpc { input, output };
    Ok(Some(id))
}

pub(crate) fn compile_notification(
    ctx: &mut Context,
    mc: &mut ModCompile,
    scope: &Scope,
    locals: &mut Locals,
    notification: &AstNotification,
    parent: Option<NodeId>,
    place_module: ModuleId,
) -> Result<Option<NodeId>, Error> {
    if !scope.features_satisfied(ctx, &notification.if_features) {
        return Ok(None);
    }
    let (id, _) = push_shell(ctx, &notification.name, place_module, parent);
    let musts = compile_musts(ctx, scope, &notification.musts)?;
    ctx.nodes[id.to_index()].musts = musts;

    locals.typedefs.push(compile_local_typedefs_into(
        ctx,
        mc,
        scope,
        &notification.typedefs,
    )?);
    locals.groupings.push(notification.groupings.clone());
    let children = compile_data_defs(
        ctx,
        mc,
        scope,
        locals,
        &notification.children,
        Some(id),
        place_module,
        false,
    )?;
    locals.typedefs.pop();
    locals.groupings.pop();

    ctx.nodes[id.to_index()].kind = SchemaNodeKind::Notification { children };
    Ok(Some(id))
}
