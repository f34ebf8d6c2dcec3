//! JSON data encoding (RFC 7951 conventions).
//!
//! Member names are `module-name:node` at the top level and wherever the
//! module changes; lists and leaf-lists are arrays; `empty` is `[null]`;
//! 64-bit integers and decimal64 are strings.

use serde_json::{json, Map, Value};

use crate::log::{Error, ValidationCode};
use crate::mount;
use crate::schema::{Context, DataId, NodeFlags, NodeId, SchemaNodeKind};

use super::tree::{DataFlags, DataTree, ParsedValue};
use super::value::parse_value;
use super::find_schema_child;

/// Parse a JSON document into a data tree bound to the context's compiled
/// schema.
///
/// # Errors
///
/// `Validation(SyntaxJson)` for malformed JSON or unknown members,
/// `Validation(Data)` for type failures.
pub fn parse_json(ctx: &Context, text: &str) -> Result<DataTree, Error> {
    let root: Value = serde_json::from_str(text).map_err(|err| {
        ctx.record_error(
            Error::Validation(ValidationCode::SyntaxJson),
            format!("malformed JSON: {err}"),
            None,
            None,
        );
        Error::Validation(ValidationCode::SyntaxJson)
    })?;
    let Value::Object(members) = root else {
        ctx.record_error(
            Error::Validation(ValidationCode::SyntaxJson),
            "top-level JSON value must be an object",
            None,
            None,
        );
        return Err(Error::Validation(ValidationCode::SyntaxJson));
    };

    let mut tree = DataTree::new();
    build_members(ctx, ctx, &mut tree, None, None, &members, false)?;
    Ok(tree)
}

fn syntax_error(ctx: &Context, message: String, path: Option<String>) -> Error {
    ctx.record_error(
        Error::Validation(ValidationCode::SyntaxJson),
        message,
        path,
        None,
    );
    Error::Validation(ValidationCode::SyntaxJson)
}

/// Insert all members of a JSON object under `parent`.
///
/// `outer` stays the outermost context for error recording; `eff` is the
/// context the parent's schema lives in (the inner one under a mount).
#[allow(clippy::too_many_arguments)]
fn build_members(
    outer: &Context,
    eff: &Context,
    tree: &mut DataTree,
    parent: Option<DataId>,
    parent_schema: Option<NodeId>,
    members: &Map<String, Value>,
    under_mount: bool,
) -> Result<(), Error> {
    for (member, value) in members {
        // A member module unknown to this context may still belong to a
        // mounted schema; resolution only fails after the mount fallback.
        let (module, module_unknown, name) = match member.split_once(':') {
            Some((module_name, local)) => match eff.get_module(module_name, None) {
                Some(module) => (Some(module.id), false, local),
                None => (None, true, local),
            },
            None => (None, false, member.as_str()),
        };

        let found = if module_unknown {
            None
        } else {
            find_schema_child(eff, parent_schema, module, name)
        };
        match found {
            Some(schema) => {
                build_node(outer, eff, tree, parent, schema, value, under_mount)?;
            }
            None => {
                // Not in this schema; a mount point on the parent opens the
                // inner schema.
                let mountable = parent_schema
                    .is_some_and(|p| !under_mount && mount::has_mount_point(eff, p));
                if !mountable {
                    return Err(syntax_error(
                        outer,
                        format!("unknown member \"{member}\""),
                        parent.map(|p| tree.data_path(outer, p)),
                    ));
                }
                let (inner, info) = mount::mount_context(
                    eff,
                    parent_schema.expect("mountable implies a parent"),
                )?;
                let Some(inner_schema) = member
                    .split_once(':')
                    .and_then(|(module_name, local)| {
                        let module = inner.get_module(module_name, None)?;
                        find_schema_child(&inner, None, Some(module.id), local)
                    })
                    .or_else(|| find_schema_child(&inner, None, None, name))
                else {
                    return Err(syntax_error(
                        outer,
                        format!("unknown member \"{member}\" in mounted schema"),
                        parent.map(|p| tree.data_path(outer, p)),
                    ));
                };
                let added = build_node(
                    outer,
                    &inner,
                    tree,
                    parent,
                    inner_schema,
                    value,
                    true,
                )?;
                // Every top-level mounted subtree is flagged so validation
                // does not re-enter the extension.
                for id in added {
                    tree.node_mut(id).flags.insert(DataFlags::EXT);
                    tree.mounted.insert(
                        id,
                        super::tree::MountAttach {
                            ctx: inner.clone(),
                            parent_refs: info.parent_refs.clone(),
                        },
                    );
                }
            }
        }
    }
    Ok(())
}

/// Instantiate one member; returns the created nodes (several for arrays).
fn build_node(
    outer: &Context,
    eff: &Context,
    tree: &mut DataTree,
    parent: Option<DataId>,
    schema: NodeId,
    value: &Value,
    under_mount: bool,
) -> Result<Vec<DataId>, Error> {
    let node = eff.node(schema);
    let mut added = Vec::new();

    match &node.kind {
        SchemaNodeKind::Container { .. } => {
            let Value::Object(members) = value else {
                return Err(syntax_error(
                    outer,
                    format!("container \"{}\" expects an object", eff.str(node.name)),
                    parent.map(|p| tree.data_path(outer, p)),
                ));
            };
            let id = tree.add_node(parent, schema, None);
            build_members(outer, eff, tree, Some(id), Some(schema), members, under_mount)?;
            added.push(id);
        }
        SchemaNodeKind::List { .. } => {
            let Value::Array(entries) = value else {
                return Err(syntax_error(
                    outer,
                    format!("list \"{}\" expects an array", eff.str(node.name)),
                    parent.map(|p| tree.data_path(outer, p)),
                ));
            };
            for entry in entries {
                let Value::Object(members) = entry else {
                    return Err(syntax_error(
                        outer,
                        format!("list \"{}\" entries must be objects", eff.str(node.name)),
                        parent.map(|p| tree.data_path(outer, p)),
                    ));
                };
                let id = tree.add_node(parent, schema, None);
                build_members(outer, eff, tree, Some(id), Some(schema), members, under_mount)?;
                added.push(id);
            }
        }
        SchemaNodeKind::Leaf { ty, .. } => {
            let text = scalar_text(value).ok_or_else(|| {
                syntax_error(
                    outer,
                    format!("leaf \"{}\" expects a scalar", eff.str(node.name)),
                    parent.map(|p| tree.data_path(outer, p)),
                )
            })?;
            let id = add_leaf(outer, eff, tree, parent, schema, *ty, &text)?;
            added.push(id);
        }
        SchemaNodeKind::LeafList { ty, .. } => {
            let Value::Array(entries) = value else {
                return Err(syntax_error(
                    outer,
                    format!("leaf-list \"{}\" expects an array", eff.str(node.name)),
                    parent.map(|p| tree.data_path(outer, p)),
                ));
            };
            for entry in entries {
                let text = scalar_text(entry).ok_or_else(|| {
                    syntax_error(
                        outer,
                        format!("leaf-list \"{}\" expects scalars", eff.str(node.name)),
                        parent.map(|p| tree.data_path(outer, p)),
                    )
                })?;
                let id = add_leaf(outer, eff, tree, parent, schema, *ty, &text)?;
                added.push(id);
            }
        }
        SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml => {
            // Opaque: the canonical form is the serialized JSON.
            let id = tree.add_node(
                parent,
                schema,
                Some(super::tree::DataValue {
                    canonical: value.to_string(),
                    parsed: ParsedValue::Str,
                }),
            );
            added.push(id);
        }
        _ => {
            return Err(syntax_error(
                outer,
                format!("node \"{}\" cannot carry instance data", eff.str(node.name)),
                None,
            ));
        }
    }
    Ok(added)
}

fn add_leaf(
    outer: &Context,
    eff: &Context,
    tree: &mut DataTree,
    parent: Option<DataId>,
    schema: NodeId,
    ty: crate::schema::TypeId,
    text: &str,
) -> Result<DataId, Error> {
    match parse_value(eff, ty, text) {
        Ok(value) => Ok(tree.add_node(parent, schema, Some(value))),
        Err(err) => {
            let path = match parent {
                Some(parent) => format!(
                    "{}/{}",
                    tree.data_path(outer, parent),
                    eff.str(eff.node(schema).name)
                ),
                None => format!("/{}", eff.str(eff.node(schema).name)),
            };
            outer.record_error(
                Error::Validation(ValidationCode::Data),
                err.message,
                Some(path),
                err.app_tag,
            );
            Err(Error::Validation(ValidationCode::Data))
        }
    }
}

/// RFC 7951 scalar to text: strings verbatim, numbers/booleans via display,
/// `null` (inside `[null]` for empty) as the empty string.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(items) if items.len() == 1 && items[0].is_null() => Some(String::new()),
        _ => None,
    }
}

/// Print a data tree as JSON.
///
/// System-ordered lists print sorted by key; user-ordered lists keep
/// insertion order. Default-flagged nodes are included.
#[must_use]
pub fn print_json(ctx: &Context, tree: &DataTree) -> String {
    let mut members = Map::new();
    emit_members(ctx, tree, tree.roots(), None, &mut members);
    Value::Object(members).to_string()
}

fn emit_members(
    ctx: &Context,
    tree: &DataTree,
    nodes: &[DataId],
    parent: Option<DataId>,
    out: &mut Map<String, Value>,
) {
    // Instances group per schema node, in first-appearance order.
    let mut order: Vec<NodeId> = Vec::new();
    for &id in nodes {
        let schema = tree.node(id).schema;
        if !order.contains(&schema) {
            order.push(schema);
        }
    }

    for schema in order {
        let mut instances: Vec<DataId> = nodes
            .iter()
            .copied()
            .filter(|&id| tree.node(id).schema == schema)
            .collect();
        let sample = instances[0];
        let eff = tree.context_of(ctx, sample);
        let node = eff.node(schema);

        let member = member_name(ctx, tree, eff, sample, parent);
        match &node.kind {
            SchemaNodeKind::Container { .. } => {
                let mut inner = Map::new();
                emit_members(ctx, tree, &tree.node(sample).children.clone(), Some(sample), &mut inner);
                out.insert(member, Value::Object(inner));
            }
            SchemaNodeKind::List { keys, .. } => {
                if !node.flags.contains(NodeFlags::ORDERED_USER) {
                    sort_by_keys(tree, &mut instances, keys);
                }
                let mut entries = Vec::new();
                for id in instances {
                    let mut inner = Map::new();
                    emit_members(ctx, tree, &tree.node(id).children.clone(), Some(id), &mut inner);
                    entries.push(Value::Object(inner));
                }
                out.insert(member, Value::Array(entries));
            }
            SchemaNodeKind::Leaf { .. } => {
                out.insert(member, leaf_value(tree, sample));
            }
            SchemaNodeKind::LeafList { .. } => {
                let entries: Vec<Value> =
                    instances.iter().map(|&id| leaf_value(tree, id)).collect();
                out.insert(member, Value::Array(entries));
            }
            SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml => {
                let text = tree
                    .node(sample)
                    .value
                    .as_ref()
                    .map(|v| v.canonical.clone())
                    .unwrap_or_default();
                let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                out.insert(member, parsed);
            }
            _ => {}
        }
    }
}

fn member_name(
    ctx: &Context,
    tree: &DataTree,
    eff: &Context,
    id: DataId,
    parent: Option<DataId>,
) -> String {
    let node = eff.node(tree.node(id).schema);
    let name = eff.str(node.name);
    let needs_module = match parent {
        Some(parent) => {
            let parent_eff = tree.context_of(ctx, parent);
            parent_eff.node(tree.node(parent).schema).module != node.module
                || tree.node(id).flags.contains(DataFlags::EXT)
        }
        None => true,
    };
    if needs_module {
        let module = eff.str(eff.modules[node.module.to_index()].name);
        format!("{module}:{name}")
    } else {
        name.to_owned()
    }
}

fn leaf_value(tree: &DataTree, id: DataId) -> Value {
    let Some(value) = &tree.node(id).value else {
        return Value::Null;
    };
    match &value.parsed {
        ParsedValue::Int(v) if i32::try_from(*v).is_ok() => json!(v),
        ParsedValue::Uint(v) if u32::try_from(*v).is_ok() => json!(v),
        ParsedValue::Bool(v) => json!(v),
        ParsedValue::Empty => Value::Array(vec![Value::Null]),
        ParsedValue::Union { value: inner, .. } => match **inner {
            ParsedValue::Int(v) if i32::try_from(v).is_ok() => json!(v),
            ParsedValue::Uint(v) if u32::try_from(v).is_ok() => json!(v),
            ParsedValue::Bool(v) => json!(v),
            _ => Value::String(value.canonical.clone()),
        },
        // 64-bit integers, decimal64, and everything textual are strings.
        _ => Value::String(value.canonical.clone()),
    }
}

/// Sort list instances by their key canonical values.
pub(crate) fn sort_by_keys(tree: &DataTree, instances: &mut [DataId], keys: &[NodeId]) {
    instances.sort_by(|&a, &b| {
        for &key in keys {
            let value_of = |id: DataId| {
                tree.children_of_schema(Some(id), key)
                    .first()
                    .and_then(|&k| tree.node(k).value.as_ref().map(|v| v.canonical.clone()))
                    .unwrap_or_default()
            };
            let ordering = value_of(a).cmp(&value_of(b));
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}
