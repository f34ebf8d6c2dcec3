//! XML data encoding.
//!
//! Elements resolve to modules by namespace URI; children without their own
//! namespace stay in the parent's module. Semantics are identical to the
//! JSON codec modulo encoding.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use crate::log::{Error, ValidationCode};
use crate::mount;
use crate::schema::{Context, DataId, NodeFlags, NodeId, SchemaNodeKind};

use super::json::sort_by_keys;
use super::tree::{DataFlags, DataTree, DataValue, ParsedValue};
use super::value::parse_value;
use super::find_schema_child;

#[derive(Debug, Default)]
struct XmlElem {
    /// Resolved namespace URI, when any is in scope.
    namespace: Option<String>,
    name: String,
    children: Vec<XmlElem>,
    text: String,
}

fn syntax_error(ctx: &Context, message: String) -> Error {
    ctx.record_error(
        Error::Validation(ValidationCode::SyntaxXml),
        message,
        None,
        None,
    );
    Error::Validation(ValidationCode::SyntaxXml)
}

/// Parse an XML document into a data tree bound to the context's compiled
/// schema. Multiple top-level elements (sibling roots) are accepted.
///
/// # Errors
///
/// `Validation(SyntaxXml)` for malformed XML or unknown elements,
/// `Validation(Data)` for type failures.
pub fn parse_xml(ctx: &Context, text: &str) -> Result<DataTree, Error> {
    let elems = read_elements(ctx, text)?;
    let mut tree = DataTree::new();
    for elem in &elems {
        build_element(ctx, ctx, &mut tree, None, None, elem, false)?;
    }
    Ok(tree)
}

#[allow(clippy::type_complexity)]
fn read_elements(ctx: &Context, text: &str) -> Result<Vec<XmlElem>, Error> {
    let mut reader = XmlReader::from_str(text);
    reader.config_mut().trim_text(true);

    // Stack of (element, namespace bindings in scope at that element).
    let mut stack: Vec<(XmlElem, HashMap<String, String>)> = Vec::new();
    let mut scopes: Vec<HashMap<String, String>> = vec![HashMap::new()];
    let mut roots = Vec::new();

    loop {
        let event = reader.read_event();
        match event {
            Ok(Event::Start(ref start)) | Ok(Event::Empty(ref start)) => {
                let is_empty = matches!(event, Ok(Event::Empty(_)));
                let mut bindings = scopes.last().cloned().unwrap_or_default();
                for attr in start.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_default();
                    if key == "xmlns" {
                        bindings.insert(String::new(), value);
                    } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                        bindings.insert(prefix.to_owned(), value);
                    }
                }

                let raw = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let (prefix, local) = match raw.split_once(':') {
                    Some((p, l)) => (p.to_owned(), l.to_owned()),
                    None => (String::new(), raw),
                };
                let namespace = bindings.get(&prefix).cloned();
                if !prefix.is_empty() && namespace.is_none() {
                    return Err(syntax_error(
                        ctx,
                        format!("undeclared namespace prefix \"{prefix}\""),
                    ));
                }

                let elem = XmlElem {
                    namespace,
                    name: local,
                    children: Vec::new(),
                    text: String::new(),
                };
                if is_empty {
                    match stack.last_mut() {
                        Some((parent, _)) => parent.children.push(elem),
                        None => roots.push(elem),
                    }
                } else {
                    stack.push((elem, bindings.clone()));
                    scopes.push(bindings);
                }
            }
            Ok(Event::End(_)) => {
                scopes.pop();
                let Some((done, _)) = stack.pop() else {
                    continue;
                };
                match stack.last_mut() {
                    Some((parent, _)) => parent.children.push(done),
                    None => roots.push(done),
                }
            }
            Ok(Event::Text(text)) => {
                if let Some((top, _)) = stack.last_mut() {
                    if let Ok(value) = text.unescape() {
                        top.text.push_str(&value);
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if let Some((top, _)) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(syntax_error(ctx, format!("malformed XML: {err}")));
            }
        }
    }
    Ok(roots)
}

fn build_element(
    outer: &Context,
    eff: &Context,
    tree: &mut DataTree,
    parent: Option<DataId>,
    parent_schema: Option<NodeId>,
    elem: &XmlElem,
    under_mount: bool,
) -> Result<(), Error> {
    // A namespace unknown to this context may still belong to a mounted
    // schema; resolution only fails after the mount fallback.
    let (module, ns_unknown) = match &elem.namespace {
        Some(uri) => match eff.get_module_by_namespace(uri) {
            Some(module) => (Some(module.id), false),
            None => (None, true),
        },
        None => (None, false),
    };

    let schema = if ns_unknown {
        None
    } else {
        find_schema_child(eff, parent_schema, module, &elem.name)
    };
    match schema {
        Some(schema) => {
            let id = instantiate(outer, eff, tree, parent, schema, elem, under_mount)?;
            let _ = id;
            Ok(())
        }
        None => {
            let mountable =
                parent_schema.is_some_and(|p| !under_mount && mount::has_mount_point(eff, p));
            if !mountable {
                return Err(syntax_error(
                    outer,
                    format!("unknown element \"{}\"", elem.name),
                ));
            }
            let (inner, info) =
                mount::mount_context(eff, parent_schema.expect("mountable implies a parent"))?;
            let inner_module = elem
                .namespace
                .as_ref()
                .and_then(|uri| inner.get_module_by_namespace(uri))
                .map(|m| m.id);
            let Some(inner_schema) = find_schema_child(&inner, None, inner_module, &elem.name)
            else {
                return Err(syntax_error(
                    outer,
                    format!("unknown element \"{}\" in mounted schema", elem.name),
                ));
            };
            let id = instantiate(outer, &inner, tree, parent, inner_schema, elem, true)?;
            tree.node_mut(id).flags.insert(DataFlags::EXT);
            tree.mounted.insert(
                id,
                super::tree::MountAttach {
                    ctx: inner.clone(),
                    parent_refs: info.parent_refs.clone(),
                },
            );
            Ok(())
        }
    }
}

fn instantiate(
    outer: &Context,
    eff: &Context,
    tree: &mut DataTree,
    parent: Option<DataId>,
    schema: NodeId,
    elem: &XmlElem,
    under_mount: bool,
) -> Result<DataId, Error> {
    let node = eff.node(schema);
    match &node.kind {
        SchemaNodeKind::Container { .. }
        | SchemaNodeKind::List { .. }
        | SchemaNodeKind::Notification { .. } => {
            let id = tree.add_node(parent, schema, None);
            for child in &elem.children {
                build_element(outer, eff, tree, Some(id), Some(schema), child, under_mount)?;
            }
            Ok(id)
        }
        SchemaNodeKind::Leaf { ty, .. } | SchemaNodeKind::LeafList { ty, .. } => {
            match parse_value(eff, *ty, &elem.text) {
                Ok(value) => Ok(tree.add_node(parent, schema, Some(value))),
                Err(err) => {
                    let path = match parent {
                        Some(parent) => format!(
                            "{}/{}",
                            tree.data_path(outer, parent),
                            eff.str(node.name)
                        ),
                        None => format!("/{}", eff.str(node.name)),
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
        SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml => Ok(tree.add_node(
            parent,
            schema,
            Some(DataValue {
                canonical: elem.text.clone(),
                parsed: ParsedValue::Str,
            }),
        )),
        _ => Err(syntax_error(
            outer,
            format!("node \"{}\" cannot carry instance data", eff.str(node.name)),
        )),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Print a data tree as XML. Namespaces are declared as default `xmlns`
/// wherever the module changes; system-ordered lists print key-sorted.
#[must_use]
pub fn print_xml(ctx: &Context, tree: &DataTree) -> String {
    let mut out = String::new();
    emit_nodes(ctx, tree, tree.roots(), None, &mut out);
    out
}

fn emit_nodes(
    ctx: &Context,
    tree: &DataTree,
    nodes: &[DataId],
    parent: Option<DataId>,
    out: &mut String,
) {
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

        if let SchemaNodeKind::List { keys, .. } = &node.kind {
            if !node.flags.contains(NodeFlags::ORDERED_USER) {
                sort_by_keys(tree, &mut instances, keys);
            }
        }

        for id in instances {
            emit_one(ctx, tree, eff, id, parent, out);
        }
    }
}

fn emit_one(
    ctx: &Context,
    tree: &DataTree,
    eff: &Context,
    id: DataId,
    parent: Option<DataId>,
    out: &mut String,
) {
    let data = tree.node(id);
    let node = eff.node(data.schema);
    let name = eff.str(node.name);

    let needs_ns = match parent {
        Some(parent) => {
            let parent_eff = tree.context_of(ctx, parent);
            parent_eff.node(tree.node(parent).schema).module != node.module
                || data.flags.contains(DataFlags::EXT)
        }
        None => true,
    };
    if needs_ns {
        let namespace = eff.str(eff.modules[node.module.to_index()].namespace);
        out.push_str(&format!("<{name} xmlns=\"{namespace}\""));
    } else {
        out.push_str(&format!("<{name}"));
    }

    match &node.kind {
        SchemaNodeKind::Leaf { .. } | SchemaNodeKind::LeafList { .. } => {
            let text = data
                .value
                .as_ref()
                .map(|v| v.canonical.clone())
                .unwrap_or_default();
            if text.is_empty() {
                out.push_str("/>");
            } else {
                out.push_str(&format!(">{}</{name}>", escape(&text)));
            }
        }
        SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml => {
            let text = data
                .value
                .as_ref()
                .map(|v| v.canonical.clone())
                .unwrap_or_default();
            out.push_str(&format!(">{}</{name}>", escape(&text)));
        }
        _ => {
            if data.children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                emit_nodes(ctx, tree, &data.children.clone(), Some(id), out);
                out.push_str(&format!("</{name}>"));
            }
        }
    }
}
