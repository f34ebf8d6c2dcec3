//! Data trees: instance data, parsing, and validation.
//!
//! A data tree is an arena owned as a unit. Nodes mirror the compiled schema
//! kinds and carry the canonical value text plus a type-specific parsed
//! form. Mounted subtrees keep a reference to their inner context.

mod json;
mod tree;
mod validate;
mod value;
mod xml;

pub use json::{parse_json, print_json};
pub use tree::{DataFlags, DataNode, DataTree, DataValue, ParsedValue};
pub use validate::validate;
pub use value::{parse_value, ValueError};
pub use xml::{parse_xml, print_xml};

/// Data input/output encodings handled by the core. The compact LYB binary
/// codec lives in the companion std crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataFormat {
    /// XML encoding.
    Xml,
    /// JSON encoding (RFC 7951 conventions).
    Json,
}

use crate::schema::{Context, ModuleId, NodeId};

/// Find the schema node for a data child by name, optionally pinned to a
/// module. Choice and case are transparent.
pub(crate) fn find_schema_child(
    ctx: &Context,
    parent: Option<NodeId>,
    module: Option<ModuleId>,
    name: &str,
) -> Option<NodeId> {
    let name_id = ctx.dict.find(name)?;
    let parent_module = parent.map(|p| ctx.node(p).module);
    ctx.data_children(parent, module)
        .into_iter()
        .find(|&cand| {
            let node = ctx.node(cand);
            if node.name != name_id {
                return false;
            }
            match module {
                Some(want) => node.module == want,
                // Without an explicit module the child must stay in the
                // parent's module.
                None => parent_module.is_none_or(|pm| node.module == pm),
            }
        })
}
