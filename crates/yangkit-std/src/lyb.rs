//! LYB: the compact binary data encoding.
//!
//! A postcard-framed tree of `(module, name, value)` triples. Schema
//! references travel by name, so a LYB blob loads into any context whose
//! compiled schema still has the named nodes; values re-validate against the
//! current types on load. Semantics are identical to the XML/JSON codecs
//! modulo encoding.

use serde::{Deserialize, Serialize};

use yangkit_core::data::{parse_value, DataTree};
use yangkit_core::schema::{Context, DataId, ModuleId, NodeId};
use yangkit_core::{Error, ValidationCode};

/// Magic bytes identifying a LYB blob.
const MAGIC: [u8; 4] = *b"YLYB";

/// Current LYB version.
pub const LYB_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LybNode {
    /// Module name; empty when it equals the parent's module.
    module: String,
    /// Node name.
    name: String,
    /// Canonical value for leafy nodes.
    value: Option<String>,
    children: Vec<LybNode>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LybParts {
    roots: Vec<LybNode>,
}

/// Serialize a data tree to LYB bytes.
#[must_use]
pub fn print_lyb(ctx: &Context, tree: &DataTree) -> Vec<u8> {
    let roots = tree
        .roots()
        .iter()
        .map(|&id| encode_node(ctx, tree, id, None))
        .collect();
    let parts = LybParts { roots };

    let mut bytes = Vec::with_capacity(4096);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&LYB_VERSION.to_le_bytes());
    let payload = postcard::to_allocvec(&parts).expect("serialization should not fail");
    bytes.extend_from_slice(&payload);
    bytes
}

fn encode_node(
    ctx: &Context,
    tree: &DataTree,
    id: DataId,
    parent_module: Option<ModuleId>,
) -> LybNode {
    let eff = tree.context_of(ctx, id);
    let node = tree.node(id);
    let schema = eff.node(node.schema);
    let module = if parent_module == Some(schema.module) {
        String::new()
    } else {
        eff.str(eff.modules()
            .find(|m| m.id == schema.module)
            .map(|m| m.name)
            .expect("node module in context"))
            .to_owned()
    };
    LybNode {
        module,
        name: eff.str(schema.name).to_owned(),
        value: node.value.as_ref().map(|v| v.canonical.clone()),
        children: node
            .children
            .iter()
            .map(|&child| encode_node(ctx, tree, child, Some(schema.module)))
            .collect(),
    }
}

/// Parse LYB bytes into a data tree bound to the context.
///
/// # Errors
///
/// `Validation(Syntax)` for framing errors, `Validation(Data)` when a value
/// no longer satisfies its type, `NotFound` when the schema lacks a named
/// node.
pub fn parse_lyb(ctx: &Context, bytes: &[u8]) -> Result<DataTree, Error> {
    if bytes.len() < 8 || bytes[0..4] != MAGIC {
        return Err(Error::Validation(ValidationCode::Syntax));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != LYB_VERSION {
        return Err(Error::Validation(ValidationCode::Syntax));
    }
    let parts: LybParts = postcard::from_bytes(&bytes[8..])
        .map_err(|_| Error::Validation(ValidationCode::Syntax))?;

    let mut tree = DataTree::new();
    for root in &parts.roots {
        decode_node(ctx, &mut tree, None, None, root)?;
    }
    Ok(tree)
}

fn decode_node(
    ctx: &Context,
    tree: &mut DataTree,
    parent: Option<DataId>,
    parent_schema: Option<NodeId>,
    encoded: &LybNode,
) -> Result<(), Error> {
    let module = if encoded.module.is_empty() {
        None
    } else {
        Some(
            ctx.get_module(&encoded.module, None)
                .ok_or(Error::NotFound)?
                .id,
        )
    };
    let schema = find_child(ctx, parent_schema, module, &encoded.name).ok_or(Error::NotFound)?;

    let value = match &encoded.value {
        Some(text) => {
            let ty = ctx.node(schema).leaf_type().ok_or(Error::NotFound)?;
            Some(
                parse_value(ctx, ty, text)
                    .map_err(|_| Error::Validation(ValidationCode::Data))?,
            )
        }
        None => None,
    };
    let id = tree.add_node(parent, schema, value);
    for child in &encoded.children {
        decode_node(ctx, tree, Some(id), Some(schema), child)?;
    }
    Ok(())
}

fn find_child(
    ctx: &Context,
    parent: Option<NodeId>,
    module: Option<ModuleId>,
    name: &str,
) -> Option<NodeId> {
    ctx.data_children(parent, module).into_iter().find(|&cand| {
        let node = ctx.node(cand);
        ctx.str(node.name) == name && module.is_none_or(|want| node.module == want)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use yangkit_core::data::parse_json;
    use yangkit_core::schema::SchemaFormat;
    use yangkit_core::ContextOptions;

    const MODULE: &str = r#"module a {
  namespace "urn:example:a";
  prefix a;
  container root {
    leaf name { type string; }
    leaf-list tags { type string; }
  }
}"#;

    #[test]
    fn test_lyb_round_trip() {
        let mut ctx = Context::new(ContextOptions::default());
        ctx.load_module(MODULE, SchemaFormat::Yang).unwrap();

        let tree = parse_json(
            &ctx,
            r#"{"a:root": {"name": "n1", "tags": ["t1", "t2"]}}"#,
        )
        .unwrap();

        let bytes = print_lyb(&ctx, &tree);
        let restored = parse_lyb(&ctx, &bytes).unwrap();

        assert_eq!(restored.roots().len(), 1);
        let root = restored.roots()[0];
        assert_eq!(restored.node(root).children.len(), 3);
    }

    #[test]
    fn test_lyb_bad_magic() {
        let ctx = Context::new(ContextOptions::default());
        assert!(parse_lyb(&ctx, b"XXXX\x01\x00\x00\x00").is_err());
    }
}
