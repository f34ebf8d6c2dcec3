//! Data tree storage.

use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::{Context, DataId, IdentityId, NodeId, SchemaNodeKind};

/// Inner context and parent-references attached to a mounted subtree root.
#[derive(Clone, Debug)]
pub(crate) struct MountAttach {
    pub ctx: Arc<Context>,
    pub parent_refs: Vec<String>,
}

/// Per-node data flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataFlags(pub u8);

impl DataFlags {
    /// Node was created by the current operation.
    pub const NEW: Self = Self(0x01);
    /// Node carries a default value inserted by validation.
    pub const DEFAULT: Self = Self(0x02);
    /// Node roots a mounted (extension) subtree; validation must not
    /// re-enter the mount extension for it.
    pub const EXT: Self = Self(0x04);

    /// Check whether all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// Type-specific parsed form of a leaf value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedValue {
    Int(i64),
    Uint(u64),
    Decimal {
        scaled: i64,
        digits: u8,
    },
    Bool(bool),
    Empty,
    /// Plain string; the canonical text is the value.
    Str,
    Enum(i32),
    /// Bit labels, canonically ordered by position.
    Bits(Vec<String>),
    IdentityRef(IdentityId),
    Binary(Vec<u8>),
    /// Union: index of the matching member plus its parsed form.
    Union {
        member: usize,
        value: Box<ParsedValue>,
    },
    /// instance-identifier path text; presence is checked at validation.
    InstanceId,
}

/// A leaf value: canonical text plus parsed form.
#[derive(Clone, Debug, PartialEq)]
pub struct DataValue {
    /// Canonical textual form.
    pub canonical: String,
    /// Type-specific parsed form.
    pub parsed: ParsedValue,
}

/// One node of a data tree.
#[derive(Clone, Debug)]
pub struct DataNode {
    /// The compiled schema node this instance belongs to. For nodes under a
    /// mounted subtree the id refers to the *inner* context.
    pub schema: NodeId,
    /// Parent node.
    pub parent: Option<DataId>,
    /// Children in document/sibling order.
    pub children: Vec<DataId>,
    /// Schema-node keyed child index for O(1) name lookup within a parent.
    pub child_index: HashMap<NodeId, Vec<DataId>>,
    /// Leaf/leaf-list value.
    pub value: Option<DataValue>,
    /// Data flags.
    pub flags: DataFlags,
}

/// An instance data tree, owned and freed as a unit.
#[derive(Clone, Debug, Default)]
pub struct DataTree {
    nodes: Vec<DataNode>,
    roots: Vec<DataId>,
    root_index: HashMap<NodeId, Vec<DataId>>,
    /// Mounted subtree roots and their inner contexts.
    pub(crate) mounted: HashMap<DataId, MountAttach>,
}

impl DataTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level nodes in document order.
    #[must_use]
    pub fn roots(&self) -> &[DataId] {
        &self.roots
    }

    /// Get a node.
    #[must_use]
    pub fn node(&self, id: DataId) -> &DataNode {
        &self.nodes[id.to_index()]
    }

    /// Get a node mutably.
    pub fn node_mut(&mut self, id: DataId) -> &mut DataNode {
        &mut self.nodes[id.to_index()]
    }

    /// Number of reachable and unreachable arena slots. Detached subtrees
    /// keep their slots until the tree is dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The inner context of a mounted subtree root, if `id` roots one.
    #[must_use]
    pub fn mount_context(&self, id: DataId) -> Option<&Arc<Context>> {
        self.mounted.get(&id).map(|attach| &attach.ctx)
    }

    /// Insert a node under `parent` (or as a root).
    pub fn add_node(
        &mut self,
        parent: Option<DataId>,
        schema: NodeId,
        value: Option<DataValue>,
    ) -> DataId {
        let id = DataId::from_index(self.nodes.len()).expect("data arena overflow");
        self.nodes.push(DataNode {
            schema,
            parent,
            children: Vec::new(),
            child_index: HashMap::new(),
            value,
            flags: DataFlags::NEW,
        });
        match parent {
            Some(parent) => {
                let parent_node = &mut self.nodes[parent.to_index()];
                parent_node.children.push(id);
                parent_node.child_index.entry(schema).or_default().push(id);
            }
            None => {
                self.roots.push(id);
                self.root_index.entry(schema).or_default().push(id);
            }
        }
        id
    }

    /// Children of `parent` (or roots) instantiating the given schema node.
    #[must_use]
    pub fn children_of_schema(&self, parent: Option<DataId>, schema: NodeId) -> Vec<DataId> {
        match parent {
            Some(parent) => self.nodes[parent.to_index()]
                .child_index
                .get(&schema)
                .cloned()
                .unwrap_or_default(),
            None => self.root_index.get(&schema).cloned().unwrap_or_default(),
        }
    }

    /// Detach a subtree from its parent (when-false pruning). The arena
    /// slots stay allocated; the subtree just becomes unreachable.
    pub fn detach(&mut self, id: DataId) {
        let (parent, schema) = {
            let node = &self.nodes[id.to_index()];
            (node.parent, node.schema)
        };
        match parent {
            Some(parent) => {
                let parent_node = &mut self.nodes[parent.to_index()];
                parent_node.children.retain(|&child| child != id);
                if let Some(ids) = parent_node.child_index.get_mut(&schema) {
                    ids.retain(|&child| child != id);
                }
            }
            None => {
                self.roots.retain(|&root| root != id);
                if let Some(ids) = self.root_index.get_mut(&schema) {
                    ids.retain(|&root| root != id);
                }
            }
        }
        self.mounted.remove(&id);
    }

    /// All reachable nodes in document order.
    #[must_use]
    pub fn walk(&self) -> Vec<DataId> {
        let mut out = Vec::new();
        let mut stack: Vec<DataId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            let node = &self.nodes[id.to_index()];
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Data path of a node, with list instances qualified by their keys,
    /// e.g. `/mod:l[name='a']/addr`.
    #[must_use]
    pub fn data_path(&self, ctx: &Context, id: DataId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.to_index()];
            let effective_ctx = self.context_of(ctx, node_id);
            let schema = effective_ctx.node(node.schema);
            let name = effective_ctx.str(schema.name).to_owned();

            let needs_prefix = match node.parent {
                Some(parent) => {
                    let parent_schema = self.nodes[parent.to_index()].schema;
                    self.context_of(ctx, parent).node(parent_schema).module != schema.module
                        || node.flags.contains(DataFlags::EXT)
                }
                None => true,
            };
            let mut segment = if needs_prefix {
                let module_name =
                    effective_ctx.str(effective_ctx.modules[schema.module.to_index()].name);
                format!("{module_name}:{name}")
            } else {
                name
            };

            if let SchemaNodeKind::List { keys, .. } = &schema.kind {
                for &key in keys {
                    if let Some(key_instance) =
                        self.children_of_schema(Some(node_id), key).first()
                    {
                        let value = self.nodes[key_instance.to_index()]
                            .value
                            .as_ref()
                            .map(|v| v.canonical.clone())
                            .unwrap_or_default();
                        let key_name = effective_ctx.str(effective_ctx.node(key).name);
                        segment.push_str(&format!("[{key_name}='{value}']"));
                    }
                }
            }

            segments.push(segment);
            current = node.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// The context a node's schema id belongs to: the inner context when the
    /// node sits under a mounted subtree, the outer one otherwise.
    #[must_use]
    pub fn context_of<'a>(&'a self, outer: &'a Context, id: DataId) -> &'a Context {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if let Some(attach) = self.mounted.get(&node_id) {
                return &attach.ctx;
            }
            current = self.nodes[node_id.to_index()].parent;
        }
        outer
    }
}
