//! Compiled schema nodes.
//!
//! One tagged variant per data-definition kind, with the common header
//! (name, module, parent back-ref, flags, when/must, extension instances)
//! lifted into the wrapper struct.

use super::ids::{ExprId, ModuleId, NodeId, StrId, TypeId};

/// Common schema node flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeFlags(pub u16);

impl NodeFlags {
    /// Node is configuration (`config true`).
    pub const CONFIG: Self = Self(0x0001);
    /// Node is mandatory.
    pub const MANDATORY: Self = Self(0x0002);
    /// List or leaf-list is `ordered-by user`.
    pub const ORDERED_USER: Self = Self(0x0004);
    /// Container has a `presence` statement.
    pub const PRESENCE: Self = Self(0x0008);
    /// `status deprecated`.
    pub const DEPRECATED: Self = Self(0x0010);
    /// `status obsolete`.
    pub const OBSOLETE: Self = Self(0x0020);
    /// Leaf is a list key.
    pub const KEY: Self = Self(0x0040);

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

/// A compiled XPath expression bound to its use site.
///
/// The expression itself carries no namespace information; the prefix table
/// binds prefix text to modules as seen from the statement that declared the
/// expression, so the same expression text compiled from different modules
/// resolves correctly.
#[derive(Clone, Debug)]
pub struct BoundExpr {
    /// The compiled expression in the context arena.
    pub expr: ExprId,
    /// Prefix-to-module bindings of the declaring module.
    pub prefixes: Vec<(StrId, ModuleId)>,
    /// Module whose namespace unprefixed names resolve to.
    pub cur_module: ModuleId,
    /// `when` inherited from a `uses`/`augment` placement evaluates with the
    /// parent as context node, and is shared across all placed siblings.
    pub parent_ctx: bool,
}

/// A compiled `must` restriction.
#[derive(Clone, Debug)]
pub struct Must {
    /// The condition.
    pub cond: BoundExpr,
    /// Module-defined error message.
    pub error_message: Option<StrId>,
    /// Module-defined error-app-tag.
    pub error_app_tag: Option<StrId>,
}

/// A compiled extension instance attached to a node or module.
#[derive(Clone, Debug)]
pub struct ExtInstance {
    /// Module defining the extension, when the prefix resolved.
    pub def_module: Option<ModuleId>,
    /// Extension keyword.
    pub name: StrId,
    /// Extension argument.
    pub argument: Option<StrId>,
}

/// A compiled schema node.
#[derive(Clone, Debug)]
pub struct SchemaNode {
    /// Node name.
    pub name: StrId,
    /// Module the node belongs to in the data tree. For grouping expansions
    /// this is the module of the `uses` site, not the grouping's module.
    pub module: ModuleId,
    /// Parent node; `None` for top-level nodes.
    pub parent: Option<NodeId>,
    /// Common flags.
    pub flags: NodeFlags,
    /// `when` conditions gating this node's presence (own plus any inherited
    /// from `uses`/`augment` placement).
    pub when: Vec<BoundExpr>,
    /// `must` restrictions.
    pub musts: Vec<Must>,
    /// Extension instances.
    pub exts: Vec<ExtInstance>,
    /// Kind-specific payload.
    pub kind: SchemaNodeKind,
}

/// Kind-specific payload of a compiled schema node.
#[derive(Clone, Debug)]
pub enum SchemaNodeKind {
    Container {
        children: Vec<NodeId>,
    },
    Leaf {
        ty: TypeId,
        default: Option<StrId>,
        units: Option<StrId>,
    },
    LeafList {
        ty: TypeId,
        /// Defaults in declared order.
        defaults: Vec<StrId>,
        units: Option<StrId>,
        min_elements: u32,
        max_elements: Option<u32>,
    },
    List {
        children: Vec<NodeId>,
        /// Key leaves in declared order.
        keys: Vec<NodeId>,
        /// Each group is a set of descendant leaves that must be unique in
        /// combination across entries.
        uniques: Vec<Vec<NodeId>>,
        min_elements: u32,
        max_elements: Option<u32>,
    },
    Choice {
        /// Cases in source order; order decides default selection.
        cases: Vec<NodeId>,
        default_case: Option<NodeId>,
    },
    Case {
        children: Vec<NodeId>,
    },
    Anydata,
    Anyxml,
    Rpc {
        input: Vec<NodeId>,
        output: Vec<NodeId>,
    },
    Notification {
        children: Vec<NodeId>,
    },
}

impl SchemaNode {
    /// Child node list for interior kinds, empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            SchemaNodeKind::Container { children }
            | SchemaNodeKind::List { children, .. }
            | SchemaNodeKind::Case { children }
            | SchemaNodeKind::Notification { children } => children,
            SchemaNodeKind::Choice { cases, .. } => cases,
            _ => &[],
        }
    }

    /// Whether the node kind can carry a value.
    #[must_use]
    pub fn is_leafy(&self) -> bool {
        matches!(
            self.kind,
            SchemaNodeKind::Leaf { .. } | SchemaNodeKind::LeafList { .. }
        )
    }

    /// Leaf/leaf-list type, if any.
    #[must_use]
    pub fn leaf_type(&self) -> Option<TypeId> {
        match &self.kind {
            SchemaNodeKind::Leaf { ty, .. } | SchemaNodeKind::LeafList { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    /// Whether instances of this node appear in data trees. Choice and case
    /// are schema-only organizational nodes.
    #[must_use]
    pub fn is_data_node(&self) -> bool {
        !matches!(
            self.kind,
            SchemaNodeKind::Choice { .. } | SchemaNodeKind::Case { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = NodeFlags::default();
        assert!(!flags.contains(NodeFlags::CONFIG));
        flags.insert(NodeFlags::CONFIG);
        flags.insert(NodeFlags::MANDATORY);
        assert!(flags.contains(NodeFlags::CONFIG));
        assert!(flags.contains(NodeFlags::MANDATORY));
        flags.remove(NodeFlags::CONFIG);
        assert!(!flags.contains(NodeFlags::CONFIG));
        assert!(flags.contains(NodeFlags::MANDATORY));
    }
}
