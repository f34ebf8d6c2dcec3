//! Compiled schema model.
//!
//! The context is the root owner: one dictionary, the module set, and the
//! arenas holding compiled nodes, types, identities, and expressions. All
//! cross-references are arena indices (`NonZeroU32` ids), which keeps the
//! cyclic schema graph (parent back-refs, leafref targets, augment
//! back-links) representable without reference counting.

mod context;
mod ids;
mod interner;
mod module;
mod node;

pub mod identity;

pub use context::{Context, ContextOptions, SchemaFormat};
pub use ids::{DataId, ExprId, IdentityId, ModuleId, NodeId, StrId, TypeId};
pub use identity::Identity;
pub use interner::Dictionary;
pub use module::{Feature, Import, Module};
pub use node::{BoundExpr, ExtInstance, Must, NodeFlags, SchemaNode, SchemaNodeKind};
