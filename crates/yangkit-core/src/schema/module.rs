//! Compiled module metadata.

use super::ids::{IdentityId, ModuleId, NodeId, StrId, TypeId};
use crate::ast::{ParsedModule, YangVersion};

/// An import binding: a prefix usable inside the importing module, bound to a
/// specific module (and thereby revision).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Import {
    /// Prefix text as declared by the importing module.
    pub prefix: StrId,
    /// The imported module.
    pub module: ModuleId,
}

/// A feature declared by a module, with its enablement state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feature {
    /// Feature name.
    pub name: StrId,
    /// Whether the context enables this feature.
    pub enabled: bool,
}

/// A module known to a context.
///
/// A module is either *implemented* (contributes data nodes) or
/// *imported-only* (its typedefs/groupings/identities are usable, its data
/// tree is not). At most one revision of a name may be implemented per
/// context.
#[derive(Clone, Debug)]
pub struct Module {
    /// Module identity within the context.
    pub id: ModuleId,
    /// Module name.
    pub name: StrId,
    /// Latest revision date, if any revision statement was present.
    pub revision: Option<StrId>,
    /// Namespace URI.
    pub namespace: StrId,
    /// The module's own default prefix.
    pub prefix: StrId,
    /// YANG language version.
    pub yang_version: YangVersion,
    /// Whether the module contributes to the data tree.
    pub implemented: bool,
    /// Prefix bindings for imported modules.
    pub imports: Vec<Import>,
    /// Included submodule names.
    pub includes: Vec<StrId>,
    /// Declared features.
    pub features: Vec<Feature>,
    /// Identities declared by this module.
    pub identities: Vec<IdentityId>,
    /// Module-level typedefs, resolvable from importing modules by prefix.
    pub typedefs: Vec<(StrId, TypeId)>,
    /// Compiled top-level data nodes, in source order.
    pub children: Vec<NodeId>,
    /// Compiled rpc nodes.
    pub rpcs: Vec<NodeId>,
    /// Compiled top-level notification nodes.
    pub notifications: Vec<NodeId>,
    /// Modules whose augments landed in this module's tree.
    pub augmented_by: Vec<ModuleId>,
    /// Modules whose deviations modified this module's tree.
    pub deviated_by: Vec<ModuleId>,
    /// The parsed tree this module was compiled from. Retained for
    /// recompilation and snapshots.
    pub parsed: ParsedModule,
    /// Original source text, when the module came from text input.
    pub source: Option<String>,
}

impl Module {
    /// Whether the given feature name is declared and enabled.
    #[must_use]
    pub fn feature_enabled(&self, name: StrId) -> bool {
        self.features
            .iter()
            .any(|f| f.name == name && f.enabled)
    }

    /// Resolve a prefix to a module: the module's own prefix maps to itself,
    /// imported prefixes map to their import.
    #[must_use]
    pub fn resolve_prefix(&self, prefix: StrId) -> Option<ModuleId> {
        if prefix == self.prefix {
            return Some(self.id);
        }
        self.imports
            .iter()
            .find(|imp| imp.prefix == prefix)
            .map(|imp| imp.module)
    }
}
