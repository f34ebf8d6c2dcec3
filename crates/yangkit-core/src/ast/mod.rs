//! Parsed module tree.
//!
//! Statements straight out of the parser: nothing is resolved, prefixes are
//! raw text, and source order is preserved wherever it affects semantics
//! (union member order, leaf-list defaults, case order).

use crate::lexer::{Diagnostic, Span};

/// YANG language version of a module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum YangVersion {
    /// RFC 6020.
    #[default]
    V1,
    /// RFC 7950.
    V1_1,
}

/// `status` statement value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AstStatus {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

/// `ordered-by` statement value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AstOrderedBy {
    #[default]
    System,
    User,
}

/// A parsed module or submodule.
#[derive(Clone, Debug, Default)]
pub struct ParsedModule {
    pub name: String,
    pub is_submodule: bool,
    pub yang_version: YangVersion,
    /// Module only.
    pub namespace: Option<String>,
    /// Module only.
    pub prefix: Option<String>,
    /// Submodule only: `(module, prefix)`.
    pub belongs_to: Option<(String, String)>,
    pub imports: Vec<AstImport>,
    pub includes: Vec<AstInclude>,
    pub organization: Option<String>,
    pub contact: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub revisions: Vec<AstRevision>,
    pub features: Vec<AstFeature>,
    pub identities: Vec<AstIdentity>,
    pub typedefs: Vec<AstTypedef>,
    pub groupings: Vec<AstGrouping>,
    pub extensions: Vec<AstExtensionDef>,
    /// Data-definition statements in source order.
    pub body: Vec<AstNode>,
    pub augments: Vec<AstAugment>,
    pub deviations: Vec<AstDeviation>,
    pub rpcs: Vec<AstRpc>,
    pub notifications: Vec<AstNotification>,
    pub ext_instances: Vec<AstExtInstance>,
    pub diagnostics: Vec<Diagnostic>,
    pub span: Span,
}

/// `import` statement.
#[derive(Clone, Debug)]
pub struct AstImport {
    pub module: String,
    pub prefix: String,
    pub revision_date: Option<String>,
    pub span: Span,
}

/// `include` statement.
#[derive(Clone, Debug)]
pub struct AstInclude {
    pub module: String,
    pub revision_date: Option<String>,
    pub span: Span,
}

/// `revision` statement.
#[derive(Clone, Debug)]
pub struct AstRevision {
    pub date: String,
    pub description: Option<String>,
    pub reference: Option<String>,
}

/// `feature` statement.
#[derive(Clone, Debug)]
pub struct AstFeature {
    pub name: String,
    pub if_features: Vec<String>,
    pub status: AstStatus,
    pub description: Option<String>,
}

/// `identity` statement.
#[derive(Clone, Debug)]
pub struct AstIdentity {
    pub name: String,
    /// Base identity names, possibly prefixed.
    pub bases: Vec<String>,
    pub if_features: Vec<String>,
    pub status: AstStatus,
    pub description: Option<String>,
    pub span: Span,
}

/// `typedef` statement.
#[derive(Clone, Debug)]
pub struct AstTypedef {
    pub name: String,
    pub ty: AstType,
    pub units: Option<String>,
    pub default: Option<String>,
    pub status: AstStatus,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub span: Span,
}

/// `grouping` statement.
#[derive(Clone, Debug)]
pub struct AstGrouping {
    pub name: String,
    pub status: AstStatus,
    pub description: Option<String>,
    pub typedefs: Vec<AstTypedef>,
    pub groupings: Vec<AstGrouping>,
    pub children: Vec<AstNode>,
    pub span: Span,
}

/// `extension` definition statement.
#[derive(Clone, Debug)]
pub struct AstExtensionDef {
    pub name: String,
    /// `(argument name, yin-element)` when the extension takes an argument.
    pub argument: Option<(String, bool)>,
    pub status: AstStatus,
    pub description: Option<String>,
}

/// An extension instance: an unknown namespaced keyword kept for the
/// compiler.
#[derive(Clone, Debug)]
pub struct AstExtInstance {
    /// Raw prefix before the colon.
    pub prefix: String,
    /// Extension keyword after the colon.
    pub keyword: String,
    pub argument: Option<String>,
    pub substmts: Vec<AstExtInstance>,
    pub span: Span,
}

/// `type` statement with its restriction substatements.
#[derive(Clone, Debug, Default)]
pub struct AstType {
    /// Type name, possibly prefixed.
    pub name: String,
    pub range: Option<String>,
    pub length: Option<String>,
    pub patterns: Vec<AstPattern>,
    pub fraction_digits: Option<u8>,
    /// leafref target path.
    pub path: Option<String>,
    pub require_instance: Option<bool>,
    /// identityref bases, possibly prefixed.
    pub bases: Vec<String>,
    pub enums: Vec<AstEnumItem>,
    pub bits: Vec<AstBitItem>,
    /// Union member types in declared order.
    pub union: Vec<AstType>,
    pub span: Span,
}

/// `pattern` restriction.
#[derive(Clone, Debug)]
pub struct AstPattern {
    pub expr: String,
    /// `modifier invert-match`.
    pub invert: bool,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
}

/// `enum` item.
#[derive(Clone, Debug)]
pub struct AstEnumItem {
    pub name: String,
    pub value: Option<i32>,
    pub status: AstStatus,
    pub description: Option<String>,
}

/// `bit` item.
#[derive(Clone, Debug)]
pub struct AstBitItem {
    pub name: String,
    pub position: Option<u32>,
    pub status: AstStatus,
    pub description: Option<String>,
}

/// `must` restriction.
#[derive(Clone, Debug)]
pub struct AstMust {
    pub cond: String,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
}

/// Substatements shared by all data-definition statements.
#[derive(Clone, Debug, Default)]
pub struct AstNodeCommon {
    pub name: String,
    pub when: Option<String>,
    pub if_features: Vec<String>,
    pub config: Option<bool>,
    pub status: AstStatus,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub ext_instances: Vec<AstExtInstance>,
    pub span: Span,
}

/// A data-definition statement.
#[derive(Clone, Debug)]
pub enum AstNode {
    Container(AstContainer),
    Leaf(AstLeaf),
    LeafList(AstLeafList),
    List(AstList),
    Choice(AstChoice),
    Case(AstCase),
    Anydata(AstAny),
    Anyxml(AstAny),
    Uses(AstUses),
}

impl AstNode {
    /// Common substatements of the node.
    #[must_use]
    pub fn common(&self) -> &AstNodeCommon {
        match self {
            Self::Container(n) => &n.common,
            Self::Leaf(n) => &n.common,
            Self::LeafList(n) => &n.common,
            Self::List(n) => &n.common,
            Self::Choice(n) => &n.common,
            Self::Case(n) => &n.common,
            Self::Anydata(n) | Self::Anyxml(n) => &n.common,
            Self::Uses(n) => &n.common,
        }
    }
}

/// `container` statement.
#[derive(Clone, Debug)]
pub struct AstContainer {
    pub common: AstNodeCommon,
    pub presence: Option<String>,
    pub musts: Vec<AstMust>,
    pub typedefs: Vec<AstTypedef>,
    pub groupings: Vec<AstGrouping>,
    pub children: Vec<AstNode>,
    pub actions: Vec<AstRpc>,
    pub notifications: Vec<AstNotification>,
}

/// `leaf` statement.
#[derive(Clone, Debug)]
pub struct AstLeaf {
    pub common: AstNodeCommon,
    pub ty: AstType,
    pub units: Option<String>,
    pub default: Option<String>,
    pub mandatory: Option<bool>,
    pub musts: Vec<AstMust>,
}

/// `leaf-list` statement.
#[derive(Clone, Debug)]
pub struct AstLeafList {
    pub common: AstNodeCommon,
    pub ty: AstType,
    pub units: Option<String>,
    /// Defaults in declared order (YANG 1.1).
    pub defaults: Vec<String>,
    pub min_elements: Option<u32>,
    pub max_elements: Option<u32>,
    pub ordered_by: AstOrderedBy,
    pub musts: Vec<AstMust>,
}

/// `list` statement.
#[derive(Clone, Debug)]
pub struct AstList {
    pub common: AstNodeCommon,
    /// Space-separated key leaf names.
    pub key: Option<String>,
    /// Each entry is one `unique` argument (space-separated descendant paths).
    pub uniques: Vec<String>,
    pub min_elements: Option<u32>,
    pub max_elements: Option<u32>,
    pub ordered_by: AstOrderedBy,
    pub musts: Vec<AstMust>,
    pub typedefs: Vec<AstTypedef>,
    pub groupings: Vec<AstGrouping>,
    pub children: Vec<AstNode>,
    pub actions: Vec<AstRpc>,
    pub notifications: Vec<AstNotification>,
}

/// `choice` statement.
#[derive(Clone, Debug)]
pub struct AstChoice {
    pub common: AstNodeCommon,
    pub default_case: Option<String>,
    pub mandatory: Option<bool>,
    /// Cases (explicit or shorthand) in source order; order decides the
    /// default-selection tie-break.
    pub cases: Vec<AstNode>,
}

/// `case` statement.
#[derive(Clone, Debug)]
pub struct AstCase {
    pub common: AstNodeCommon,
    pub children: Vec<AstNode>,
}

/// `anydata` / `anyxml` statement.
#[derive(Clone, Debug)]
pub struct AstAny {
    pub common: AstNodeCommon,
    pub mandatory: Option<bool>,
    pub musts: Vec<AstMust>,
}

/// `uses` statement.
#[derive(Clone, Debug)]
pub struct AstUses {
    pub common: AstNodeCommon,
    pub refines: Vec<AstRefine>,
    pub augments: Vec<AstAugment>,
}

/// `refine` statement under `uses`.
#[derive(Clone, Debug, Default)]
pub struct AstRefine {
    /// Descendant schema node path relative to the grouping root.
    pub target: String,
    pub description: Option<String>,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub presence: Option<String>,
    pub defaults: Vec<String>,
    pub min_elements: Option<u32>,
    pub max_elements: Option<u32>,
    pub musts: Vec<AstMust>,
}

/// `augment` statement (top-level or under `uses`).
#[derive(Clone, Debug)]
pub struct AstAugment {
    /// Absolute target path (top-level) or descendant path (under `uses`).
    pub target: String,
    pub when: Option<String>,
    pub if_features: Vec<String>,
    pub status: AstStatus,
    pub children: Vec<AstNode>,
    pub actions: Vec<AstRpc>,
    pub notifications: Vec<AstNotification>,
    pub span: Span,
}

/// `deviation` statement.
#[derive(Clone, Debug)]
pub struct AstDeviation {
    /// Absolute target path.
    pub target: String,
    pub description: Option<String>,
    pub deviates: Vec<AstDeviate>,
    pub span: Span,
}

/// One `deviate` substatement.
#[derive(Clone, Debug)]
pub enum AstDeviate {
    NotSupported,
    Add(AstDeviateProps),
    Replace(AstDeviateProps),
    Delete(AstDeviateProps),
}

/// Properties carried by `deviate add`/`replace`/`delete`.
#[derive(Clone, Debug, Default)]
pub struct AstDeviateProps {
    pub ty: Option<AstType>,
    pub units: Option<String>,
    pub musts: Vec<AstMust>,
    pub uniques: Vec<String>,
    pub defaults: Vec<String>,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub min_elements: Option<u32>,
    pub max_elements: Option<u32>,
}

/// `rpc` or `action` statement.
#[derive(Clone, Debug)]
pub struct AstRpc {
    pub name: String,
    pub if_features: Vec<String>,
    pub status: AstStatus,
    pub description: Option<String>,
    pub typedefs: Vec<AstTypedef>,
    pub groupings: Vec<AstGrouping>,
    pub input: Option<AstInOut>,
    pub output: Option<AstInOut>,
    pub span: Span,
}

/// `input` or `output` block.
#[derive(Clone, Debug, Default)]
pub struct AstInOut {
    pub musts: Vec<AstMust>,
    pub typedefs: Vec<AstTypedef>,
    pub groupings: Vec<AstGrouping>,
    pub children: Vec<AstNode>,
}

/// `notification` statement.
#[derive(Clone, Debug)]
pub struct AstNotification {
    pub name: String,
    pub if_features: Vec<String>,
    pub status: AstStatus,
    pub description: Option<String>,
    pub musts: Vec<AstMust>,
    pub typedefs: Vec<AstTypedef>,
    pub groupings: Vec<AstGrouping>,
    pub children: Vec<AstNode>,
    pub span: Span,
}
