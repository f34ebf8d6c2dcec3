//! Statement keyword table.
//!
//! Keyword recognition is a binary search over a sorted static array followed
//! by an exact compare. The keyword set is small and fixed, so this beats a
//! generic hash on the parser hot path and costs nothing to maintain.
//!
//! Each entry also records the statement's argument name and whether the YIN
//! form carries the argument as a child element (`yin-element`) instead of an
//! attribute.

/// YANG statement keywords.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StmtKind {
    Action,
    Anydata,
    Anyxml,
    Argument,
    Augment,
    Base,
    BelongsTo,
    Bit,
    Case,
    Choice,
    Config,
    Contact,
    Container,
    Default,
    Description,
    Deviate,
    Deviation,
    Enum,
    ErrorAppTag,
    ErrorMessage,
    Extension,
    Feature,
    FractionDigits,
    Grouping,
    Identity,
    IfFeature,
    Import,
    Include,
    Input,
    Key,
    Leaf,
    LeafList,
    Length,
    List,
    Mandatory,
    MaxElements,
    MinElements,
    Modifier,
    Module,
    Must,
    Namespace,
    Notification,
    OrderedBy,
    Organization,
    Output,
    Path,
    Pattern,
    Position,
    Prefix,
    Presence,
    Range,
    Reference,
    Refine,
    RequireInstance,
    Revision,
    RevisionDate,
    Rpc,
    Status,
    Submodule,
    Type,
    Typedef,
    Unique,
    Units,
    Uses,
    Value,
    When,
    YangVersion,
    YinElement,
}

/// Module-level section ordering. A statement whose section is lower than the
/// current maximum is out of order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    /// yang-version, namespace, prefix, belongs-to.
    Header,
    /// import, include.
    Linkage,
    /// organization, contact, description, reference.
    Meta,
    /// revision.
    Revision,
    /// Everything else.
    Body,
}

impl StmtKind {
    /// Section this statement belongs to when it appears at module level.
    #[must_use]
    pub fn section(self) -> Section {
        match self {
            Self::YangVersion | Self::Namespace | Self::Prefix | Self::BelongsTo => Section::Header,
            Self::Import | Self::Include => Section::Linkage,
            Self::Organization | Self::Contact | Self::Description | Self::Reference => {
                Section::Meta
            }
            Self::Revision => Section::Revision,
            _ => Section::Body,
        }
    }

    /// Whether this statement defines a data-definition node.
    #[must_use]
    pub fn is_data_def(self) -> bool {
        matches!(
            self,
            Self::Container
                | Self::Leaf
                | Self::LeafList
                | Self::List
                | Self::Choice
                | Self::Case
                | Self::Anydata
                | Self::Anyxml
                | Self::Uses
        )
    }
}

struct KeywordEntry {
    text: &'static str,
    kind: StmtKind,
    /// YIN argument name, if the statement takes an argument.
    argument: Option<&'static str>,
    /// True when the YIN argument is a child element rather than an attribute.
    yin_element: bool,
}

/// Sorted keyword table for binary search.
///
/// IMPORTANT: entries MUST stay sorted by `text`; `test_keywords_sorted`
/// verifies this.
static KEYWORDS: &[KeywordEntry] = &[
    KeywordEntry { text: "action", kind: StmtKind::Action, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "anydata", kind: StmtKind::Anydata, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "anyxml", kind: StmtKind::Anyxml, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "argument", kind: StmtKind::Argument, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "augment", kind: StmtKind::Augment, argument: Some("target-node"), yin_element: false },
    KeywordEntry { text: "base", kind: StmtKind::Base, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "belongs-to", kind: StmtKind::BelongsTo, argument: Some("module"), yin_element: false },
    KeywordEntry { text: "bit", kind: StmtKind::Bit, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "case", kind: StmtKind::Case, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "choice", kind: StmtKind::Choice, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "config", kind: StmtKind::Config, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "contact", kind: StmtKind::Contact, argument: Some("text"), yin_element: true },
    KeywordEntry { text: "container", kind: StmtKind::Container, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "default", kind: StmtKind::Default, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "description", kind: StmtKind::Description, argument: Some("text"), yin_element: true },
    KeywordEntry { text: "deviate", kind: StmtKind::Deviate, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "deviation", kind: StmtKind::Deviation, argument: Some("target-node"), yin_element: false },
    KeywordEntry { text: "enum", kind: StmtKind::Enum, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "error-app-tag", kind: StmtKind::ErrorAppTag, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "error-message", kind: StmtKind::ErrorMessage, argument: Some("value"), yin_element: true },
    KeywordEntry { text: "extension", kind: StmtKind::Extension, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "feature", kind: StmtKind::Feature, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "fraction-digits", kind: StmtKind::FractionDigits, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "grouping", kind: StmtKind::Grouping, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "identity", kind: StmtKind::Identity, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "if-feature", kind: StmtKind::IfFeature, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "import", kind: StmtKind::Import, argument: Some("module"), yin_element: false },
    KeywordEntry { text: "include", kind: StmtKind::Include, argument: Some("module"), yin_element: false },
    KeywordEntry { text: "input", kind: StmtKind::Input, argument: None, yin_element: false },
    KeywordEntry { text: "key", kind: StmtKind::Key, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "leaf", kind: StmtKind::Leaf, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "leaf-list", kind: StmtKind::LeafList, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "length", kind: StmtKind::Length, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "list", kind: StmtKind::List, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "mandatory", kind: StmtKind::Mandatory, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "max-elements", kind: StmtKind::MaxElements, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "min-elements", kind: StmtKind::MinElements, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "modifier", kind: StmtKind::Modifier, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "module", kind: StmtKind::Module, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "must", kind: StmtKind::Must, argument: Some("condition"), yin_element: false },
    KeywordEntry { text: "namespace", kind: StmtKind::Namespace, argument: Some("uri"), yin_element: false },
    KeywordEntry { text: "notification", kind: StmtKind::Notification, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "ordered-by", kind: StmtKind::OrderedBy, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "organization", kind: StmtKind::Organization, argument: Some("text"), yin_element: true },
    KeywordEntry { text: "output", kind: StmtKind::Output, argument: None, yin_element: false },
    KeywordEntry { text: "path", kind: StmtKind::Path, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "pattern", kind: StmtKind::Pattern, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "position", kind: StmtKind::Position, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "prefix", kind: StmtKind::Prefix, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "presence", kind: StmtKind::Presence, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "range", kind: StmtKind::Range, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "reference", kind: StmtKind::Reference, argument: Some("text"), yin_element: true },
    KeywordEntry { text: "refine", kind: StmtKind::Refine, argument: Some("target-node"), yin_element: false },
    KeywordEntry { text: "require-instance", kind: StmtKind::RequireInstance, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "revision", kind: StmtKind::Revision, argument: Some("date"), yin_element: false },
    KeywordEntry { text: "revision-date", kind: StmtKind::RevisionDate, argument: Some("date"), yin_element: false },
    KeywordEntry { text: "rpc", kind: StmtKind::Rpc, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "status", kind: StmtKind::Status, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "submodule", kind: StmtKind::Submodule, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "type", kind: StmtKind::Type, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "typedef", kind: StmtKind::Typedef, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "unique", kind: StmtKind::Unique, argument: Some("tag"), yin_element: false },
    KeywordEntry { text: "units", kind: StmtKind::Units, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "uses", kind: StmtKind::Uses, argument: Some("name"), yin_element: false },
    KeywordEntry { text: "value", kind: StmtKind::Value, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "when", kind: StmtKind::When, argument: Some("condition"), yin_element: false },
    KeywordEntry { text: "yang-version", kind: StmtKind::YangVersion, argument: Some("value"), yin_element: false },
    KeywordEntry { text: "yin-element", kind: StmtKind::YinElement, argument: Some("value"), yin_element: false },
];

/// Look up a statement keyword.
#[must_use]
pub fn lookup(text: &str) -> Option<StmtKind> {
    KEYWORDS
        .binary_search_by(|entry| entry.text.cmp(text))
        .ok()
        .map(|idx| KEYWORDS[idx].kind)
}

/// YIN argument name for a statement, `None` for argument-less statements.
#[must_use]
pub fn argument_name(kind: StmtKind) -> Option<&'static str> {
    KEYWORDS
        .iter()
        .find(|entry| entry.kind == kind)
        .and_then(|entry| entry.argument)
}

/// Whether the YIN form carries the argument as a child element.
#[must_use]
pub fn yin_element(kind: StmtKind) -> bool {
    KEYWORDS
        .iter()
        .find(|entry| entry.kind == kind)
        .is_some_and(|entry| entry.yin_element)
}

/// Keyword text for a statement kind.
#[must_use]
pub fn keyword_text(kind: StmtKind) -> &'static str {
    KEYWORDS
        .iter()
        .find(|entry| entry.kind == kind)
        .map_or("", |entry| entry.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_sorted() {
        for window in KEYWORDS.windows(2) {
            assert!(
                window[0].text < window[1].text,
                "keyword table out of order: {} >= {}",
                window[0].text,
                window[1].text
            );
        }
    }

    #[test]
    fn test_lookup_hits() {
        assert_eq!(lookup("module"), Some(StmtKind::Module));
        assert_eq!(lookup("leaf-list"), Some(StmtKind::LeafList));
        assert_eq!(lookup("yin-element"), Some(StmtKind::YinElement));
        assert_eq!(lookup("action"), Some(StmtKind::Action));
    }

    #[test]
    fn test_lookup_misses() {
        assert_eq!(lookup("modul"), None);
        assert_eq!(lookup("moduleX"), None);
        assert_eq!(lookup(""), None);
        assert_eq!(lookup("LEAF"), None);
    }

    #[test]
    fn test_argument_names() {
        assert_eq!(argument_name(StmtKind::Module), Some("name"));
        assert_eq!(argument_name(StmtKind::Augment), Some("target-node"));
        assert_eq!(argument_name(StmtKind::Input), None);
        assert_eq!(argument_name(StmtKind::Output), None);
    }

    #[test]
    fn test_yin_element_flags() {
        assert!(yin_element(StmtKind::Description));
        assert!(yin_element(StmtKind::Organization));
        assert!(yin_element(StmtKind::ErrorMessage));
        assert!(!yin_element(StmtKind::Namespace));
        assert!(!yin_element(StmtKind::Leaf));
    }

    #[test]
    fn test_sections_ordered() {
        assert!(StmtKind::Namespace.section() < StmtKind::Import.section());
        assert!(StmtKind::Import.section() < StmtKind::Organization.section());
        assert!(StmtKind::Organization.section() < StmtKind::Revision.section());
        assert!(StmtKind::Revision.section() < StmtKind::Container.section());
    }
}
