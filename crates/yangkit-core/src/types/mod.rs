//! Compiled types and restriction machinery.
//!
//! Every `typedef` produces a new compiled type whose base is its `type`
//! statement's referent; the built-ins form the irreducible base set. Derived
//! restrictions must tighten monotonically: a derived range/length part has
//! to fit wholly inside some base part, derived patterns are intersected
//! with the base's, and derived enum/bit sets must be subsets of the base's.

use crate::schema::{ExprId, IdentityId, ModuleId, NodeId, StrId, TypeId};

/// Base kinds of the type system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Decimal64,
    String,
    Boolean,
    Empty,
    Bits,
    Enumeration,
    Identityref,
    InstanceIdentifier,
    Leafref,
    Union,
    Binary,
}

impl TypeKind {
    /// Resolve a built-in type name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "decimal64" => Self::Decimal64,
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "empty" => Self::Empty,
            "bits" => Self::Bits,
            "enumeration" => Self::Enumeration,
            "identityref" => Self::Identityref,
            "instance-identifier" => Self::InstanceIdentifier,
            "leafref" => Self::Leafref,
            "union" => Self::Union,
            "binary" => Self::Binary,
            _ => return None,
        })
    }

    /// Canonical type name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Decimal64 => "decimal64",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Empty => "empty",
            Self::Bits => "bits",
            Self::Enumeration => "enumeration",
            Self::Identityref => "identityref",
            Self::InstanceIdentifier => "instance-identifier",
            Self::Leafref => "leafref",
            Self::Union => "union",
            Self::Binary => "binary",
        }
    }

    /// Whether this is one of the integer kinds.
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
        )
    }

    /// Built-in value bounds for the integer kinds.
    #[must_use]
    pub fn integer_bounds(self) -> Option<(i128, i128)> {
        Some(match self {
            Self::Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Self::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Self::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Self::Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Self::Uint8 => (0, i128::from(u8::MAX)),
            Self::Uint16 => (0, i128::from(u16::MAX)),
            Self::Uint32 => (0, i128::from(u32::MAX)),
            Self::Uint64 => (0, i128::from(u64::MAX)),
            _ => return None,
        })
    }
}

/// A compiled `pattern` restriction.
#[derive(Clone, Debug)]
pub struct CompiledPattern {
    /// Pattern source text.
    pub source: StrId,
    /// Anchored, compiled automaton.
    pub regex: regex::Regex,
    /// `modifier invert-match`.
    pub invert: bool,
    /// Module-defined error message.
    pub error_message: Option<StrId>,
    /// Module-defined error-app-tag.
    pub error_app_tag: Option<StrId>,
}

/// leafref payload.
#[derive(Clone, Debug)]
pub struct LeafrefInfo {
    /// Compiled `path` expression.
    pub path: ExprId,
    /// Prefix bindings at the declaration site.
    pub prefixes: Vec<(StrId, ModuleId)>,
    /// Module whose namespace unprefixed path names resolve to.
    pub cur_module: ModuleId,
    /// Whether the target instance must exist in the data tree.
    pub require_instance: bool,
    /// Resolved target leaf/leaf-list; linked at the end of compilation.
    pub target: Option<NodeId>,
}

/// A compiled type. Shared by id: many leaves reference the same derived
/// type through the context arena.
#[derive(Clone, Debug)]
pub struct CompiledType {
    /// Typedef name; `None` for built-ins and anonymous restrictions.
    pub name: Option<StrId>,
    /// Declaring module; `None` for built-ins.
    pub module: Option<ModuleId>,
    /// Derivation parent; `None` for built-ins.
    pub base: Option<TypeId>,
    /// Base kind, inherited along the derivation chain.
    pub kind: TypeKind,
    /// Value ranges for integer kinds and (scaled) decimal64, ordered and
    /// non-overlapping. Empty means "no restriction beyond the built-in
    /// bounds".
    pub range: Vec<(i128, i128)>,
    /// Length parts for string/binary.
    pub length: Vec<(u64, u64)>,
    /// Patterns accumulated along the derivation chain (intersection
    /// semantics: a value must satisfy all of them).
    pub patterns: Vec<CompiledPattern>,
    /// decimal64 fraction digits.
    pub fraction_digits: u8,
    /// Enumeration items `(label, value)`.
    pub enums: Vec<(StrId, i32)>,
    /// Bit items `(label, position)`.
    pub bits: Vec<(StrId, u32)>,
    /// Union members in declared order.
    pub union: Vec<TypeId>,
    /// leafref payload.
    pub leafref: Option<LeafrefInfo>,
    /// identityref base identities.
    pub identity_bases: Vec<IdentityId>,
    /// Typedef-declared default value, inherited by leaves without their own.
    pub default: Option<StrId>,
    /// instance-identifier presence requirement (leafrefs carry theirs in
    /// [`LeafrefInfo`]).
    pub require_instance: bool,
}

impl CompiledType {
    /// A bare type of the given kind with no restrictions.
    #[must_use]
    pub fn plain(kind: TypeKind) -> Self {
        Self {
            name: None,
            module: None,
            base: None,
            kind,
            range: Vec::new(),
            length: Vec::new(),
            patterns: Vec::new(),
            fraction_digits: 0,
            enums: Vec::new(),
            bits: Vec::new(),
            union: Vec::new(),
            leafref: None,
            identity_bases: Vec::new(),
            default: None,
            require_instance: true,
        }
    }
}

/// Errors from restriction parsing and tightening, reported with the exact
/// failing part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestrictionError {
    /// The range/length argument could not be parsed.
    Malformed(String),
    /// Parts are unordered or overlapping.
    Disordered(String),
    /// A derived part is not contained in any base part.
    NotASubset(String),
}

impl core::fmt::Display for RestrictionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed(part) => write!(f, "malformed restriction part \"{part}\""),
            Self::Disordered(part) => {
                write!(f, "restriction part \"{part}\" is unordered or overlapping")
            }
            Self::NotASubset(part) => write!(
                f,
                "restriction part \"{part}\" is not restricting the base type"
            ),
        }
    }
}

/// Parse and validate a `range`/`length` argument against the base parts.
///
/// The argument grammar is `part ("|" part)*` with `part` being a single
/// value or `lo..hi`; `min`/`max` resolve to the base's outermost bounds.
/// `parse` converts one boundary token to the numeric domain.
///
/// Returns the new parts, ordered and checked for monotonic tightening.
pub fn parse_parts<T, F>(
    arg: &str,
    base: &[(T, T)],
    parse: F,
) -> Result<Vec<(T, T)>, RestrictionError>
where
    T: Copy + PartialOrd,
    F: Fn(&str) -> Option<T>,
{
    let base_min = base.first().map(|part| part.0);
    let base_max = base.last().map(|part| part.1);

    let mut parts: Vec<(T, T)> = Vec::new();
    for part_text in arg.split('|') {
        let part_text = part_text.trim();
        let (lo_text, hi_text) = match part_text.split_once("..") {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (part_text, part_text),
        };

        let resolve = |text: &str, bound: Option<T>| -> Option<T> {
            match text {
                "min" => base_min.or(bound),
                "max" => base_max.or(bound),
                _ => parse(text),
            }
        };
        let lo = resolve(lo_text, None)
            .ok_or_else(|| RestrictionError::Malformed(part_text.to_owned()))?;
        let hi = resolve(hi_text, None)
            .ok_or_else(|| RestrictionError::Malformed(part_text.to_owned()))?;
        if hi < lo {
            return Err(RestrictionError::Malformed(part_text.to_owned()));
        }

        // Parts must be ordered and non-overlapping.
        if let Some(prev) = parts.last() {
            if lo <= prev.1 {
                return Err(RestrictionError::Disordered(part_text.to_owned()));
            }
        }

        // Monotonic tightening: the part must sit wholly inside some base
        // part.
        if !base.is_empty()
            && !base
                .iter()
                .any(|&(base_lo, base_hi)| base_lo <= lo && hi <= base_hi)
        {
            return Err(RestrictionError::NotASubset(part_text.to_owned()));
        }

        parts.push((lo, hi));
    }

    if parts.is_empty() {
        return Err(RestrictionError::Malformed(arg.to_owned()));
    }
    Ok(parts)
}

/// Whether a value falls in any part. An empty part list accepts everything.
#[must_use]
pub fn value_in_parts<T: Copy + PartialOrd>(parts: &[(T, T)], value: T) -> bool {
    parts.is_empty() || parts.iter().any(|&(lo, hi)| lo <= value && value <= hi)
}

/// Parse a decimal64 literal into its scaled integer representation.
///
/// `"2.5"` with 2 fraction digits becomes `250`. Rejects excess fraction
/// digits rather than rounding.
#[must_use]
pub fn parse_decimal64(text: &str, fraction_digits: u8) -> Option<i128> {
    let text = text.trim();
    let negative = text.starts_with('-');
    let unsigned = text.trim_start_matches(['-', '+']);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > fraction_digits as usize {
        return None;
    }

    let mut scaled: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse::<i128>().ok()?
    };
    for _ in 0..fraction_digits {
        scaled = scaled.checked_mul(10)?;
    }

    let mut frac: i128 = 0;
    if !frac_part.is_empty() {
        frac = frac_part.parse::<i128>().ok()?;
        for _ in 0..(fraction_digits as usize - frac_part.len()) {
            frac = frac.checked_mul(10)?;
        }
    }

    Some(if negative { scaled - frac } else { scaled + frac })
}

/// Render a scaled decimal64 back to its canonical form.
#[must_use]
pub fn format_decimal64(scaled: i128, fraction_digits: u8) -> String {
    let negative = scaled < 0;
    let magnitude = scaled.unsigned_abs();
    let divisor = 10u128.pow(u32::from(fraction_digits));
    let int_part = magnitude / divisor;
    let frac_part = magnitude % divisor;
    let sign = if negative { "-" } else { "" };
    format!(
        "{sign}{int_part}.{frac_part:0width$}",
        width = fraction_digits as usize
    )
}

/// Compile one `pattern` into an anchored regex.
///
/// YANG patterns are implicitly anchored at both ends (XSD semantics), so the
/// source is wrapped before compilation.
pub fn compile_pattern(source: &str) -> Result<regex::Regex, regex::Error> {
    regex::Regex::new(&format!("^(?:{source})$"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_parse(s: &str) -> Option<i128> {
        s.parse().ok()
    }

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(TypeKind::from_name("int8"), Some(TypeKind::Int8));
        assert_eq!(TypeKind::from_name("leafref"), Some(TypeKind::Leafref));
        assert_eq!(TypeKind::from_name("integer"), None);
    }

    #[test]
    fn test_parse_single_range() {
        let base = vec![(i128::from(i8::MIN), i128::from(i8::MAX))];
        let parts = parse_parts("0..10", &base, int_parse).unwrap();
        assert_eq!(parts, vec![(0, 10)]);
    }

    #[test]
    fn test_parse_multi_part_range() {
        let base = vec![(0i128, 255)];
        let parts = parse_parts("1..5 | 10 | 20..30", &base, int_parse).unwrap();
        assert_eq!(parts, vec![(1, 5), (10, 10), (20, 30)]);
    }

    #[test]
    fn test_min_max_resolve_to_base() {
        let base = vec![(0i128, 255)];
        let parts = parse_parts("min..10 | 250..max", &base, int_parse).unwrap();
        assert_eq!(parts, vec![(0, 10), (250, 255)]);
    }

    #[test]
    fn test_overlapping_parts_rejected() {
        let base = vec![(0i128, 255)];
        let err = parse_parts("1..10 | 5..20", &base, int_parse).unwrap_err();
        assert!(matches!(err, RestrictionError::Disordered(_)));
    }

    #[test]
    fn test_unordered_parts_rejected() {
        let base = vec![(0i128, 255)];
        let err = parse_parts("20..30 | 1..5", &base, int_parse).unwrap_err();
        assert!(matches!(err, RestrictionError::Disordered(_)));
    }

    #[test]
    fn test_widening_rejected() {
        // Base restricts to 0..10; a derived 0..20 is not a subset.
        let base = vec![(0i128, 10)];
        let err = parse_parts("0..20", &base, int_parse).unwrap_err();
        assert!(matches!(err, RestrictionError::NotASubset(_)));
    }

    #[test]
    fn test_derived_part_must_fit_one_base_part(){
        // Base has a hole at 11..19; a derived part spanning it is invalid.
        let base = vec![(0i128, 10), (20, 30)];
        let err = parse_parts("5..25", &base, int_parse).unwrap_err();
        assert!(matches!(err, RestrictionError::NotASubset(_)));
        // A part inside either base part is fine.
        assert!(parse_parts("5..10 | 20..25", &base, int_parse).is_ok());
    }

    #[test]
    fn test_value_in_parts() {
        let parts = vec![(0i128, 10), (20, 30)];
        assert!(value_in_parts(&parts, 5));
        assert!(value_in_parts(&parts, 20));
        assert!(!value_in_parts(&parts, 15));
        assert!(value_in_parts::<i128>(&[], 12345));
    }

    #[test]
    fn test_decimal64_parse() {
        assert_eq!(parse_decimal64("2.5", 2), Some(250));
        assert_eq!(parse_decimal64("-0.03", 2), Some(-3));
        assert_eq!(parse_decimal64("7", 1), Some(70));
        // Too many fraction digits is an error, not a rounding.
        assert_eq!(parse_decimal64("1.234", 2), None);
        assert_eq!(parse_decimal64("abc", 2), None);
    }

    #[test]
    fn test_decimal64_format() {
        assert_eq!(format_decimal64(250, 2), "2.50");
        assert_eq!(format_decimal64(-3, 2), "-0.03");
        assert_eq!(format_decimal64(0, 1), "0.0");
    }

    #[test]
    fn test_pattern_is_anchored() {
        let re = compile_pattern("[a-z]+").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abc1"));
        assert!(!re.is_match("1abc"));
    }
}
