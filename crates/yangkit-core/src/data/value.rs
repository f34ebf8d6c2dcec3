//! Leaf value parsing and canonicalization.
//!
//! Values arrive as text (whatever the input encoding) and are checked
//! against the leaf's compiled type: canonical form plus a type-specific
//! parsed form come out, or a message suitable for the error chain.

use base64::Engine as _;

use crate::schema::identity::is_derived_from_or_self;
use crate::schema::{Context, TypeId};
use crate::types::{format_decimal64, parse_decimal64, value_in_parts, TypeKind};

use super::tree::{DataValue, ParsedValue};

/// A value that failed its type.
#[derive(Clone, Debug)]
pub struct ValueError {
    /// Failure description, identifiers quoted.
    pub message: String,
    /// Module-defined error-app-tag, when the failing restriction declares
    /// one.
    pub app_tag: Option<String>,
}

impl ValueError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            app_tag: None,
        }
    }
}

/// Parse and canonicalize one value against a compiled type.
///
/// # Errors
///
/// [`ValueError`] with a message naming the failing restriction.
pub fn parse_value(ctx: &Context, ty_id: TypeId, text: &str) -> Result<DataValue, ValueError> {
    let ty = ctx.ty(ty_id);
    match ty.kind {
        TypeKind::Int8
        | TypeKind::Int16
        | TypeKind::Int32
        | TypeKind::Int64
        | TypeKind::Uint8
        | TypeKind::Uint16
        | TypeKind::Uint32
        | TypeKind::Uint64 => {
            let kind = ty.kind;
            let value: i128 = text
                .trim()
                .parse()
                .map_err(|_| ValueError::new(format!("invalid {} value \"{text}\"", kind.as_str())))?;
            let bounds = kind.integer_bounds().expect("integer kind");
            if value < bounds.0 || value > bounds.1 {
                return Err(ValueError::new(format!(
                    "value \"{text}\" is out of {} bounds",
                    kind.as_str()
                )));
            }
            if !value_in_parts(&ty.range, value) {
                return Err(ValueError::new(format!(
                    "value \"{text}\" is outside the allowed range"
                )));
            }
            let parsed = if matches!(
                kind,
                TypeKind::Uint8 | TypeKind::Uint16 | TypeKind::Uint32 | TypeKind::Uint64
            ) {
                ParsedValue::Uint(value as u64)
            } else {
                ParsedValue::Int(value as i64)
            };
            Ok(DataValue {
                canonical: value.to_string(),
                parsed,
            })
        }
        TypeKind::Decimal64 => {
            let digits = ty.fraction_digits;
            let scaled = parse_decimal64(text, digits)
                .ok_or_else(|| ValueError::new(format!("invalid decimal64 value \"{text}\"")))?;
            if !value_in_parts(&ty.range, scaled) {
                return Err(ValueError::new(format!(
                    "value \"{text}\" is outside the allowed range"
                )));
            }
            let scaled64 = i64::try_from(scaled)
                .map_err(|_| ValueError::new(format!("decimal64 value \"{text}\" overflows")))?;
            Ok(DataValue {
                canonical: format_decimal64(scaled, digits),
                parsed: ParsedValue::Decimal {
                    scaled: scaled64,
                    digits,
                },
            })
        }
        TypeKind::String => {
            let chars = text.chars().count() as u64;
            if !value_in_parts(&ty.length, chars) {
                return Err(ValueError::new(format!(
                    "string length {chars} is outside the allowed length"
                )));
            }
            for pattern in &ty.patterns {
                let matched = pattern.regex.is_match(text);
                if matched == pattern.invert {
                    let message = pattern
                        .error_message
                        .map(|m| ctx.str(m).to_owned())
                        .unwrap_or_else(|| {
                            format!(
                                "value \"{text}\" does not match pattern \"{}\"",
                                ctx.str(pattern.source)
                            )
                        });
                    return Err(ValueError {
                        message,
                        app_tag: pattern.error_app_tag.map(|t| ctx.str(t).to_owned()),
                    });
                }
            }
            Ok(DataValue {
                canonical: text.to_owned(),
                parsed: ParsedValue::Str,
            })
        }
        TypeKind::Boolean => match text.trim() {
            "true" => Ok(DataValue {
                canonical: "true".into(),
                parsed: ParsedValue::Bool(true),
            }),
            "false" => Ok(DataValue {
                canonical: "false".into(),
                parsed: ParsedValue::Bool(false),
            }),
            _ => Err(ValueError::new(format!("invalid boolean value \"{text}\""))),
        },
        TypeKind::Empty => {
            if text.is_empty() {
                Ok(DataValue {
                    canonical: String::new(),
                    parsed: ParsedValue::Empty,
                })
            } else {
                Err(ValueError::new(format!(
                    "empty type cannot carry value \"{text}\""
                )))
            }
        }
        TypeKind::Bits => {
            let mut labels: Vec<(u32, String)> = Vec::new();
            for label in text.split_whitespace() {
                let Some(label_id) = ctx.dict.find(label) else {
                    return Err(ValueError::new(format!("unknown bit \"{label}\"")));
                };
                let Some(&(_, position)) = ty.bits.iter().find(|&&(n, _)| n == label_id) else {
                    return Err(ValueError::new(format!("unknown bit \"{label}\"")));
                };
                if labels.iter().any(|(p, _)| *p == position) {
                    return Err(ValueError::new(format!("duplicate bit \"{label}\"")));
                }
                labels.push((position, label.to_owned()));
            }
            // Canonical order is by bit position.
            labels.sort_by_key(|(position, _)| *position);
            let ordered: Vec<String> = labels.into_iter().map(|(_, label)| label).collect();
            Ok(DataValue {
                canonical: ordered.join(" "),
                parsed: ParsedValue::Bits(ordered),
            })
        }
        TypeKind::Enumeration => {
            let Some(name_id) = ctx.dict.find(text) else {
                return Err(ValueError::new(format!("invalid enum value \"{text}\"")));
            };
            let Some(&(_, value)) = ty.enums.iter().find(|&&(n, _)| n == name_id) else {
                return Err(ValueError::new(format!("invalid enum value \"{text}\"")));
            };
            Ok(DataValue {
                canonical: text.to_owned(),
                parsed: ParsedValue::Enum(value),
            })
        }
        TypeKind::Identityref => {
            // The canonical form is "module-name:identity"; a bare name
            // resolves against all modules.
            let identity = match text.split_once(':') {
                Some((module_name, local)) => ctx
                    .get_module(module_name, None)
                    .map(|m| m.id)
                    .and_then(|module| ctx.find_identity(module, local)),
                None => ctx
                    .modules()
                    .find_map(|module| ctx.find_identity(module.id, text)),
            };
            let Some(identity) = identity else {
                return Err(ValueError::new(format!("unknown identity \"{text}\"")));
            };
            // A value naming the base itself is not a valid instance of it.
            let derived = ty.identity_bases.iter().any(|&base| {
                identity != base && is_derived_from_or_self(ctx.identities(), identity, base)
            });
            if !derived {
                return Err(ValueError::new(format!(
                    "identity \"{text}\" is not derived from the required base"
                )));
            }
            let ident = ctx.identity(identity);
            let module_name = ctx.str(ctx.modules[ident.module.to_index()].name);
            Ok(DataValue {
                canonical: format!("{module_name}:{}", ctx.str(ident.name)),
                parsed: ParsedValue::IdentityRef(identity),
            })
        }
        TypeKind::Binary => {
            let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(cleaned.as_bytes())
                .map_err(|_| ValueError::new(format!("invalid base64 value \"{text}\"")))?;
            if !value_in_parts(&ty.length, bytes.len() as u64) {
                return Err(ValueError::new(format!(
                    "binary length {} is outside the allowed length",
                    bytes.len()
                )));
            }
            Ok(DataValue {
                canonical: cleaned,
                parsed: ParsedValue::Binary(bytes),
            })
        }
        TypeKind::Union => {
            // Members validate in declared order; the first match wins.
            for (idx, &member) in ty.union.iter().enumerate() {
                if let Ok(value) = parse_value(ctx, member, text) {
                    return Ok(DataValue {
                        canonical: value.canonical,
                        parsed: ParsedValue::Union {
                            member: idx,
                            value: Box::new(value.parsed),
                        },
                    });
                }
            }
            Err(ValueError::new(format!(
                "value \"{text}\" does not match any union member"
            )))
        }
        TypeKind::Leafref => {
            // The value space is the target's; existence is checked during
            // validation when require-instance is set.
            if let Some(target) = ty.leafref.as_ref().and_then(|info| info.target) {
                if let Some(target_ty) = ctx.node(target).leaf_type() {
                    return parse_value(ctx, target_ty, text);
                }
            }
            Ok(DataValue {
                canonical: text.to_owned(),
                parsed: ParsedValue::Str,
            })
        }
        TypeKind::InstanceIdentifier => Ok(DataValue {
            canonical: text.to_owned(),
            parsed: ParsedValue::InstanceId,
        }),
    }
}
