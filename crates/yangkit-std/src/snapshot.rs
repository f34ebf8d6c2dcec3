//! Context snapshots with fingerprint support.
//!
//! A snapshot stores the module sources and metadata of a context; loading
//! re-parses and recompiles them, which by the semantic-idempotency property
//! reconstructs an equivalent compiled graph. The fingerprint lets callers
//! detect stale snapshots without deserializing the payload.
//!
//! # File Format
//!
//! Snapshot files use the `.ykit` extension by convention:
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header (13 or 45 bytes)                │
//! │   magic: [u8; 4]        "YKIT"         │
//! │   version: u32          Schema version │
//! │   has_fingerprint: u8   0 or 1         │
//! │   fingerprint: [u8; 32] (if present)   │
//! ├────────────────────────────────────────┤
//! │ Payload (postcard-encoded parts)       │
//! └────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use yangkit_core::schema::SchemaFormat;
use yangkit_core::{Context, ContextOptions};

/// Current snapshot version. Bump on any breaking change to the format.
pub const SCHEMA_VERSION: u32 = 1;

/// Magic bytes identifying a yangkit snapshot.
const MAGIC: [u8; 4] = *b"YKIT";

/// Snapshot error.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid magic bytes (expected YKIT)")]
    InvalidMagic,
    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("fingerprint mismatch")]
    FingerprintMismatch,
    #[error("truncated header")]
    TruncatedHeader,
    #[error("a module has no retained source and cannot be snapshotted")]
    MissingSource,
    #[error("postcard deserialization failed: {0}")]
    DeserializationFailed(postcard::Error),
    #[error("context rebuild failed: {0}")]
    Rebuild(yangkit_core::Error),
}

/// One module of a snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    /// Module name.
    pub name: String,
    /// Revision date, when declared.
    pub revision: Option<String>,
    /// Canonical YANG source text.
    pub source: String,
    /// Whether the module was implemented.
    pub implemented: bool,
}

/// Decomposed snapshot payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotParts {
    /// Modules in implementation order.
    pub modules: Vec<ModuleSnapshot>,
}

/// Compute a fingerprint over module sources.
///
/// Includes the snapshot version so format changes invalidate old files;
/// modules are hashed sorted by name for determinism.
#[must_use]
pub fn compute_fingerprint(parts: &SnapshotParts) -> [u8; 32] {
    let mut sorted: Vec<&ModuleSnapshot> = parts.modules.iter().collect();
    sorted.sort_by_key(|m| m.name.as_str());

    let mut hasher = Sha256::new();
    hasher.update(SCHEMA_VERSION.to_le_bytes());
    for module in sorted {
        hasher.update(module.name.as_bytes());
        hasher.update(module.source.as_bytes());
    }
    hasher.finalize().into()
}

/// Decompose a context into snapshot parts.
///
/// # Errors
///
/// [`SnapshotError::MissingSource`] when a module was loaded without
/// retained source (YIN input keeps its XML text the same way).
pub fn snapshot_parts(ctx: &Context) -> Result<SnapshotParts, SnapshotError> {
    let mut modules = Vec::new();
    for module in ctx.modules() {
        let source = module
            .source
            .clone()
            .ok_or(SnapshotError::MissingSource)?;
        modules.push(ModuleSnapshot {
            name: ctx.str(module.name).to_owned(),
            revision: module.revision.map(|rev| ctx.str(rev).to_owned()),
            source,
            implemented: module.implemented,
        });
    }
    Ok(SnapshotParts { modules })
}

/// Serialize a context to snapshot bytes.
///
/// # Errors
///
/// As [`snapshot_parts`].
pub fn serialize_context(
    ctx: &Context,
    fingerprint: Option<[u8; 32]>,
) -> Result<Vec<u8>, SnapshotError> {
    let parts = snapshot_parts(ctx)?;

    let mut bytes = Vec::with_capacity(64 * 1024);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    if let Some(fp) = fingerprint {
        bytes.push(1);
        bytes.extend_from_slice(&fp);
    } else {
        bytes.push(0);
    }

    let payload = postcard::to_allocvec(&parts).expect("serialization should not fail");
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a context from snapshot bytes, re-parsing and recompiling the
/// stored modules.
///
/// # Errors
///
/// Header errors, fingerprint mismatch (when verification was requested),
/// payload corruption, and rebuild failures.
pub fn deserialize_context(
    bytes: &[u8],
    expected_fingerprint: Option<&[u8; 32]>,
) -> Result<Context, SnapshotError> {
    // Minimum header: magic(4) + version(4) + has_fp(1).
    if bytes.len() < 9 {
        return Err(SnapshotError::TruncatedHeader);
    }
    if bytes[0..4] != MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != SCHEMA_VERSION {
        return Err(SnapshotError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found: version,
        });
    }

    let has_fingerprint = bytes[8] != 0;
    let payload_start = if has_fingerprint {
        if bytes.len() < 9 + 32 {
            return Err(SnapshotError::TruncatedHeader);
        }
        if let Some(expected) = expected_fingerprint {
            if &bytes[9..41] != expected {
                return Err(SnapshotError::FingerprintMismatch);
            }
        }
        9 + 32
    } else {
        if expected_fingerprint.is_some() {
            return Err(SnapshotError::FingerprintMismatch);
        }
        9
    };

    let parts: SnapshotParts = postcard::from_bytes(&bytes[payload_start..])
        .map_err(SnapshotError::DeserializationFailed)?;

    let mut ctx = Context::new(ContextOptions::default());
    for module in &parts.modules {
        let result = if module.implemented {
            ctx.parse_module(&module.source, SchemaFormat::Yang)
        } else {
            ctx.parse_module_imported_only(&module.source, SchemaFormat::Yang)
        };
        result.map_err(SnapshotError::Rebuild)?;
    }
    ctx.compile().map_err(SnapshotError::Rebuild)?;
    Ok(ctx)
}

/// Read the fingerprint from snapshot bytes without touching the payload.
///
/// # Errors
///
/// Header errors only.
pub fn get_fingerprint(bytes: &[u8]) -> Result<Option<[u8; 32]>, SnapshotError> {
    if bytes.len() < 9 {
        return Err(SnapshotError::TruncatedHeader);
    }
    if bytes[0..4] != MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != SCHEMA_VERSION {
        return Err(SnapshotError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found: version,
        });
    }
    if bytes[8] == 0 {
        return Ok(None);
    }
    if bytes.len() < 9 + 32 {
        return Err(SnapshotError::TruncatedHeader);
    }
    let mut fp = [0u8; 32];
    fp.copy_from_slice(&bytes[9..41]);
    Ok(Some(fp))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE_A: &str = r#"module a {
  namespace "urn:example:a";
  prefix a;
  leaf x { type int8 { range "0..10"; } default 3; }
}"#;

    fn sample_context() -> Context {
        let mut ctx = Context::new(ContextOptions::default());
        ctx.load_module(MODULE_A, SchemaFormat::Yang).unwrap();
        ctx
    }

    #[test]
    fn test_round_trip_without_fingerprint() {
        let ctx = sample_context();
        let bytes = serialize_context(&ctx, None).unwrap();
        let restored = deserialize_context(&bytes, None).unwrap();
        assert!(restored.get_module("a", None).is_some());
    }

    #[test]
    fn test_round_trip_with_fingerprint() {
        let ctx = sample_context();
        let parts = snapshot_parts(&ctx).unwrap();
        let fp = compute_fingerprint(&parts);
        let bytes = serialize_context(&ctx, Some(fp)).unwrap();

        assert_eq!(get_fingerprint(&bytes).unwrap(), Some(fp));
        let restored = deserialize_context(&bytes, Some(&fp)).unwrap();
        assert!(restored.get_module("a", None).is_some());
    }

    #[test]
    fn test_fingerprint_mismatch_rejected() {
        let ctx = sample_context();
        let parts = snapshot_parts(&ctx).unwrap();
        let fp = compute_fingerprint(&parts);
        let bytes = serialize_context(&ctx, Some(fp)).unwrap();

        let wrong = [0xAAu8; 32];
        assert!(matches!(
            deserialize_context(&bytes, Some(&wrong)),
            Err(SnapshotError::FingerprintMismatch)
        ));
    }

    #[test]
    fn test_invalid_magic_rejected() {
        assert!(matches!(
            deserialize_context(b"NOPE\x01\x00\x00\x00\x00", None),
            Err(SnapshotError::InvalidMagic)
        ));
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(matches!(
            deserialize_context(b"YK", None),
            Err(SnapshotError::TruncatedHeader)
        ));
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let ctx = sample_context();
        let bytes = serialize_context(&ctx, None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.ykit");
        std::fs::write(&path, &bytes).unwrap();

        let read_back = std::fs::read(&path).unwrap();
        let restored = deserialize_context(&read_back, None).unwrap();
        assert_eq!(restored.module_count(), 1);
    }
}
