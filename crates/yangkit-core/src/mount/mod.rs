//! Schema mount: an extension embedding a separately compiled schema context
//! at a container or list node.
//!
//! Compilation only validates placement and registers a placeholder with a
//! shared-state block (ref-counted across mount points carrying the same
//! label). The inner context is created at data time from the yang-library
//! information supplied by the caller's [`ExtDataProvider`]: shared schemas
//! are cached by mount-point label and verified by content-id, inline
//! schemas are rebuilt per instance.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::ast::YangVersion;
use crate::compiler::ModCompile;
use crate::log::{Error, ValidationCode};
use crate::schema::{Context, ContextOptions, ExtInstance, NodeId, SchemaNodeKind, StrId};

/// Module name defining the mount-point extension.
const MOUNT_MODULE: &str = "ietf-yang-schema-mount";
/// Extension keyword.
const MOUNT_KEYWORD: &str = "mount-point";

/// Operational yang-library state describing the schemas mounted at a
/// mount point.
#[derive(Clone, Debug)]
pub struct MountSchemaInfo {
    /// yang-library content-id; shared caches are validated against it.
    pub content_id: String,
    /// Shared across mount points with the same label, or inline (fresh
    /// context per instance).
    pub shared: bool,
    /// `(module name, canonical YANG source)` pairs to populate the inner
    /// context with.
    pub modules: Vec<(String, String)>,
    /// XPath expressions selecting parent-tree subtrees that must stay
    /// visible to expressions evaluated inside the mounted schema.
    pub parent_refs: Vec<String>,
}

/// Callback supplying mount-point ext data.
pub trait ExtDataProvider {
    /// Return the yang-library information for the given mount-point label.
    ///
    /// # Errors
    ///
    /// Any error aborts validation of the mounted subtree; it is wrapped in
    /// [`Error::Plugin`].
    fn ext_data(&self, mount_point: &str) -> Result<MountSchemaInfo, Error>;
}

/// One cached shared schema.
struct SharedSchema {
    mount_point: String,
    content_id: String,
    ctx: Arc<Context>,
}

/// Shared-state block, ref-counted (via `Arc`) across mount points with the
/// same label.
#[derive(Default)]
pub struct SharedMountState {
    /// Guarded leaf-only; the ext-data callback is never invoked under this
    /// lock.
    schemas: Mutex<Vec<SharedSchema>>,
}

impl fmt::Debug for SharedMountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.schemas.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("SharedMountState")
            .field("schemas", &count)
            .finish()
    }
}

/// A compiled mount-point instance.
#[derive(Clone, Debug)]
pub struct MountPoint {
    /// The container or list node carrying the extension.
    pub node: NodeId,
    /// Mount-point label (the extension argument).
    pub label: StrId,
    /// Shared-state block.
    pub shared: Arc<SharedMountState>,
}

fn is_mount_point(ctx: &Context, ext: &ExtInstance) -> bool {
    let Some(def_module) = ext.def_module else {
        return false;
    };
    let module = &ctx.modules[def_module.to_index()];
    ctx.str(module.name) == MOUNT_MODULE && ctx.str(ext.name) == MOUNT_KEYWORD
}

/// Compile hook: validate mount-point placement on a freshly compiled node
/// and register the placeholder. No inner context is created here.
pub(crate) fn check_mount_points(
    ctx: &mut Context,
    mc: &ModCompile,
    node: NodeId,
) -> Result<(), Error> {
    let instances: Vec<ExtInstance> = ctx
        .node(node)
        .exts
        .iter()
        .filter(|ext| is_mount_point(ctx, ext))
        .cloned()
        .collect();
    if instances.is_empty() {
        return Ok(());
    }

    let invalid = |ctx: &Context, message: String| {
        ctx.record_error(
            Error::Validation(ValidationCode::Semantics),
            message,
            Some(ctx.schema_path(node)),
            None,
        );
        Error::Validation(ValidationCode::Semantics)
    };

    if instances.len() > 1 {
        return Err(invalid(
            ctx,
            format!("Multiple extension \"{MOUNT_KEYWORD}\" instances."),
        ));
    }
    if mc.yang_version != YangVersion::V1_1 {
        return Err(invalid(
            ctx,
            format!("Extension \"{MOUNT_KEYWORD}\" requires a YANG 1.1 module."),
        ));
    }
    if !matches!(
        ctx.node(node).kind,
        SchemaNodeKind::Container { .. } | SchemaNodeKind::List { .. }
    ) {
        return Err(invalid(
            ctx,
            format!("Extension \"{MOUNT_KEYWORD}\" allowed only in a container or list."),
        ));
    }
    let Some(label) = instances[0].argument else {
        return Err(invalid(
            ctx,
            format!("Extension \"{MOUNT_KEYWORD}\" is missing its argument."),
        ));
    };

    // Mount points sharing a label share one state block.
    let shared = ctx
        .mounts
        .iter()
        .find(|mp| mp.label == label)
        .map_or_else(|| Arc::new(SharedMountState::default()), |mp| mp.shared.clone());

    ctx.mounts.push(MountPoint {
        node,
        label,
        shared,
    });
    Ok(())
}

/// Whether a compiled node carries a mount point.
#[must_use]
pub fn has_mount_point(ctx: &Context, node: NodeId) -> bool {
    ctx.mounts.iter().any(|mp| mp.node == node)
}

/// Obtain the inner context for the mount point at `node`, creating or
/// reusing it per the ext data's shared/inline choice.
pub(crate) fn mount_context(
    ctx: &Context,
    node: NodeId,
) -> Result<(Arc<Context>, MountSchemaInfo), Error> {
    let Some(mp) = ctx.mounts.iter().find(|mp| mp.node == node) else {
        return Err(Error::Internal);
    };
    let Some(provider) = ctx.ext_provider.as_ref() else {
        ctx.record_error(
            Error::Invalid,
            "no ext data callback set for mount-point data",
            Some(ctx.schema_path(node)),
            None,
        );
        return Err(Error::Invalid);
    };

    // The callback runs without any lock held.
    let label = ctx.str(mp.label).to_owned();
    let info = provider
        .ext_data(&label)
        .map_err(|err| Error::Plugin(Box::new(err)))?;

    if info.shared {
        let mut schemas = mp.shared.schemas.lock().expect("mount schema lock");
        if let Some(entry) = schemas.iter().find(|entry| entry.mount_point == label) {
            if entry.content_id != info.content_id {
                ctx.record_error(
                    Error::Validation(ValidationCode::Data),
                    format!(
                        "Shared-schema yang-library content-id \"{}\" differs from \"{}\" used previously.",
                        info.content_id, entry.content_id
                    ),
                    Some("/ietf-yang-library:yang-library/content-id".to_owned()),
                    None,
                );
                return Err(Error::Validation(ValidationCode::Data));
            }
            return Ok((Arc::clone(&entry.ctx), info));
        }
        let inner = Arc::new(build_inner_context(ctx, &info)?);
        schemas.push(SharedSchema {
            mount_point: label,
            content_id: info.content_id.clone(),
            ctx: Arc::clone(&inner),
        });
        Ok((inner, info))
    } else {
        let inner = Arc::new(build_inner_context(ctx, &info)?);
        Ok((inner, info))
    }
}

fn build_inner_context(outer: &Context, info: &MountSchemaInfo) -> Result<Context, Error> {
    let mut inner = Context::new(ContextOptions::ALL_IMPLEMENTED);
    // Nested mount points resolve through the same callback.
    inner.ext_provider = outer.ext_provider.clone();
    for (_, source) in &info.modules {
        inner.parse_module(source, crate::schema::SchemaFormat::Yang)?;
    }
    inner.compile()?;
    Ok(inner)
}
