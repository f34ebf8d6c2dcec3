//! The context: root owner of the dictionary, modules, and compiled arenas.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use super::identity::Identity;
use super::ids::{ExprId, IdentityId, ModuleId, NodeId, StrId, TypeId};
use super::interner::Dictionary;
use super::module::Module;
use super::node::{SchemaNode, SchemaNodeKind};
use crate::ast::ParsedModule;
use crate::lexer::Severity;
use crate::log::{self, Error, ErrorRecord, LogLevel, ValidationCode};
use crate::mount::{ExtDataProvider, MountPoint};
use crate::parser;
use crate::types::{CompiledType, TypeKind};
use crate::xpath::{self, Expr};

static NEXT_CTX_ID: AtomicU64 = AtomicU64::new(1);

/// Context behavior flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContextOptions(pub u32);

impl ContextOptions {
    /// Treat every loaded module as implemented, not just explicitly loaded
    /// ones.
    pub const ALL_IMPLEMENTED: Self = Self(0x0001);

    /// Check whether all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Schema input forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaFormat {
    /// Canonical YANG text.
    Yang,
    /// YIN (XML mapping).
    Yin,
}

/// Root owner of one dictionary, the module set, and the compiled schema
/// graph.
///
/// Reads (module lookup, schema walks, validating independently owned data
/// trees) may happen concurrently from any number of threads; mutations
/// (loading, recompiling) require exclusive access, which Rust's `&mut`
/// enforces. Error state is thread-local: each thread sees its own record
/// list.
pub struct Context {
    pub(crate) ctx_id: u64,
    pub(crate) dict: Dictionary,
    pub(crate) modules: Vec<Module>,
    pub(crate) nodes: Vec<SchemaNode>,
    pub(crate) types: Vec<CompiledType>,
    /// Unrestricted built-in types, shared across all uses.
    pub(crate) builtin_types: HashMap<TypeKind, TypeId>,
    pub(crate) identities: Vec<Identity>,
    pub(crate) exprs: Vec<Expr>,
    /// Expression text -> compiled id. Identical `when`/`must` text shares
    /// one compiled expression, which is what makes shared-`when`
    /// memoization during validation effective.
    pub(crate) expr_index: HashMap<String, ExprId>,
    /// (name, revision) -> module, in implementation order.
    pub(crate) module_index: IndexMap<(StrId, Option<StrId>), ModuleId>,
    /// namespace -> module.
    pub(crate) ns_index: HashMap<StrId, ModuleId>,
    pub(crate) options: ContextOptions,
    /// Search-path list kept for callers; path resolution itself is the
    /// caller's concern.
    pub(crate) searchdirs: Vec<String>,
    /// Parsed modules waiting for compilation.
    pub(crate) pending: Vec<(ParsedModule, Option<String>, bool)>,
    /// Parsed submodules waiting to be spliced into their owning module.
    pub(crate) pending_submodules: Vec<ParsedModule>,
    /// Mount-point instances registered during compilation.
    pub(crate) mounts: Vec<MountPoint>,
    /// Callback providing ext data (yang-library info) for mount points.
    pub(crate) ext_provider: Option<Arc<dyn ExtDataProvider + Send + Sync>>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new(options: ContextOptions) -> Self {
        Self {
            ctx_id: NEXT_CTX_ID.fetch_add(1, Ordering::Relaxed),
            dict: Dictionary::new(),
            modules: Vec::new(),
            nodes: Vec::new(),
            types: Vec::new(),
            builtin_types: HashMap::new(),
            identities: Vec::new(),
            exprs: Vec::new(),
            expr_index: HashMap::new(),
            module_index: IndexMap::new(),
            ns_index: HashMap::new(),
            options,
            searchdirs: Vec::new(),
            pending: Vec::new(),
            pending_submodules: Vec::new(),
            mounts: Vec::new(),
            ext_provider: None,
        }
    }

    /// Context behavior flags.
    #[must_use]
    pub fn options(&self) -> ContextOptions {
        self.options
    }

    /// Append a search directory. The list is exposed to callers; the
    /// library itself performs no file I/O.
    pub fn add_searchdir(&mut self, dir: impl Into<String>) {
        self.searchdirs.push(dir.into());
    }

    /// The registered search directories.
    #[must_use]
    pub fn searchdirs(&self) -> &[String] {
        &self.searchdirs
    }

    /// Install the ext-data callback used by mount points.
    pub fn set_ext_data_provider(&mut self, provider: Arc<dyn ExtDataProvider + Send + Sync>) {
        self.ext_provider = Some(provider);
    }

    // === Dictionary ===

    /// Intern a string.
    pub(crate) fn intern(&mut self, s: &str) -> StrId {
        if log::debug_group_enabled(log::DebugGroups::DICT) {
            log::debug(log::DebugGroups::DICT, &format!("dict insert \"{s}\""));
        }
        self.dict.insert(s)
    }

    /// Resolve an interned string.
    #[must_use]
    pub fn str(&self, id: StrId) -> &str {
        self.dict.get(id)
    }

    /// The context dictionary.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    // === Module loading ===

    /// Parse a module and queue it for compilation.
    ///
    /// # Errors
    ///
    /// `Validation(SyntaxYang | SyntaxYin)` when the input does not parse.
    pub fn parse_module(&mut self, source: &str, format: SchemaFormat) -> Result<(), Error> {
        let parsed = match format {
            SchemaFormat::Yang => parser::parse_module_text(source.as_bytes()),
            SchemaFormat::Yin => parser::yin::parse_module_yin(source.as_bytes()),
        };
        let code = match format {
            SchemaFormat::Yang => ValidationCode::SyntaxYang,
            SchemaFormat::Yin => ValidationCode::SyntaxYin,
        };
        self.take_parse_errors(&parsed, code)?;
        self.pending.push((parsed, Some(source.to_owned()), true));
        Ok(())
    }

    /// Parse a module whose types, groupings, and identities may be used by
    /// other modules but whose data tree does not contribute to the context.
    ///
    /// # Errors
    ///
    /// Same as [`Context::parse_module`].
    pub fn parse_module_imported_only(
        &mut self,
        source: &str,
        format: SchemaFormat,
    ) -> Result<(), Error> {
        let parsed = match format {
            SchemaFormat::Yang => parser::parse_module_text(source.as_bytes()),
            SchemaFormat::Yin => parser::yin::parse_module_yin(source.as_bytes()),
        };
        let code = match format {
            SchemaFormat::Yang => ValidationCode::SyntaxYang,
            SchemaFormat::Yin => ValidationCode::SyntaxYin,
        };
        self.take_parse_errors(&parsed, code)?;
        self.pending.push((parsed, Some(source.to_owned()), false));
        Ok(())
    }

    /// Parse a submodule and queue it for splicing into its owning module.
    ///
    /// # Errors
    ///
    /// Same as [`Context::parse_module`].
    pub fn parse_submodule(&mut self, source: &str, format: SchemaFormat) -> Result<(), Error> {
        let parsed = match format {
            SchemaFormat::Yang => parser::parse_submodule_text(source.as_bytes()),
            SchemaFormat::Yin => parser::yin::parse_submodule_yin(source.as_bytes()),
        };
        let code = match format {
            SchemaFormat::Yang => ValidationCode::SyntaxYang,
            SchemaFormat::Yin => ValidationCode::SyntaxYin,
        };
        self.take_parse_errors(&parsed, code)?;
        self.pending_submodules.push(parsed);
        Ok(())
    }

    /// Parse and compile a module in one step.
    ///
    /// # Errors
    ///
    /// Parse errors as in [`Context::parse_module`]; compilation errors as in
    /// [`Context::compile`].
    pub fn load_module(&mut self, source: &str, format: SchemaFormat) -> Result<ModuleId, Error> {
        let name = {
            let parsed = match format {
                SchemaFormat::Yang => parser::parse_module_text(source.as_bytes()),
                SchemaFormat::Yin => parser::yin::parse_module_yin(source.as_bytes()),
            };
            parsed.name.clone()
        };
        self.parse_module(source, format)?;
        self.compile()?;
        let name_id = self
            .dict
            .find(&name)
            .ok_or(Error::Internal)?;
        self.module_index
            .iter()
            .rev()
            .find(|((n, _), _)| *n == name_id)
            .map(|(_, &id)| id)
            .ok_or(Error::Internal)
    }

    /// Compile all pending modules in dependency order.
    ///
    /// # Errors
    ///
    /// `Validation(..)` on schema errors; previously compiled modules remain
    /// valid.
    pub fn compile(&mut self) -> Result<(), Error> {
        crate::compiler::compile_pending(self)
    }

    fn take_parse_errors(
        &mut self,
        parsed: &ParsedModule,
        code: ValidationCode,
    ) -> Result<(), Error> {
        let mut failed = false;
        for diag in &parsed.diagnostics {
            if diag.severity == Severity::Error {
                failed = true;
                self.record_error(
                    Error::Validation(code),
                    diag.message.clone(),
                    None,
                    None,
                );
            }
        }
        if failed {
            Err(Error::Validation(code))
        } else {
            Ok(())
        }
    }

    // === Module lookup ===

    /// Look up a module by name, and revision when given; without a revision
    /// the latest loaded revision wins.
    #[must_use]
    pub fn get_module(&self, name: &str, revision: Option<&str>) -> Option<&Module> {
        let name_id = self.dict.find(name)?;
        match revision {
            Some(rev) => {
                let rev_id = self.dict.find(rev)?;
                let id = self.module_index.get(&(name_id, Some(rev_id)))?;
                Some(&self.modules[id.to_index()])
            }
            None => self
                .module_index
                .iter()
                .rev()
                .find(|((n, _), _)| *n == name_id)
                .map(|(_, &id)| &self.modules[id.to_index()]),
        }
    }

    /// Look up a module by namespace URI.
    #[must_use]
    pub fn get_module_by_namespace(&self, namespace: &str) -> Option<&Module> {
        let ns_id = self.dict.find(namespace)?;
        let id = self.ns_index.get(&ns_id)?;
        Some(&self.modules[id.to_index()])
    }

    /// Iterate modules in implementation (insertion) order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Number of modules in the context.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // === Arena access ===

    /// Get a compiled schema node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.to_index()]
    }

    /// Get a compiled type.
    #[must_use]
    pub fn ty(&self, id: TypeId) -> &CompiledType {
        &self.types[id.to_index()]
    }

    /// Get an identity.
    #[must_use]
    pub fn identity(&self, id: IdentityId) -> &Identity {
        &self.identities[id.to_index()]
    }

    /// All identities.
    #[must_use]
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Get a compiled expression.
    #[must_use]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.to_index()]
    }

    /// Compile an expression into the context arena, deduplicating by source
    /// text.
    pub(crate) fn add_expr(&mut self, source: &str) -> Result<ExprId, xpath::XpathError> {
        if let Some(&id) = self.expr_index.get(source) {
            return Ok(id);
        }
        let expr = xpath::compile(source)?;
        let id = ExprId::from_index(self.exprs.len()).expect("expression arena overflow");
        self.exprs.push(expr);
        self.expr_index.insert(source.to_owned(), id);
        Ok(id)
    }

    /// Resolve an identity by `(module, name)`.
    #[must_use]
    pub fn find_identity(&self, module: ModuleId, name: &str) -> Option<IdentityId> {
        let name_id = self.dict.find(name)?;
        self.modules[module.to_index()]
            .identities
            .iter()
            .copied()
            .find(|&id| self.identities[id.to_index()].name == name_id)
    }

    /// Data-visible children of a node (or of a module's top level),
    /// descending transparently through choice and case.
    #[must_use]
    pub fn data_children(&self, parent: Option<NodeId>, module: Option<ModuleId>) -> Vec<NodeId> {
        let mut out = Vec::new();
        match parent {
            Some(parent) => self.collect_data_children(self.node(parent).children(), &mut out),
            None => {
                for m in &self.modules {
                    if !m.implemented {
                        continue;
                    }
                    if module.is_some_and(|want| want != m.id) {
                        continue;
                    }
                    self.collect_data_children(&m.children, &mut out);
                }
            }
        }
        out
    }

    fn collect_data_children(&self, children: &[NodeId], out: &mut Vec<NodeId>) {
        for &child in children {
            let node = self.node(child);
            match node.kind {
                SchemaNodeKind::Choice { ref cases, .. } => {
                    self.collect_data_children(cases, out);
                }
                SchemaNodeKind::Case { ref children } => {
                    self.collect_data_children(children, out);
                }
                SchemaNodeKind::Rpc { .. } | SchemaNodeKind::Notification { .. } => {}
                _ => out.push(child),
            }
        }
    }

    /// Schema path of a node, e.g. `/mod:root/child`.
    #[must_use]
    pub fn schema_path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            let prefix_module = match node.parent {
                Some(parent) if self.node(parent).module == node.module => None,
                _ => Some(node.module),
            };
            let name = self.str(node.name);
            match prefix_module {
                Some(module) => {
                    let module_name = self.str(self.modules[module.to_index()].name);
                    segments.push(format!("{module_name}:{name}"));
                }
                None => segments.push(name.to_owned()),
            }
            current = node.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    // === Error surface ===

    /// Record an error against this context for the calling thread.
    pub(crate) fn record_error(
        &self,
        code: Error,
        message: impl Into<String>,
        path: Option<String>,
        app_tag: Option<String>,
    ) {
        let vcode = code.validation_code();
        log::record(
            self.ctx_id,
            ErrorRecord {
                level: LogLevel::Error,
                code,
                vcode,
                message: message.into(),
                path,
                app_tag,
            },
        );
    }

    /// The calling thread's full error record list for this context.
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorRecord> {
        log::records_for(self.ctx_id)
    }

    /// Most recent error record on the calling thread.
    #[must_use]
    pub fn last_error(&self) -> Option<ErrorRecord> {
        log::last_record_for(self.ctx_id)
    }

    /// Most recent error message.
    #[must_use]
    pub fn last_error_message(&self) -> Option<String> {
        self.last_error().map(|r| r.message)
    }

    /// Most recent error path.
    #[must_use]
    pub fn last_error_path(&self) -> Option<String> {
        self.last_error().and_then(|r| r.path)
    }

    /// Most recent top-level error code.
    #[must_use]
    pub fn last_error_code(&self) -> Option<Error> {
        self.last_error().map(|r| r.code)
    }

    /// Most recent validation sub-code.
    #[must_use]
    pub fn last_validation_code(&self) -> Option<ValidationCode> {
        self.last_error().and_then(|r| r.vcode)
    }

    /// Most recent error-app-tag.
    #[must_use]
    pub fn last_error_app_tag(&self) -> Option<String> {
        self.last_error().and_then(|r| r.app_tag)
    }

    /// Clear the calling thread's error records for this context.
    pub fn clear_errors(&self) {
        log::clear_records_for(self.ctx_id);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.ctx_id)
            .field("modules", &self.modules.len())
            .field("nodes", &self.nodes.len())
            .field("types", &self.types.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // The calling thread's records die with the context; other threads'
        // slots are cleaned up on their own clear or thread exit.
        log::clear_records_for(self.ctx_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context() {
        let ctx = Context::new(ContextOptions::default());
        assert_eq!(ctx.module_count(), 0);
        assert!(ctx.get_module("nope", None).is_none());
        assert!(ctx.last_error().is_none());
    }

    #[test]
    fn test_context_ids_unique() {
        let a = Context::new(ContextOptions::default());
        let b = Context::new(ContextOptions::default());
        assert_ne!(a.ctx_id, b.ctx_id);
    }

    #[test]
    fn test_searchdirs() {
        let mut ctx = Context::new(ContextOptions::default());
        ctx.add_searchdir("/tmp/modules");
        assert_eq!(ctx.searchdirs(), &["/tmp/modules".to_owned()]);
    }

    #[test]
    fn test_parse_error_recorded() {
        let mut ctx = Context::new(ContextOptions::default());
        let err = ctx
            .parse_module("module broken {", SchemaFormat::Yang)
            .unwrap_err();
        assert_eq!(err, Error::Validation(ValidationCode::SyntaxYang));
        assert!(ctx.last_error_message().is_some());
        ctx.clear_errors();
        assert!(ctx.last_error().is_none());
    }
}
