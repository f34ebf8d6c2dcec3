//! Error taxonomy, error record storage, and the log surface.
//!
//! Every public operation returns a single [`Error`] code; the detailed
//! diagnostics (message, path, app-tag) accumulate in a per-context,
//! per-thread record list that callers can drain after the fact.
//!
//! Log behavior is controlled process-wide (level, option bits, optional
//! callback) with a thread-local option override so one thread can silence
//! or redirect output without disturbing others.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

/// Validation sub-code. Set whenever the top-level code is [`Error::Validation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ValidationCode {
    /// Generic syntax error.
    Syntax,
    /// YANG-form syntax error.
    SyntaxYang,
    /// YIN-form syntax error.
    SyntaxYin,
    /// XML data syntax error.
    SyntaxXml,
    /// JSON data syntax error.
    SyntaxJson,
    /// Invalid reference to another item.
    Reference,
    /// Invalid XPath expression.
    Xpath,
    /// Generic semantic error.
    Semantics,
    /// Data does not satisfy a schema restriction.
    Data,
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Syntax => "syntax",
            Self::SyntaxYang => "syntax-yang",
            Self::SyntaxYin => "syntax-yin",
            Self::SyntaxXml => "syntax-xml",
            Self::SyntaxJson => "syntax-json",
            Self::Reference => "reference",
            Self::Xpath => "xpath",
            Self::Semantics => "semantics",
            Self::Data => "data",
        };
        f.write_str(s)
    }
}

/// Top-level operation result codes.
///
/// `Incomplete`, `Recompile` and `Negation` are non-fatal: the operation did
/// not fail outright, it is telling the caller what to do next (supply more
/// input, recompile the context, or treat a search as a miss).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("memory allocation failure")]
    Memory,
    #[error("system call failure")]
    Syscall,
    #[error("invalid value")]
    Invalid,
    #[error("item already exists")]
    Exists,
    #[error("item not found")]
    NotFound,
    #[error("internal error")]
    Internal,
    #[error("validation failure ({0})")]
    Validation(ValidationCode),
    #[error("operation denied")]
    Denied,
    #[error("operation incomplete, retry with more input")]
    Incomplete,
    #[error("compiled context is stale, recompile and retry")]
    Recompile,
    #[error("negative result")]
    Negation,
    #[error("unknown error")]
    Other,
    /// Error reported by an extension plugin, wrapping the underlying code.
    #[error("plugin: {0}")]
    Plugin(Box<Error>),
}

impl Error {
    /// The validation sub-code, if this is a validation failure.
    #[must_use]
    pub fn validation_code(&self) -> Option<ValidationCode> {
        match self {
            Self::Validation(code) => Some(*code),
            Self::Plugin(inner) => inner.validation_code(),
            _ => None,
        }
    }
}

/// Log message verbosity levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Error reports only.
    Error = 0,
    /// Errors and warnings.
    Warning = 1,
    /// Verbose progress messages.
    Verbose = 2,
    /// Developer debug messages.
    Debug = 3,
}

/// Log option bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogOptions(pub u8);

impl LogOptions {
    /// Emit messages via the callback (or stderr when none is installed).
    pub const LOG: Self = Self(0x01);
    /// Retain every error record in the thread-local list.
    pub const STORE: Self = Self(0x02);
    /// Retain only the most recent error record.
    pub const STORE_LAST: Self = Self(0x04 | 0x02);

    /// Check whether all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two option sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self::LOG.union(Self::STORE_LAST)
    }
}

/// Debug message groups, only honored in debug builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugGroups(pub u8);

impl DebugGroups {
    /// Dictionary operations.
    pub const DICT: Self = Self(0x01);
    /// XPath evaluation steps.
    pub const XPATH: Self = Self(0x02);
    /// Dependency-set construction.
    pub const DEPSETS: Self = Self(0x04);

    /// Check whether all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Callback receiving emitted log messages.
pub type LogCallback = Box<dyn Fn(LogLevel, &str, Option<&str>) + Send + Sync>;

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warning as u8);
static LOG_OPTIONS: AtomicU8 = AtomicU8::new(0x01 | 0x02 | 0x04);
static DEBUG_GROUPS: AtomicU8 = AtomicU8::new(0);

static LOG_CALLBACK: Mutex<Option<LogCallback>> = Mutex::new(None);

thread_local! {
    /// Per-thread option override; `None` means "use the process-wide options".
    static LOCAL_OPTIONS: RefCell<Option<LogOptions>> = const { RefCell::new(None) };
    /// Per-context error record lists, keyed by context id.
    static ERROR_LISTS: RefCell<HashMap<u64, Vec<ErrorRecord>>> = RefCell::new(HashMap::new());
}

/// Set the process-wide verbosity level, returning the previous one.
pub fn set_log_level(level: LogLevel) -> LogLevel {
    let prev = LOG_LEVEL.swap(level as u8, Ordering::Relaxed);
    level_from_u8(prev)
}

/// Current process-wide verbosity level.
#[must_use]
pub fn log_level() -> LogLevel {
    level_from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set the process-wide log options, returning the previous ones.
pub fn set_log_options(options: LogOptions) -> LogOptions {
    LogOptions(LOG_OPTIONS.swap(options.0, Ordering::Relaxed))
}

/// Override log options for the calling thread only. `None` removes the
/// override.
pub fn set_thread_log_options(options: Option<LogOptions>) {
    LOCAL_OPTIONS.with(|slot| *slot.borrow_mut() = options);
}

/// Effective options for the calling thread.
#[must_use]
pub fn effective_log_options() -> LogOptions {
    LOCAL_OPTIONS.with(|slot| {
        slot.borrow()
            .unwrap_or(LogOptions(LOG_OPTIONS.load(Ordering::Relaxed)))
    })
}

/// Install a log callback, replacing any previous one.
pub fn set_log_callback(cb: Option<LogCallback>) {
    *LOG_CALLBACK.lock().expect("log callback lock") = cb;
}

/// Set the enabled debug groups. Ignored outside debug builds.
pub fn set_debug_groups(groups: DebugGroups) {
    DEBUG_GROUPS.store(groups.0, Ordering::Relaxed);
}

/// Check whether a debug group is enabled. Always false in release builds.
#[must_use]
pub fn debug_group_enabled(group: DebugGroups) -> bool {
    if cfg!(debug_assertions) {
        DebugGroups(DEBUG_GROUPS.load(Ordering::Relaxed)).contains(group)
    } else {
        false
    }
}

fn level_from_u8(v: u8) -> LogLevel {
    match v {
        0 => LogLevel::Error,
        1 => LogLevel::Warning,
        2 => LogLevel::Verbose,
        _ => LogLevel::Debug,
    }
}

/// One stored diagnostic.
#[derive(Clone, Debug)]
pub struct ErrorRecord {
    /// Severity of the event.
    pub level: LogLevel,
    /// Top-level code.
    pub code: Error,
    /// Validation sub-code, when `code` is `Validation`.
    pub vcode: Option<ValidationCode>,
    /// Human-readable message. Identifiers are quoted with `"`.
    pub message: String,
    /// Data path, schema path, or `line N` position, when known.
    pub path: Option<String>,
    /// Module-defined error-app-tag, when declared.
    pub app_tag: Option<String>,
}

/// Record an error against a context id and emit it per the active options.
pub(crate) fn record(ctx_id: u64, record: ErrorRecord) {
    let options = effective_log_options();

    if options.contains(LogOptions::LOG) && record.level <= log_level() {
        emit(&record);
    }

    if options.contains(LogOptions::STORE) {
        ERROR_LISTS.with(|lists| {
            let mut lists = lists.borrow_mut();
            let list = lists.entry(ctx_id).or_default();
            if options.contains(LogOptions::STORE_LAST) {
                list.clear();
            }
            list.push(record);
        });
    }
}

/// Emit a debug-group message (debug builds only).
pub(crate) fn debug(group: DebugGroups, message: &str) {
    if debug_group_enabled(group) {
        emit(&ErrorRecord {
            level: LogLevel::Debug,
            code: Error::Other,
            vcode: None,
            message: message.to_owned(),
            path: None,
            app_tag: None,
        });
    }
}

fn emit(record: &ErrorRecord) {
    let cb = LOG_CALLBACK.lock().expect("log callback lock");
    match &*cb {
        Some(cb) => cb(record.level, &record.message, record.path.as_deref()),
        None => match &record.path {
            Some(path) => eprintln!("yangkit[{:?}]: {} ({})", record.level, record.message, path),
            None => eprintln!("yangkit[{:?}]: {}", record.level, record.message),
        },
    }
}

/// Snapshot of the calling thread's error records for a context.
pub(crate) fn records_for(ctx_id: u64) -> Vec<ErrorRecord> {
    ERROR_LISTS.with(|lists| lists.borrow().get(&ctx_id).cloned().unwrap_or_default())
}

/// Most recent record for a context on the calling thread.
pub(crate) fn last_record_for(ctx_id: u64) -> Option<ErrorRecord> {
    ERROR_LISTS.with(|lists| lists.borrow().get(&ctx_id).and_then(|l| l.last().cloned()))
}

/// Drop all records for a context on the calling thread.
pub(crate) fn clear_records_for(ctx_id: u64) {
    ERROR_LISTS.with(|lists| {
        lists.borrow_mut().remove(&ctx_id);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_code_display() {
        assert_eq!(ValidationCode::SyntaxYang.to_string(), "syntax-yang");
        assert_eq!(ValidationCode::Data.to_string(), "data");
    }

    #[test]
    fn test_error_validation_code() {
        assert_eq!(
            Error::Validation(ValidationCode::Data).validation_code(),
            Some(ValidationCode::Data)
        );
        assert_eq!(Error::NotFound.validation_code(), None);
        let wrapped = Error::Plugin(Box::new(Error::Validation(ValidationCode::Xpath)));
        assert_eq!(wrapped.validation_code(), Some(ValidationCode::Xpath));
    }

    #[test]
    fn test_store_last_keeps_one() {
        set_thread_log_options(Some(LogOptions::STORE_LAST));
        let ctx_id = u64::MAX; // synthetic id, never used by a real context
        clear_records_for(ctx_id);

        for i in 0..3 {
            record(
                ctx_id,
                ErrorRecord {
                    level: LogLevel::Error,
                    code: Error::Invalid,
                    vcode: None,
                    message: format!("event {i}"),
                    path: None,
                    app_tag: None,
                },
            );
        }

        let records = records_for(ctx_id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "event 2");

        clear_records_for(ctx_id);
        set_thread_log_options(None);
    }

    #[test]
    fn test_store_keeps_all() {
        set_thread_log_options(Some(LogOptions::STORE));
        let ctx_id = u64::MAX - 1;
        clear_records_for(ctx_id);

        for i in 0..3 {
            record(
                ctx_id,
                ErrorRecord {
                    level: LogLevel::Error,
                    code: Error::Invalid,
                    vcode: None,
                    message: format!("event {i}"),
                    path: None,
                    app_tag: None,
                },
            );
        }

        assert_eq!(records_for(ctx_id).len(), 3);
        clear_records_for(ctx_id);
        assert!(records_for(ctx_id).is_empty());
        set_thread_log_options(None);
    }

    #[test]
    fn test_thread_override_is_local() {
        set_thread_log_options(Some(LogOptions::STORE));
        let handle = std::thread::spawn(|| effective_log_options());
        let other = handle.join().unwrap();
        // The spawned thread sees the process-wide options, not our override.
        assert_eq!(other.0, LOG_OPTIONS.load(Ordering::Relaxed));
        set_thread_log_options(None);
    }

    #[test]
    fn test_log_options_contains() {
        let opts = LogOptions::STORE_LAST;
        assert!(opts.contains(LogOptions::STORE));
        assert!(!opts.contains(LogOptions::LOG));
    }
}
