//! yangkit-core: YANG schema compilation and data validation.
//!
//! The crate implements the three-layer pipeline of a YANG toolkit:
//!
//! ```text
//! Source → Parser → Parsed tree → Compiler → Compiled schema graph
//!                                                  │
//!                         Instance input → Validator → Validated tree
//! ```
//!
//! - **Parser** (`parser`): canonical YANG text and the YIN (XML) form
//! - **Compiler** (`compiler`): dependency-ordered module compilation with
//!   grouping expansion, augments, deviations, and deferred leafref linking
//! - **Schema** (`schema`): the compiled graph — context, modules, nodes,
//!   types, identities — in arena storage
//! - **XPath** (`xpath`): expression compilation and evaluation for
//!   `when`/`must`/leafref paths
//! - **Data** (`data`): instance trees, XML/JSON codecs, and the validator
//! - **Mount** (`mount`): the schema-mount extension embedding a separately
//!   compiled context at a data-tree location

pub mod ast;
pub mod data;
pub mod lexer;
pub mod log;
pub mod mount;
pub mod parser;
pub mod schema;
pub mod types;
pub mod xpath;

pub(crate) mod compiler;

pub use log::{Error, LogLevel, LogOptions, ValidationCode};
pub use schema::{Context, ContextOptions, SchemaFormat};

/// Result type used across the public API.
pub type Result<T> = std::result::Result<T, Error>;
