//! yangkit-std: filesystem-facing conveniences for yangkit.
//!
//! - `snapshot`: best-effort binary snapshots of a context (module sources
//!   plus a SHA-256 fingerprint header); loading re-parses and recompiles,
//!   which reconstructs a semantically identical schema graph.
//! - `lyb`: the compact binary data encoding, a postcard-framed tree of
//!   module/name/value triples resolved against a context on load.

pub mod lyb;
pub mod snapshot;
