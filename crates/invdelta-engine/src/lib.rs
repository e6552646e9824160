//! InvDelta Engine - Orchestration layer
//!
//! Drives the core reconciler against the SQLite store and the staging area:
//! one family at a time, or a whole run in parallel with bounded retries.

pub mod commands;

pub use commands::driver::{run_indexing, RunReport};
pub use commands::index::{index_family, IndexOptions};
