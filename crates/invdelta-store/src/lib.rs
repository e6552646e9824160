//! InvDelta Store - SQLite persistence and snapshot staging
//!
//! Provides:
//! - SQLite schema with checksummed migrations
//! - Current-state, append-only change-log and summary tables
//! - [`repo::SqliteStore`], the store contract over one connection
//! - Staging area for JSONL snapshots with atomic writes

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;
pub mod staging;

// Re-export key types
pub use errors::Result;
pub use repo::SqliteStore;
pub use staging::StagingArea;
