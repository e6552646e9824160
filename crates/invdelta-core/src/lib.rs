//! InvDelta Core - delta change detection for inventory snapshots
//!
//! This crate provides the storage-agnostic kernel of InvDelta:
//! - Entity-type registry (which fields identify, compare and persist)
//! - Snapshot loader with same-id de-duplication
//! - Deterministic reconciler producing classifications, change records,
//!   write-set and tombstones
//! - Store contract traits and the per-family pipeline that drives them
//! - Error facility and structured logging

pub mod diff;
pub mod errors;
pub mod loader;
pub mod logging_facility;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod state;
pub mod writers;

pub use invdelta_core_types::{schema, RunId};

// Re-export commonly used types
pub use diff::{reconcile, Classification, ReconcileOutcome};
pub use errors::{ExError, ExErrorKind, InvDeltaError, Result};
pub use loader::{load_snapshot, LoadedSnapshot};
pub use model::{
    ChangeRecord, ChangeType, Document, EntityRecord, ExistingState, IndexingResult, RunContext,
    SnapshotId, SnapshotSummary,
};
pub use pipeline::{run_family, FamilyRun};
pub use registry::{EntityTypeConfig, EntityTypeRegistry};
pub use state::{IndexStore, MemoryStore};
