//! Store contract consumed by the pipeline.
//!
//! The reconciler never talks to a database. The pipeline reads and writes
//! through these four seams; `invdelta-store` implements them on SQLite and
//! [`memory::MemoryStore`] implements them in memory.

#![allow(clippy::result_large_err)]

pub mod memory;

use crate::errors::ExError;
use crate::model::{
    ChangeCounts, ChangeRecord, Document, ExistingState, SnapshotId, SnapshotSummary,
};
use crate::registry::EntityTypeConfig;

pub use memory::MemoryStore;

/// Reads persisted current state for one family.
pub trait ExistingStateSource {
    /// Load active and tombstoned documents of `entity_type`.
    ///
    /// # Errors
    ///
    /// `TransientIo` when the store cannot be read. The family run is
    /// aborted and may be retried.
    fn load_existing(&self, entity_type: &str) -> Result<ExistingState, ExError>;
}

/// Idempotent writes to the current-state store.
pub trait CurrentStateSink {
    /// Insert or replace the document keyed by (entity type, id). Clears any
    /// tombstone on that id.
    ///
    /// # Errors
    ///
    /// Any store failure; the caller records it as a failed write.
    fn upsert_document(
        &self,
        config: &EntityTypeConfig,
        document: &Document,
        snapshot_id: &SnapshotId,
    ) -> Result<(), ExError>;

    /// Flag an existing document as deleted in `snapshot_id`.
    ///
    /// # Errors
    ///
    /// Any store failure; the caller records it as a failed write.
    fn mark_tombstoned(
        &self,
        entity_type: &str,
        entity_id: &str,
        snapshot_id: &SnapshotId,
    ) -> Result<(), ExError>;
}

/// Append-only audit sink.
pub trait ChangeLogSink {
    /// Append one record. Returns `false` if a record with the same id was
    /// already present, which makes retries harmless.
    ///
    /// # Errors
    ///
    /// `TransientIo` or `Persistence` on store failure.
    fn append(&self, record: &ChangeRecord) -> Result<bool, ExError>;

    /// Counts of the records already logged for (`entity_type`, `snapshot_id`),
    /// including those appended by earlier attempts of the same run.
    ///
    /// # Errors
    ///
    /// `TransientIo` or `Persistence` on store failure.
    fn change_counts(&self, entity_type: &str, snapshot_id: &str)
        -> Result<ChangeCounts, ExError>;
}

/// Keyed by (entity type, snapshot id); a rerun replaces the summary.
pub trait SummarySink {
    /// # Errors
    ///
    /// Any store failure.
    fn put_summary(&self, summary: &SnapshotSummary) -> Result<(), ExError>;
}

/// Everything the per-family pipeline needs from a backend.
pub trait IndexStore: ExistingStateSource + CurrentStateSink + ChangeLogSink + SummarySink {}

impl<T> IndexStore for T where T: ExistingStateSource + CurrentStateSink + ChangeLogSink + SummarySink {}
