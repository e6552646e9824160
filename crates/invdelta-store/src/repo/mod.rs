//! SQLite repository layer
//!
//! Free functions per table, plus [`SqliteStore`] which adapts them to the
//! store contract of `invdelta-core`.

#![allow(clippy::result_large_err)]

pub mod change_log;
pub mod current_state;
pub mod summaries;

pub use current_state::StoredDocument;

use crate::errors::transient;
use invdelta_core::errors::ExError;
use invdelta_core::model::{
    ChangeCounts, ChangeRecord, Document, ExistingState, SnapshotId, SnapshotSummary,
};
use invdelta_core::state::{ChangeLogSink, CurrentStateSink, ExistingStateSource, SummarySink};
use invdelta_core::EntityTypeConfig;
use rusqlite::Connection;

/// Store contract over one SQLite connection.
///
/// Borrowing the connection keeps one store per thread; each family run
/// opens its own connection.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }
}

impl ExistingStateSource for SqliteStore<'_> {
    fn load_existing(&self, entity_type: &str) -> Result<ExistingState, ExError> {
        current_state::load_existing(self.conn, entity_type)
            .map_err(|e| transient("load_existing", e).with_entity_type(entity_type))
    }
}

impl CurrentStateSink for SqliteStore<'_> {
    fn upsert_document(
        &self,
        config: &EntityTypeConfig,
        document: &Document,
        snapshot_id: &SnapshotId,
    ) -> Result<(), ExError> {
        current_state::upsert_document(self.conn, config, document, snapshot_id).map_err(|e| {
            transient("upsert_document", e)
                .with_entity_type(&config.entity_type)
                .with_entity_id(&document.id)
        })
    }

    fn mark_tombstoned(
        &self,
        entity_type: &str,
        entity_id: &str,
        snapshot_id: &SnapshotId,
    ) -> Result<(), ExError> {
        current_state::mark_tombstoned(self.conn, entity_type, entity_id, snapshot_id)
            .map_err(|e| transient("mark_tombstoned", e))
    }
}

impl ChangeLogSink for SqliteStore<'_> {
    fn append(&self, record: &ChangeRecord) -> Result<bool, ExError> {
        change_log::append(self.conn, record).map_err(|e| transient("append_change", e))
    }

    fn change_counts(&self, entity_type: &str, snapshot_id: &str) -> Result<ChangeCounts, ExError> {
        change_log::count_changes(self.conn, snapshot_id, entity_type)
            .map_err(|e| transient("count_changes", e))
    }
}

impl SummarySink for SqliteStore<'_> {
    fn put_summary(&self, summary: &SnapshotSummary) -> Result<(), ExError> {
        summaries::put_summary(self.conn, summary).map_err(|e| transient("put_summary", e))
    }
}
