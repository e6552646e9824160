//! Single-family indexing against SQLite.
//!
//! ## Steps (in order):
//! 1. Resolve the family in the registry (Configuration error, no writes)
//! 2. Load the staged snapshot (failed summary recorded on error)
//! 3. Reconcile and persist through [`SqliteStore`]

#![allow(clippy::result_large_err)]

use invdelta_core::errors::ExError;
use invdelta_core::pipeline::record_failure;
use invdelta_core::{run_family, EntityTypeRegistry, FamilyRun, RunContext, SnapshotId};
use invdelta_store::errors::Result;
use invdelta_store::{SqliteStore, StagingArea};
use rusqlite::Connection;
use std::time::Duration;

/// Runtime options of an indexing run.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// When false every entity is written as New (full refresh).
    pub delta_detection_enabled: bool,
    /// Attempts per family, including the first. Values below 1 count as 1.
    pub max_attempts: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// Families to index. `None` means every staged family known to the registry.
    pub families: Option<Vec<String>>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            delta_detection_enabled: true,
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            families: None,
        }
    }
}

impl IndexOptions {
    pub fn run_context(&self, snapshot_id: SnapshotId) -> RunContext {
        if self.delta_detection_enabled {
            RunContext::new(snapshot_id)
        } else {
            RunContext::full_refresh(snapshot_id)
        }
    }
}

/// Index one family of a staged run.
///
/// # Errors
///
/// `Configuration` when the family is not in the registry, `NotFound` when
/// nothing was staged for it, plus any error of [`run_family`].
pub fn index_family(
    conn: &Connection,
    registry: &EntityTypeRegistry,
    staging: &StagingArea,
    run: &RunContext,
    entity_type: &str,
) -> Result<FamilyRun> {
    let config = registry.get(entity_type).map_err(|e| {
        ExError::from(e)
            .with_op("index_family")
            .with_snapshot_id(run.snapshot_id.as_str())
            .with_run_id(run.run_id.clone())
    })?;

    let store = SqliteStore::new(conn);
    let loaded = match staging.load(&run.snapshot_id, config) {
        Ok(loaded) => loaded,
        Err(err) => {
            let err = err
                .with_entity_type(entity_type)
                .with_run_id(run.run_id.clone());
            record_failure(&store, entity_type, run, &err);
            return Err(err);
        }
    };

    run_family(&store, &loaded, config, run)
}
