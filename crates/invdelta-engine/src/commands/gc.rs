//! Tombstone garbage collection

#![allow(clippy::result_large_err)]

use invdelta_core::errors::ExError;
use invdelta_core::{log_op_end, log_op_start, EntityTypeRegistry, SnapshotId};
use invdelta_store::errors::Result;
use invdelta_store::repo::current_state;
use rusqlite::Connection;
use std::time::Instant;

/// Remove tombstoned documents of `entity_type` deleted before `before`.
///
/// Returns the number of documents removed. The change log keeps the full
/// lineage of removed entities.
///
/// # Errors
///
/// `Configuration` for a family missing from the registry.
pub fn purge_tombstones(
    conn: &Connection,
    registry: &EntityTypeRegistry,
    entity_type: &str,
    before: &SnapshotId,
) -> Result<usize> {
    let start = Instant::now();
    registry
        .get(entity_type)
        .map_err(|e| ExError::from(e).with_op("purge_tombstones"))?;

    log_op_start!("purge_tombstones", entity_type, before = %before);
    let removed = current_state::purge_tombstones(conn, entity_type, before)?;
    log_op_end!(
        "purge_tombstones",
        duration_ms = start.elapsed().as_millis() as u64,
        entity_type,
        removed = removed as u64
    );
    Ok(removed)
}
