//! Current-state table: latest document per (entity type, id)

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, from_serde_json, Result};
use invdelta_core::errors::{ExError, ExErrorKind};
use invdelta_core::model::{Attributes, Document, ExistingState, SnapshotId};
use invdelta_core::EntityTypeConfig;
use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A current-state row with its bookkeeping columns
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub entity_type: String,
    pub document: Document,
    pub container: String,
    pub partition_key: String,
    pub document_digest: String,
    pub tombstoned: bool,
    pub tombstoned_snapshot_id: Option<String>,
    pub first_seen_snapshot_id: String,
    pub last_snapshot_id: String,
    pub updated_at: String,
}

const SELECT_COLUMNS: &str = "entity_type, entity_id, container, partition_key, document, \
     document_digest, tombstoned, tombstoned_snapshot_id, first_seen_snapshot_id, \
     last_snapshot_id, updated_at";

/// Insert or replace a document, clearing any tombstone.
pub fn upsert_document(
    conn: &Connection,
    config: &EntityTypeConfig,
    document: &Document,
    snapshot_id: &SnapshotId,
) -> Result<()> {
    let body = serde_json::to_string(&document.body)
        .map_err(|e| from_serde_json("upsert_document", e))?;
    let digest = hex::encode(Sha256::digest(body.as_bytes()));
    let partition_key = partition_key(document, config);

    conn.execute(
        "INSERT INTO current_state (entity_type, entity_id, container, partition_key, document,
             document_digest, tombstoned, tombstoned_snapshot_id, first_seen_snapshot_id,
             last_snapshot_id, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7, ?7, ?8)
         ON CONFLICT(entity_type, entity_id) DO UPDATE SET
            container = excluded.container,
            partition_key = excluded.partition_key,
            document = excluded.document,
            document_digest = excluded.document_digest,
            tombstoned = 0,
            tombstoned_snapshot_id = NULL,
            last_snapshot_id = excluded.last_snapshot_id,
            updated_at = excluded.updated_at",
        rusqlite::params![
            config.entity_type,
            document.id,
            config.target_container,
            partition_key,
            body,
            digest,
            snapshot_id.as_str(),
            snapshot_id.rfc3339(),
        ],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// Flag a document as deleted in `snapshot_id`. Already tombstoned rows
/// keep their original tombstone snapshot.
pub fn mark_tombstoned(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    snapshot_id: &SnapshotId,
) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE current_state
             SET tombstoned = 1, tombstoned_snapshot_id = ?3, last_snapshot_id = ?3, updated_at = ?4
             WHERE entity_type = ?1 AND entity_id = ?2 AND tombstoned = 0",
            rusqlite::params![
                entity_type,
                entity_id,
                snapshot_id.as_str(),
                snapshot_id.rfc3339()
            ],
        )
        .map_err(from_rusqlite)?;

    if updated == 0 && load_document(conn, entity_type, entity_id)?.is_none() {
        return Err(ExError::new(ExErrorKind::NotFound)
            .with_op("mark_tombstoned")
            .with_entity_type(entity_type)
            .with_entity_id(entity_id)
            .with_message("no current-state document to tombstone"));
    }
    Ok(())
}

/// All documents of one family, split into active and tombstoned
pub fn load_existing(conn: &Connection, entity_type: &str) -> Result<ExistingState> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM current_state WHERE entity_type = ?1 ORDER BY entity_id",
            SELECT_COLUMNS
        ))
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([entity_type], read_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let mut state = ExistingState::empty();
    for row in rows {
        let stored = into_stored(row)?;
        let target = if stored.tombstoned {
            &mut state.tombstoned
        } else {
            &mut state.active
        };
        target.insert(stored.document.id.clone(), stored.document);
    }
    Ok(state)
}

/// One document with its bookkeeping, active or tombstoned
pub fn load_document(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Option<StoredDocument>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM current_state WHERE entity_type = ?1 AND entity_id = ?2",
                SELECT_COLUMNS
            ),
            [entity_type, entity_id],
            read_row,
        )
        .optional()
        .map_err(from_rusqlite)?;
    row.map(into_stored).transpose()
}

/// Physically remove tombstoned rows whose tombstone predates `before`.
///
/// Returns the number of rows removed. The change log is not touched.
pub fn purge_tombstones(
    conn: &Connection,
    entity_type: &str,
    before: &SnapshotId,
) -> Result<usize> {
    conn.execute(
        "DELETE FROM current_state
         WHERE entity_type = ?1 AND tombstoned = 1 AND tombstoned_snapshot_id < ?2",
        rusqlite::params![entity_type, before.as_str()],
    )
    .map_err(from_rusqlite)
}

/// (active, tombstoned) document counts for a family
pub fn count_documents(conn: &Connection, entity_type: &str) -> Result<(u64, u64)> {
    conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN tombstoned = 0 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN tombstoned = 1 THEN 1 ELSE 0 END), 0)
         FROM current_state WHERE entity_type = ?1",
        [entity_type],
        |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
    )
    .map_err(from_rusqlite)
}

fn partition_key(document: &Document, config: &EntityTypeConfig) -> String {
    match document.get(config.partition_field()) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => document.id.clone(),
        Some(other) => other.to_string(),
    }
}

struct RawRow {
    entity_type: String,
    entity_id: String,
    container: String,
    partition_key: String,
    document: String,
    document_digest: String,
    tombstoned: i64,
    tombstoned_snapshot_id: Option<String>,
    first_seen_snapshot_id: String,
    last_snapshot_id: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        entity_type: row.get(0)?,
        entity_id: row.get(1)?,
        container: row.get(2)?,
        partition_key: row.get(3)?,
        document: row.get(4)?,
        document_digest: row.get(5)?,
        tombstoned: row.get(6)?,
        tombstoned_snapshot_id: row.get(7)?,
        first_seen_snapshot_id: row.get(8)?,
        last_snapshot_id: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn into_stored(raw: RawRow) -> Result<StoredDocument> {
    let body: Attributes = serde_json::from_str(&raw.document).map_err(|e| {
        from_serde_json("load_document", e)
            .with_entity_type(&raw.entity_type)
            .with_entity_id(&raw.entity_id)
    })?;
    Ok(StoredDocument {
        entity_type: raw.entity_type,
        document: Document::new(raw.entity_id, body),
        container: raw.container,
        partition_key: raw.partition_key,
        document_digest: raw.document_digest,
        tombstoned: raw.tombstoned != 0,
        tombstoned_snapshot_id: raw.tombstoned_snapshot_id,
        first_seen_snapshot_id: raw.first_seen_snapshot_id,
        last_snapshot_id: raw.last_snapshot_id,
        updated_at: raw.updated_at,
    })
}
