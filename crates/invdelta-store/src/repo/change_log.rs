//! Change-log table. Append and read only; the schema rejects UPDATE and DELETE.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, from_serde_json, Result};
use invdelta_core::model::{ChangeCounts, ChangeRecord, ChangeType};
use rusqlite::Connection;

/// Append one record. Returns `false` when the id is already present.
///
/// The existence test lives in the statement itself; a bare insert of a
/// known id is refused by the schema.
pub fn append(conn: &Connection, record: &ChangeRecord) -> Result<bool> {
    let json = serde_json::to_string(record).map_err(|e| from_serde_json("append_change", e))?;
    let inserted = conn
        .execute(
            "INSERT INTO change_log (id, snapshot_id, entity_type, entity_id, change_type,
                 change_timestamp, record)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
             WHERE NOT EXISTS (SELECT 1 FROM change_log WHERE id = ?1)",
            rusqlite::params![
                record.id,
                record.snapshot_id,
                record.entity_type,
                record.entity_id,
                record.change_type.as_str(),
                record.change_timestamp,
                json,
            ],
        )
        .map_err(from_rusqlite)?;
    Ok(inserted == 1)
}

/// Records of one snapshot partition, optionally restricted to a family,
/// in append order
pub fn list_changes(
    conn: &Connection,
    snapshot_id: &str,
    entity_type: Option<&str>,
) -> Result<Vec<ChangeRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT record FROM change_log
             WHERE snapshot_id = ?1 AND (?2 IS NULL OR entity_type = ?2)
             ORDER BY rowid",
        )
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map(rusqlite::params![snapshot_id, entity_type], |row| {
            row.get::<_, String>(0)
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    decode_all(rows)
}

/// Per-type counts of one (family, snapshot) partition
pub fn count_changes(
    conn: &Connection,
    snapshot_id: &str,
    entity_type: &str,
) -> Result<ChangeCounts> {
    let mut stmt = conn
        .prepare(
            "SELECT change_type, COUNT(*) FROM change_log
             WHERE snapshot_id = ?1 AND entity_type = ?2
             GROUP BY change_type",
        )
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([snapshot_id, entity_type], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let mut counts = ChangeCounts::default();
    for (change_type, n) in rows {
        // The schema CHECK constraint admits only known change types
        if let Some(change_type) = ChangeType::parse(&change_type) {
            counts.add(change_type, n as u64);
        }
    }
    Ok(counts)
}

/// Full lineage of one entity, oldest first
pub fn entity_history(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<ChangeRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT record FROM change_log
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY snapshot_id, rowid",
        )
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([entity_type, entity_id], |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    decode_all(rows)
}

fn decode_all(rows: Vec<String>) -> Result<Vec<ChangeRecord>> {
    rows.iter()
        .map(|json| serde_json::from_str(json).map_err(|e| from_serde_json("read_change", e)))
        .collect()
}
