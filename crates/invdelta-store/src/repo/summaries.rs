//! Snapshot-summary table

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, from_serde_json, Result};
use invdelta_core::model::SnapshotSummary;
use rusqlite::{Connection, OptionalExtension};

/// Insert or replace the summary for (entity type, snapshot id)
pub fn put_summary(conn: &Connection, summary: &SnapshotSummary) -> Result<()> {
    let json = serde_json::to_string(summary).map_err(|e| from_serde_json("put_summary", e))?;
    conn.execute(
        "INSERT INTO snapshot_summaries (entity_type, snapshot_id, success, summary, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(entity_type, snapshot_id) DO UPDATE SET
            success = excluded.success,
            summary = excluded.summary,
            recorded_at = excluded.recorded_at",
        rusqlite::params![
            summary.entity_type,
            summary.snapshot_id,
            summary.success,
            json,
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

pub fn get_summary(
    conn: &Connection,
    entity_type: &str,
    snapshot_id: &str,
) -> Result<Option<SnapshotSummary>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT summary FROM snapshot_summaries WHERE entity_type = ?1 AND snapshot_id = ?2",
            [entity_type, snapshot_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;
    json.map(|j| serde_json::from_str(&j).map_err(|e| from_serde_json("get_summary", e)))
        .transpose()
}

/// Summaries of one snapshot (or all snapshots), ordered by snapshot then family
pub fn list_summaries(conn: &Connection, snapshot_id: Option<&str>) -> Result<Vec<SnapshotSummary>> {
    let mut stmt = conn
        .prepare(
            "SELECT summary FROM snapshot_summaries
             WHERE ?1 IS NULL OR snapshot_id = ?1
             ORDER BY snapshot_id, entity_type",
        )
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([snapshot_id], |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    rows.iter()
        .map(|j| serde_json::from_str(j).map_err(|e| from_serde_json("list_summaries", e)))
        .collect()
}

/// Most recent snapshot with at least one summary
pub fn latest_snapshot_id(conn: &Connection) -> Result<Option<String>> {
    conn.query_row(
        "SELECT MAX(snapshot_id) FROM snapshot_summaries",
        [],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}
