//! The change log accepts appends and rejects every form of rewrite

use invdelta_core::errors::ExErrorKind;
use invdelta_core::model::{ChangeRecord, ChangeType, SnapshotId};
use invdelta_store::errors::from_rusqlite;
use invdelta_store::repo::change_log;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

fn setup_db() -> (TempDir, Connection) {
    let temp_dir = TempDir::new().unwrap();
    let conn = invdelta_store::db::open_and_migrate(temp_dir.path().join("test.db")).unwrap();
    (temp_dir, conn)
}

fn record(snapshot: &str, id: &str, change_type: ChangeType) -> ChangeRecord {
    ChangeRecord::new(
        &SnapshotId::parse(snapshot).unwrap(),
        "principals",
        id,
        change_type,
    )
    .with_new(json!({"objectId": id}))
}

#[test]
fn test_append_then_reappend_is_noop() {
    let (_dir, conn) = setup_db();
    let r = record("2025-06-01T00-00-00Z", "A", ChangeType::New);

    assert!(change_log::append(&conn, &r).unwrap());
    assert!(!change_log::append(&conn, &r).unwrap());

    let listed = change_log::list_changes(&conn, "2025-06-01T00-00-00Z", None).unwrap();
    assert_eq!(listed, vec![r]);
}

#[test]
fn test_update_is_rejected_by_schema() {
    let (_dir, conn) = setup_db();
    change_log::append(&conn, &record("2025-06-01T00-00-00Z", "A", ChangeType::New)).unwrap();

    let err = conn
        .execute("UPDATE change_log SET change_type = 'deleted'", [])
        .unwrap_err();

    assert_eq!(from_rusqlite(err).kind(), ExErrorKind::AppendOnlyViolation);
}

#[test]
fn test_delete_is_rejected_by_schema() {
    let (_dir, conn) = setup_db();
    change_log::append(&conn, &record("2025-06-01T00-00-00Z", "A", ChangeType::New)).unwrap();

    let err = conn.execute("DELETE FROM change_log", []).unwrap_err();
    assert_eq!(from_rusqlite(err).kind(), ExErrorKind::AppendOnlyViolation);

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM change_log", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_replace_is_rejected_by_schema() {
    let (_dir, conn) = setup_db();
    let r = record("2025-06-01T00-00-00Z", "A", ChangeType::New);
    change_log::append(&conn, &r).unwrap();

    let err = conn
        .execute(
            "INSERT OR REPLACE INTO change_log (id, snapshot_id, entity_type, entity_id, change_type, change_timestamp, record)
             VALUES (?1, '2025-06-01T00-00-00Z', 'principals', 'A', 'deleted', 't', '{}')",
            [&r.id],
        )
        .unwrap_err();
    assert_eq!(from_rusqlite(err).kind(), ExErrorKind::AppendOnlyViolation);

    let stored = change_log::list_changes(&conn, "2025-06-01T00-00-00Z", None).unwrap();
    assert_eq!(stored, vec![r]);
}

#[test]
fn test_history_spans_snapshots() {
    let (_dir, conn) = setup_db();
    change_log::append(&conn, &record("2025-06-01T00-00-00Z", "A", ChangeType::New)).unwrap();
    change_log::append(&conn, &record("2025-06-02T00-00-00Z", "B", ChangeType::New)).unwrap();
    change_log::append(&conn, &record("2025-06-03T00-00-00Z", "A", ChangeType::Deleted)).unwrap();

    let history = change_log::entity_history(&conn, "principals", "A").unwrap();
    let kinds: Vec<_> = history.iter().map(|r| r.change_type).collect();
    assert_eq!(kinds, vec![ChangeType::New, ChangeType::Deleted]);

    let june_2 = change_log::list_changes(&conn, "2025-06-02T00-00-00Z", Some("principals")).unwrap();
    assert_eq!(june_2.len(), 1);
    assert!(change_log::list_changes(&conn, "2025-06-02T00-00-00Z", Some("edges"))
        .unwrap()
        .is_empty());
}
