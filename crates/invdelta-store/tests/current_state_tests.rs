//! Current-state persistence: upserts, tombstones and tombstone GC

use invdelta_core::errors::ExErrorKind;
use invdelta_core::model::{Document, SnapshotId};
use invdelta_core::EntityTypeConfig;
use invdelta_store::repo::current_state;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

fn setup_db() -> (TempDir, Connection) {
    let temp_dir = TempDir::new().unwrap();
    let conn = invdelta_store::db::open_and_migrate(temp_dir.path().join("test.db")).unwrap();
    (temp_dir, conn)
}

fn sid(raw: &str) -> SnapshotId {
    SnapshotId::parse(raw).unwrap()
}

fn resources() -> EntityTypeConfig {
    let mut cfg = EntityTypeConfig::new("resources", "id", &["status"]);
    cfg.target_container = "inventory".to_string();
    cfg.target_partition_key = Some("resourceType".to_string());
    cfg
}

fn doc(id: &str, status: &str) -> Document {
    Document::new(
        id,
        json!({"id": id, "status": status, "resourceType": "vm"})
            .as_object()
            .cloned()
            .unwrap(),
    )
}

#[test]
fn test_upsert_records_container_partition_and_lineage() {
    let (_dir, conn) = setup_db();
    let cfg = resources();

    current_state::upsert_document(&conn, &cfg, &doc("r1", "on"), &sid("2025-06-01T00-00-00Z"))
        .unwrap();
    current_state::upsert_document(&conn, &cfg, &doc("r1", "off"), &sid("2025-06-02T00-00-00Z"))
        .unwrap();

    let stored = current_state::load_document(&conn, "resources", "r1")
        .unwrap()
        .unwrap();
    assert_eq!(stored.container, "inventory");
    assert_eq!(stored.partition_key, "vm");
    assert_eq!(stored.first_seen_snapshot_id, "2025-06-01T00-00-00Z");
    assert_eq!(stored.last_snapshot_id, "2025-06-02T00-00-00Z");
    assert_eq!(stored.updated_at, "2025-06-02T00:00:00Z");
    assert_eq!(stored.document.get("status"), Some(&json!("off")));
    assert_eq!(stored.document_digest.len(), 64);
}

#[test]
fn test_tombstone_keeps_row_and_splits_existing_state() {
    let (_dir, conn) = setup_db();
    let cfg = resources();
    let first = sid("2025-06-01T00-00-00Z");
    current_state::upsert_document(&conn, &cfg, &doc("r1", "on"), &first).unwrap();
    current_state::upsert_document(&conn, &cfg, &doc("r2", "on"), &first).unwrap();

    current_state::mark_tombstoned(&conn, "resources", "r2", &sid("2025-06-02T00-00-00Z"))
        .unwrap();
    // Re-flagging keeps the original tombstone snapshot
    current_state::mark_tombstoned(&conn, "resources", "r2", &sid("2025-06-03T00-00-00Z"))
        .unwrap();

    let state = current_state::load_existing(&conn, "resources").unwrap();
    assert_eq!(state.active.keys().collect::<Vec<_>>(), vec!["r1"]);
    assert_eq!(state.tombstoned.keys().collect::<Vec<_>>(), vec!["r2"]);
    let stored = current_state::load_document(&conn, "resources", "r2")
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.tombstoned_snapshot_id.as_deref(),
        Some("2025-06-02T00-00-00Z")
    );
    assert_eq!(current_state::count_documents(&conn, "resources").unwrap(), (1, 1));
}

#[test]
fn test_tombstoning_unknown_entity_is_not_found() {
    let (_dir, conn) = setup_db();
    let err = current_state::mark_tombstoned(&conn, "resources", "ghost", &sid("2025-06-01T00-00-00Z"))
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_purge_removes_only_old_tombstones_of_family() {
    let (_dir, conn) = setup_db();
    let cfg = resources();
    let first = sid("2025-06-01T00-00-00Z");
    for id in ["old", "recent", "alive"] {
        current_state::upsert_document(&conn, &cfg, &doc(id, "on"), &first).unwrap();
    }
    current_state::mark_tombstoned(&conn, "resources", "old", &sid("2025-06-02T00-00-00Z"))
        .unwrap();
    current_state::mark_tombstoned(&conn, "resources", "recent", &sid("2025-06-10T00-00-00Z"))
        .unwrap();

    let removed =
        current_state::purge_tombstones(&conn, "resources", &sid("2025-06-05T00-00-00Z")).unwrap();

    assert_eq!(removed, 1);
    assert!(current_state::load_document(&conn, "resources", "old")
        .unwrap()
        .is_none());
    assert!(current_state::load_document(&conn, "resources", "recent")
        .unwrap()
        .is_some());
    assert_eq!(current_state::count_documents(&conn, "resources").unwrap(), (1, 1));
}
