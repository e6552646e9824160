//! Degraded runs and retries: store writes that fail part-way

mod common;

use common::{principal_line, principals_config, run_at};
use invdelta_core::errors::{ExError, ExErrorKind};
use invdelta_core::loader::load_snapshot_str;
use invdelta_core::model::{
    ChangeCounts, ChangeRecord, Document, ExistingState, SnapshotId, SnapshotSummary,
};
use invdelta_core::state::{ChangeLogSink, CurrentStateSink, ExistingStateSource, SummarySink};
use invdelta_core::{run_family, EntityTypeConfig, IndexingResult, MemoryStore};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Wraps a MemoryStore and fails selected writes
struct FlakyStore {
    inner: MemoryStore,
    fail_ids: Mutex<BTreeSet<String>>,
    fail_tombstone_ids: BTreeSet<String>,
    /// Number of upcoming `put_summary` calls that fail
    summary_failures: AtomicU32,
    fail_existing: bool,
    fail_append: bool,
}

impl FlakyStore {
    fn new(fail_ids: &[&str]) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_ids: Mutex::new(fail_ids.iter().map(|s| s.to_string()).collect()),
            fail_tombstone_ids: BTreeSet::new(),
            summary_failures: AtomicU32::new(0),
            fail_existing: false,
            fail_append: false,
        }
    }

    fn heal(&self) {
        self.fail_ids.lock().unwrap().clear();
    }
}

impl ExistingStateSource for FlakyStore {
    fn load_existing(&self, entity_type: &str) -> Result<ExistingState, ExError> {
        if self.fail_existing {
            return Err(ExError::new(ExErrorKind::TransientIo).with_message("store offline"));
        }
        self.inner.load_existing(entity_type)
    }
}

impl CurrentStateSink for FlakyStore {
    fn upsert_document(
        &self,
        config: &EntityTypeConfig,
        document: &Document,
        snapshot_id: &SnapshotId,
    ) -> Result<(), ExError> {
        if self.fail_ids.lock().unwrap().contains(&document.id) {
            return Err(ExError::new(ExErrorKind::TransientIo).with_message("throttled"));
        }
        self.inner.upsert_document(config, document, snapshot_id)
    }

    fn mark_tombstoned(
        &self,
        entity_type: &str,
        entity_id: &str,
        snapshot_id: &SnapshotId,
    ) -> Result<(), ExError> {
        if self.fail_tombstone_ids.contains(entity_id) {
            return Err(ExError::new(ExErrorKind::TransientIo).with_message("throttled"));
        }
        self.inner.mark_tombstoned(entity_type, entity_id, snapshot_id)
    }
}

impl ChangeLogSink for FlakyStore {
    fn append(&self, record: &ChangeRecord) -> Result<bool, ExError> {
        if self.fail_append {
            return Err(ExError::new(ExErrorKind::TransientIo).with_message("audit store offline"));
        }
        self.inner.append(record)
    }

    fn change_counts(&self, entity_type: &str, snapshot_id: &str) -> Result<ChangeCounts, ExError> {
        self.inner.change_counts(entity_type, snapshot_id)
    }
}

impl SummarySink for FlakyStore {
    fn put_summary(&self, summary: &SnapshotSummary) -> Result<(), ExError> {
        let pending = self.summary_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.summary_failures.store(pending - 1, Ordering::SeqCst);
            return Err(ExError::new(ExErrorKind::TransientIo).with_message("summary store offline"));
        }
        self.inner.put_summary(summary)
    }
}

fn batch() -> String {
    ["A", "B", "C", "D"]
        .iter()
        .map(|id| principal_line(id, "active"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_partial_failure_reports_degraded_summary() {
    let store = FlakyStore::new(&["B", "D"]);
    let loaded = load_snapshot_str(&batch(), &principals_config()).unwrap();

    let result = run_family(
        &store,
        &loaded,
        &principals_config(),
        &run_at("2025-06-01T04-00-00Z"),
    )
    .unwrap();

    assert!(result.summary.success);
    assert!(result.summary.is_degraded());
    assert_eq!(result.summary.write_count, 2);
    assert_eq!(result.summary.failed_write_count, 2);
    assert_eq!(result.writes.failures[0].entity_id, "B");
    // Change log is written before current state, so all four are recorded
    assert_eq!(store.inner.change_log().len(), 4);
}

#[test]
fn test_retry_after_partial_write_narrows_diff() {
    let store = FlakyStore::new(&["B", "D"]);
    let loaded = load_snapshot_str(&batch(), &principals_config()).unwrap();
    let run = run_at("2025-06-01T04-00-00Z");
    run_family(&store, &loaded, &principals_config(), &run).unwrap();

    store.heal();
    let retry = run_family(&store, &loaded, &principals_config(), &run).unwrap();

    // The diff only covers the two documents that failed
    assert_eq!(retry.outcome.stats.unchanged, 2);
    assert_eq!(retry.outcome.stats.new, 2);
    assert_eq!(retry.writes.written, 2);
    // The summary still describes the whole snapshot
    assert_eq!(retry.summary.new_count, 4);
    assert_eq!(retry.summary.unchanged_count, 0);
    assert_eq!(retry.summary.write_count, 4);
    assert!(!retry.summary.is_degraded());
    // Same deterministic ids: the retry appends nothing new
    assert_eq!(retry.appended.appended, 0);
    assert_eq!(retry.appended.already_present, 2);
    assert_eq!(store.inner.change_log().len(), 4);
}

#[test]
fn test_existing_state_failure_aborts_and_records_failed_summary() {
    let mut store = FlakyStore::new(&[]);
    store.fail_existing = true;
    let loaded = load_snapshot_str(&batch(), &principals_config()).unwrap();

    let err = run_family(
        &store,
        &loaded,
        &principals_config(),
        &run_at("2025-06-01T04-00-00Z"),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::TransientIo);
    assert!(err.is_retryable());
    assert_eq!(err.entity_type(), Some("principals"));
    let summary = store
        .inner
        .summary("principals", "2025-06-01T04-00-00Z")
        .unwrap();
    assert!(!summary.success);
    assert_eq!(store.inner.document_count("principals"), 0);
}

#[test]
fn test_change_log_failure_writes_no_current_state() {
    let mut store = FlakyStore::new(&[]);
    store.fail_append = true;
    let loaded = load_snapshot_str(&batch(), &principals_config()).unwrap();

    let result = run_family(
        &store,
        &loaded,
        &principals_config(),
        &run_at("2025-06-01T04-00-00Z"),
    );

    assert!(result.is_err());
    assert_eq!(store.inner.document_count("principals"), 0);
}

#[test]
fn test_failed_tombstone_degrades_summary() {
    // GIVEN: three indexed principals, and a store that cannot tombstone C
    let mut store = FlakyStore::new(&[]);
    store.fail_tombstone_ids.insert("C".to_string());
    let first = ["A", "B", "C"]
        .iter()
        .map(|id| principal_line(id, "active"))
        .collect::<Vec<_>>()
        .join("\n");
    let first = load_snapshot_str(&first, &principals_config()).unwrap();
    run_family(
        &store,
        &first,
        &principals_config(),
        &run_at("2025-06-01T00-00-00Z"),
    )
    .unwrap();
    let loaded = load_snapshot_str(&principal_line("A", "active"), &principals_config()).unwrap();

    // WHEN: B and C disappear
    let result = run_family(
        &store,
        &loaded,
        &principals_config(),
        &run_at("2025-06-01T04-00-00Z"),
    )
    .unwrap();

    // THEN
    assert_eq!(result.summary.deleted_count, 2);
    assert_eq!(result.summary.tombstone_count, 1);
    assert_eq!(result.summary.failed_write_count, 1);
    assert_eq!(result.summary.write_count, 0);
    assert!(result.summary.is_degraded());
    assert_eq!(result.writes.failures.len(), 1);
    assert!(result.writes.failures[0].tombstone);
    assert_eq!(result.writes.failures[0].entity_id, "C");
    assert!(store.inner.is_tombstoned("principals", "B"));
    assert!(!store.inner.is_tombstoned("principals", "C"));

    let indexed = IndexingResult::from_summary(&result.summary, 1);
    assert_eq!(indexed.error_code.as_deref(), Some("ERR_PARTIAL_WRITE"));
}

#[test]
fn test_retry_after_summary_failure_keeps_snapshot_counts() {
    // GIVEN: the summary write and the failure summary both fail once
    let store = FlakyStore::new(&[]);
    store.summary_failures.store(2, Ordering::SeqCst);
    let batch = ["A", "B", "C"]
        .iter()
        .map(|id| principal_line(id, "active"))
        .collect::<Vec<_>>()
        .join("\n");
    let loaded = load_snapshot_str(&batch, &principals_config()).unwrap();
    let run = run_at("2025-06-01T04-00-00Z");

    // WHEN: the first attempt fails after writing change log and documents
    let err = run_family(&store, &loaded, &principals_config(), &run).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(store.inner.change_log().len(), 3);
    assert_eq!(store.inner.document_count("principals"), 3);

    // ...and the retry sees every document as already written
    let retry = run_family(&store, &loaded, &principals_config(), &run).unwrap();
    assert_eq!(retry.outcome.stats.unchanged, 3);

    // THEN: the persisted summary agrees with the change log
    let persisted = store
        .inner
        .summary("principals", "2025-06-01T04-00-00Z")
        .unwrap();
    assert!(persisted.success);
    assert_eq!(persisted.new_count, 3);
    assert_eq!(persisted.unchanged_count, 0);
    assert_eq!(persisted.write_count, 3);
    assert_eq!(IndexingResult::from_summary(&persisted, 2).new_count, 3);
}
