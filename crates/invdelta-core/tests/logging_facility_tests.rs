#![allow(clippy::unwrap_used, clippy::expect_used)]

use invdelta_core::errors::{ExError, ExErrorKind, InvDeltaError};
use invdelta_core::loader::load_snapshot_str;
use invdelta_core::logging_facility::test_capture::init_test_capture;
use invdelta_core::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_ENTITY_TYPE, FIELD_ERR_CODE, FIELD_NEW,
    FIELD_WRITES,
};
use invdelta_core::{log_op_end, log_op_error, log_op_start};
use invdelta_core::{run_family, EntityTypeConfig, MemoryStore, RunContext, SnapshotId};

#[test]
fn test_log_op_start_and_end_macros() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_end_unique_1";

    log_op_start!(op_name, entity_type = "principals");
    log_op_end!(op_name, duration_ms = 42);

    capture.assert_event_exists(op_name, EVENT_START);
    let ends: Vec<_> = capture
        .events_for_op(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .collect();
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_2";

    let err = InvDeltaError::UnknownEntityType {
        entity_type: "gadgets".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let errors: Vec<_> = capture
        .events_for_op(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field(FIELD_ERR_CODE), Some("ERR_CONFIGURATION"));
}

#[test]
fn test_log_op_error_accepts_ex_error() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = ExError::new(ExErrorKind::TransientIo).with_message("store offline");
    log_op_error!(op_name, err, duration_ms = 1);

    let errors = capture.events_for_op(op_name);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field(FIELD_ERR_CODE), Some("ERR_TRANSIENT_IO"));
}

#[test]
fn test_skipped_records_are_logged_as_warnings() {
    let capture = init_test_capture();
    let config = EntityTypeConfig::new("logging_skip_family", "id", &["status"]);

    let loaded = load_snapshot_str("{\"status\": \"a\"}\n", &config).unwrap();

    assert_eq!(loaded.skipped.len(), 1);
    let warnings = capture.count_events(|e| {
        e.level == tracing::Level::WARN && e.field(FIELD_ENTITY_TYPE) == Some("logging_skip_family")
    });
    assert_eq!(warnings, 1);
}

#[test]
fn test_run_family_emits_start_and_end() {
    let capture = init_test_capture();
    let config = EntityTypeConfig::new("logging_run_family", "id", &["status"]);
    let loaded = load_snapshot_str("{\"id\": \"a\", \"status\": \"on\"}\n", &config).unwrap();
    let run = RunContext::new(SnapshotId::parse("2025-06-01T04-00-00Z").unwrap());

    run_family(&MemoryStore::new(), &loaded, &config, &run).unwrap();

    let events: Vec<_> = capture
        .events_for_op("run_family")
        .into_iter()
        .filter(|e| e.field(FIELD_ENTITY_TYPE) == Some("logging_run_family"))
        .collect();
    assert!(events.iter().any(|e| e.event.as_deref() == Some(EVENT_START)));
    let end = events
        .iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END))
        .unwrap();
    assert_eq!(end.field(FIELD_WRITES), Some("1"));
    assert_eq!(end.field(FIELD_NEW), Some("1"));
}
