//! Error handling for invdelta-store
//!
//! Wraps invdelta-core ExError with store-specific helpers

use invdelta_core::errors::{ExError, ExErrorKind};
use rusqlite::ErrorCode;
use std::path::Path;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

const APPEND_ONLY_MARKER: &str = "change_log is append-only";

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Configuration)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a database error from rusqlite::Error
///
/// Busy/locked databases are transient. Trigger aborts raised by the change
/// log map to `AppendOnlyViolation`.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains(APPEND_ONLY_MARKER) => {
            ExErrorKind::AppendOnlyViolation
        }
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            ExErrorKind::TransientIo
        }
        _ => ExErrorKind::Persistence,
    };
    ExError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Re-classify a generic store failure as transient for the given operation.
///
/// Kinds that already carry a more precise meaning pass through unchanged.
pub fn transient(operation: &str, err: ExError) -> ExError {
    if err.kind() == ExErrorKind::Persistence {
        ExError::new(ExErrorKind::TransientIo)
            .with_op(operation.to_string())
            .with_message("store operation failed")
            .with_source(err)
    } else {
        err.with_op(operation.to_string())
    }
}

/// Create a serialization error for stored JSON columns
pub fn from_serde_json(operation: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// A family name that cannot appear in a staged file name
pub fn invalid_family_name(entity_type: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("stage_snapshot")
        .with_entity_type(entity_type)
        .with_message(format!(
            "family name '{}' must be non-empty ASCII letters, digits, '_' or '-'",
            entity_type
        ))
}

/// A staged snapshot file does not exist
pub fn staged_snapshot_missing(path: &Path) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op("read_staged_snapshot")
        .with_message(format!("staged snapshot not found: {}", path.display()))
}

/// Reading a staged snapshot failed; the run may be retried
pub fn staged_snapshot_unreadable(path: &Path, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::TransientIo)
        .with_op("read_staged_snapshot")
        .with_message(format!("{}: {}", path.display(), err))
}
