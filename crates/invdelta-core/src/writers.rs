//! Writers for the three stores of one family run.
//!
//! Order is change log, then current state, then summary. The change log
//! append is fail-closed; current-state writes collect individual failures
//! into a degraded result.

#![allow(clippy::result_large_err)]

use crate::diff::ReconcileOutcome;
use crate::errors::{ExError, InvDeltaError};
use crate::model::{ChangeCounts, ChangeRecord, RunContext, SnapshotSummary};
use crate::registry::EntityTypeConfig;
use crate::state::{ChangeLogSink, CurrentStateSink, SummarySink};

/// Outcome of appending a batch of change records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendReport {
    pub appended: usize,
    /// Records whose id was already in the log (retry of an earlier attempt)
    pub already_present: usize,
}

/// One current-state write that did not go through
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub entity_id: String,
    pub tombstone: bool,
    pub error: ExError,
}

/// Outcome of applying a write-set and tombstone list
#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub attempted: usize,
    /// Documents upserted
    pub written: usize,
    /// Tombstone flags applied
    pub tombstoned: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failed_upserts(&self) -> usize {
        self.failures.iter().filter(|f| !f.tombstone).count()
    }

    pub fn failed_tombstones(&self) -> usize {
        self.failures.iter().filter(|f| f.tombstone).count()
    }
}

/// Append every change record, stopping at the first failure.
///
/// # Errors
///
/// The first store error, with the failing entity attached.
pub fn append_change_log<S: ChangeLogSink + ?Sized>(
    sink: &S,
    records: &[ChangeRecord],
) -> Result<AppendReport, ExError> {
    let mut report = AppendReport::default();
    for record in records {
        let inserted = sink.append(record).map_err(|e| {
            e.with_entity_type(&record.entity_type)
                .with_entity_id(&record.entity_id)
        })?;
        if inserted {
            report.appended += 1;
        } else {
            report.already_present += 1;
        }
    }
    Ok(report)
}

/// Upsert the write-set, then flag tombstones. Never deletes.
pub fn write_current_state<S: CurrentStateSink + ?Sized>(
    sink: &S,
    outcome: &ReconcileOutcome,
    config: &EntityTypeConfig,
    run: &RunContext,
) -> WriteReport {
    let mut report = WriteReport {
        attempted: outcome.write_set.len() + outcome.tombstones.len(),
        ..WriteReport::default()
    };

    for document in &outcome.write_set {
        match sink.upsert_document(config, document, &run.snapshot_id) {
            Ok(()) => report.written += 1,
            Err(error) => {
                tracing::warn!(
                    entity_type = %config.entity_type,
                    entity_id = %document.id,
                    error = %error,
                    "current-state upsert failed"
                );
                report.failures.push(WriteFailure {
                    entity_id: document.id.clone(),
                    tombstone: false,
                    error,
                });
            }
        }
    }

    for entity_id in &outcome.tombstones {
        match sink.mark_tombstoned(&config.entity_type, entity_id, &run.snapshot_id) {
            Ok(()) => report.tombstoned += 1,
            Err(error) => {
                tracing::warn!(
                    entity_type = %config.entity_type,
                    entity_id = %entity_id,
                    error = %error,
                    "tombstone write failed"
                );
                report.failures.push(WriteFailure {
                    entity_id: entity_id.clone(),
                    tombstone: true,
                    error,
                });
            }
        }
    }

    report
}

/// Aggregate counts of one successful family run.
///
/// `logged` holds the change-log counts of the whole (family, snapshot)
/// partition. When given, classification and write counts describe the
/// snapshot across all attempts rather than only this attempt's diff, which
/// is narrower after a retry. Without it (full refresh) the outcome's own
/// stats are used.
pub fn build_summary(
    outcome: &ReconcileOutcome,
    skipped_records: usize,
    writes: &WriteReport,
    logged: Option<&ChangeCounts>,
) -> SnapshotSummary {
    let error = writes.is_degraded().then(|| {
        InvDeltaError::PartialWrite {
            entity_type: outcome.entity_type.clone(),
            attempted: writes.attempted,
            failed: writes.failed(),
        }
        .to_string()
    });

    let stats = &outcome.stats;
    let (counts, write_count, tombstone_count) = match logged {
        Some(counts) => (
            *counts,
            counts
                .upserts()
                .saturating_sub(writes.failed_upserts() as u64),
            counts
                .deleted
                .saturating_sub(writes.failed_tombstones() as u64),
        ),
        None => (
            ChangeCounts {
                new: stats.new,
                modified: stats.modified,
                deleted: stats.deleted,
                restored: stats.restored,
            },
            writes.written as u64,
            writes.tombstoned as u64,
        ),
    };

    SnapshotSummary {
        entity_type: outcome.entity_type.clone(),
        snapshot_id: outcome.snapshot_id.clone(),
        total_entities: stats.total,
        new_count: counts.new,
        modified_count: counts.modified,
        deleted_count: counts.deleted,
        unchanged_count: stats.total.saturating_sub(counts.upserts()),
        restored_count: counts.restored,
        write_count,
        failed_write_count: writes.failed() as u64,
        tombstone_count,
        skipped_records: skipped_records as u64,
        delta_detection_enabled: outcome.delta_detection_enabled,
        success: true,
        error,
    }
}

/// Persist the run summary.
///
/// # Errors
///
/// Store failure, tagged with the family and snapshot.
pub fn write_summary<S: SummarySink + ?Sized>(
    sink: &S,
    summary: &SnapshotSummary,
) -> Result<(), ExError> {
    sink.put_summary(summary).map_err(|e| {
        e.with_entity_type(&summary.entity_type)
            .with_snapshot_id(&summary.snapshot_id)
    })
}
