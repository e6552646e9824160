//! Per-family indexing pipeline.
//!
//! read existing state -> reconcile -> append change log -> write current
//! state -> write summary. Each step is idempotent, so a failed run can be
//! repeated against the same staged snapshot. Summary counts are taken from
//! the snapshot's change-log partition, so a repeat reports the same
//! snapshot totals as an uninterrupted run.

#![allow(clippy::result_large_err)]

use crate::diff::{reconcile, ReconcileOutcome};
use crate::errors::ExError;
use crate::loader::LoadedSnapshot;
use crate::model::{ExistingState, RunContext, SnapshotSummary};
use crate::registry::EntityTypeConfig;
use crate::state::{IndexStore, SummarySink};
use crate::writers::{
    append_change_log, build_summary, write_current_state, write_summary, AppendReport,
    WriteReport,
};
use crate::{log_op_end, log_op_error, log_op_start};
use std::time::Instant;

/// Everything produced by one successful family run
#[derive(Debug, Clone)]
pub struct FamilyRun {
    pub outcome: ReconcileOutcome,
    pub appended: AppendReport,
    pub writes: WriteReport,
    pub summary: SnapshotSummary,
}

/// Reconcile one loaded snapshot against `store` and persist the results.
///
/// Partial current-state failures yield `Ok` with a degraded summary.
///
/// # Errors
///
/// Existing-state read, change-log append and summary write failures abort
/// the run. A failed summary is then recorded on a best-effort basis.
pub fn run_family<S: IndexStore + ?Sized>(
    store: &S,
    loaded: &LoadedSnapshot,
    config: &EntityTypeConfig,
    run: &RunContext,
) -> Result<FamilyRun, ExError> {
    let start = Instant::now();
    log_op_start!(
        "run_family",
        entity_type = %config.entity_type,
        snapshot_id = %run.snapshot_id,
        run_id = %run.run_id,
        delta_detection_enabled = run.delta_detection_enabled
    );

    match run_family_inner(store, loaded, config, run) {
        Ok(result) => {
            log_op_end!(
                "run_family",
                duration_ms = start.elapsed().as_millis() as u64,
                entity_type = %config.entity_type,
                run_id = %run.run_id,
                total = result.summary.total_entities,
                new = result.summary.new_count,
                modified = result.summary.modified_count,
                unchanged = result.summary.unchanged_count,
                deleted = result.summary.deleted_count,
                restored = result.summary.restored_count,
                writes = result.summary.write_count
            );
            Ok(result)
        }
        Err(err) => {
            let err = err
                .with_entity_type(&config.entity_type)
                .with_snapshot_id(run.snapshot_id.as_str())
                .with_run_id(run.run_id.clone());
            log_op_error!(
                "run_family",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                entity_type = %config.entity_type,
                run_id = %run.run_id
            );
            record_failure(store, &config.entity_type, run, &err);
            Err(err)
        }
    }
}

fn run_family_inner<S: IndexStore + ?Sized>(
    store: &S,
    loaded: &LoadedSnapshot,
    config: &EntityTypeConfig,
    run: &RunContext,
) -> Result<FamilyRun, ExError> {
    let existing = if run.delta_detection_enabled {
        store.load_existing(&config.entity_type)?
    } else {
        ExistingState::empty()
    };

    let outcome = reconcile(&loaded.records, &existing, config, run);
    let appended = append_change_log(store, &outcome.change_log)?;
    let writes = write_current_state(store, &outcome, config, run);
    let logged = if run.delta_detection_enabled {
        Some(store.change_counts(&config.entity_type, run.snapshot_id.as_str())?)
    } else {
        None
    };
    let summary = build_summary(&outcome, loaded.skipped.len(), &writes, logged.as_ref());
    write_summary(store, &summary)?;

    Ok(FamilyRun {
        outcome,
        appended,
        writes,
        summary,
    })
}

/// Best-effort write of a failed summary so the run leaves a trace even
/// when it could not classify anything.
pub fn record_failure<S: SummarySink + ?Sized>(
    store: &S,
    entity_type: &str,
    run: &RunContext,
    err: &ExError,
) {
    let summary = SnapshotSummary::failed(
        entity_type,
        run.snapshot_id.as_str(),
        run.delta_detection_enabled,
        err,
    );
    if let Err(summary_err) = store.put_summary(&summary) {
        tracing::warn!(
            entity_type = %entity_type,
            run_id = %run.run_id,
            error = %summary_err,
            "failed to record failure summary"
        );
    }
}
