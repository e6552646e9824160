//! Local indexing driver.
//!
//! Each family runs on its own scoped thread with its own connection.
//! Failed attempts are retried while the error kind is retryable; a degraded
//! result (some current-state writes failed) is reported as-is.

#![allow(clippy::result_large_err)]

use crate::commands::index::{index_family, IndexOptions};
use invdelta_core::errors::{ExError, ExErrorKind};
use invdelta_core::{
    log_op_end, log_op_error, log_op_start, EntityTypeRegistry, IndexingResult, RunContext,
    RunId, SnapshotId, SnapshotSummary,
};
use invdelta_store::errors::Result;
use invdelta_store::StagingArea;
use rusqlite::Connection;
use serde::Serialize;
use std::thread;
use std::time::Instant;

/// Outcome of one run across families, sorted by entity type
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub snapshot_id: String,
    /// Correlates this report with the run's log events
    pub run_id: RunId,
    pub results: Vec<IndexingResult>,
    pub summaries: Vec<SnapshotSummary>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn any_degraded(&self) -> bool {
        self.results.iter().any(|r| r.is_degraded())
    }

    pub fn total_writes(&self) -> u64 {
        self.results.iter().map(|r| r.write_count).sum()
    }

    pub fn result_for(&self, entity_type: &str) -> Option<&IndexingResult> {
        self.results.iter().find(|r| r.entity_type == entity_type)
    }
}

/// Index every requested family of a staged run.
///
/// `conn_factory` is called once per attempt; connections are never shared
/// between threads.
///
/// # Errors
///
/// Only failures to enumerate the staged run are returned. Per-family
/// failures are reported in [`RunReport::results`].
pub fn run_indexing<F>(
    conn_factory: F,
    registry: &EntityTypeRegistry,
    staging: &StagingArea,
    snapshot_id: &SnapshotId,
    options: &IndexOptions,
) -> Result<RunReport>
where
    F: Fn() -> Result<Connection> + Sync,
{
    let start = Instant::now();
    let run = options.run_context(snapshot_id.clone());
    log_op_start!(
        "run_indexing",
        snapshot_id = %snapshot_id,
        run_id = %run.run_id,
        delta_detection_enabled = options.delta_detection_enabled
    );

    let families = match select_families(registry, staging, snapshot_id, options) {
        Ok(families) => families,
        Err(err) => {
            let err = err
                .with_snapshot_id(snapshot_id.as_str())
                .with_run_id(run.run_id.clone());
            log_op_error!(
                "run_indexing",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                run_id = %run.run_id
            );
            return Err(err);
        }
    };

    let mut outcomes: Vec<(IndexingResult, SnapshotSummary)> = thread::scope(|scope| {
        let handles: Vec<_> = families
            .iter()
            .map(|family| {
                let conn_factory = &conn_factory;
                let run = &run;
                let handle = scope.spawn(move || {
                    index_with_retry(conn_factory, registry, staging, run, family, options)
                });
                (family, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(family, handle)| {
                handle.join().unwrap_or_else(|_| {
                    let err = ExError::new(ExErrorKind::Internal)
                        .with_op("index_family")
                        .with_entity_type(family.as_str())
                        .with_run_id(run.run_id.clone())
                        .with_message("indexing thread panicked");
                    failed_outcome(family, &run, &err, 1)
                })
            })
            .collect()
    });
    outcomes.sort_by(|a, b| a.0.entity_type.cmp(&b.0.entity_type));

    let (results, summaries): (Vec<_>, Vec<_>) = outcomes.into_iter().unzip();
    let report = RunReport {
        snapshot_id: snapshot_id.as_str().to_string(),
        run_id: run.run_id.clone(),
        results,
        summaries,
    };

    log_op_end!(
        "run_indexing",
        duration_ms = start.elapsed().as_millis() as u64,
        snapshot_id = %snapshot_id,
        run_id = %report.run_id,
        families = report.results.len() as u64,
        succeeded = report.results.iter().filter(|r| r.success).count() as u64,
        degraded = report.any_degraded(),
        writes = report.total_writes()
    );
    Ok(report)
}

/// Requested families, or staged families known to the registry.
///
/// Explicitly requested families are kept even when unknown so the run
/// reports them as configuration failures.
fn select_families(
    registry: &EntityTypeRegistry,
    staging: &StagingArea,
    snapshot_id: &SnapshotId,
    options: &IndexOptions,
) -> Result<Vec<String>> {
    if let Some(requested) = &options.families {
        let mut families = requested.clone();
        families.sort();
        families.dedup();
        return Ok(families);
    }

    let mut families = Vec::new();
    for family in staging.staged_families(snapshot_id)? {
        if registry.contains(&family) {
            families.push(family);
        } else {
            tracing::warn!(
                entity_type = %family,
                snapshot_id = %snapshot_id,
                "staged family not in registry, skipped"
            );
        }
    }
    Ok(families)
}

fn index_with_retry<F>(
    conn_factory: &F,
    registry: &EntityTypeRegistry,
    staging: &StagingArea,
    run: &RunContext,
    entity_type: &str,
    options: &IndexOptions,
) -> (IndexingResult, SnapshotSummary)
where
    F: Fn() -> Result<Connection>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = conn_factory()
            .and_then(|conn| index_family(&conn, registry, staging, run, entity_type));

        match outcome {
            Ok(family_run) => {
                let result = IndexingResult::from_summary(&family_run.summary, attempt);
                tracing::info!(
                    entity_type,
                    snapshot_id = %run.snapshot_id,
                    run_id = %run.run_id,
                    attempts = attempt,
                    writes = result.write_count,
                    failed_writes = result.failed_write_count,
                    "family indexed"
                );
                return (result, family_run.summary);
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    entity_type,
                    snapshot_id = %run.snapshot_id,
                    run_id = %run.run_id,
                    attempt,
                    max_attempts,
                    err_code = err.code(),
                    error = %err,
                    "family run failed, retrying"
                );
                thread::sleep(options.retry_delay);
            }
            Err(err) => return failed_outcome(entity_type, run, &err, attempt),
        }
    }
}

fn failed_outcome(
    entity_type: &str,
    run: &RunContext,
    err: &ExError,
    attempts: u32,
) -> (IndexingResult, SnapshotSummary) {
    let snapshot_id = run.snapshot_id.as_str();
    (
        IndexingResult::failed(entity_type, snapshot_id, err, attempts),
        SnapshotSummary::failed(entity_type, snapshot_id, run.delta_detection_enabled, err),
    )
}
