//! Per-run aggregates and the result contract returned to callers.

use crate::errors::{ExError, ExErrorKind};
use serde::{Deserialize, Serialize};

/// One aggregate document per (entity type, snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub entity_type: String,
    pub snapshot_id: String,
    pub total_entities: u64,
    pub new_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub unchanged_count: u64,
    pub restored_count: u64,
    /// Current-state documents upserted for this snapshot, across attempts
    pub write_count: u64,
    pub failed_write_count: u64,
    pub tombstone_count: u64,
    /// Staged lines dropped by the loader
    pub skipped_records: u64,
    pub delta_detection_enabled: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SnapshotSummary {
    /// Summary of a run that failed before anything was classified.
    pub fn failed(
        entity_type: &str,
        snapshot_id: &str,
        delta_detection_enabled: bool,
        error: &ExError,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            snapshot_id: snapshot_id.to_string(),
            total_entities: 0,
            new_count: 0,
            modified_count: 0,
            deleted_count: 0,
            unchanged_count: 0,
            restored_count: 0,
            write_count: 0,
            failed_write_count: 0,
            tombstone_count: 0,
            skipped_records: 0,
            delta_detection_enabled,
            success: false,
            error: Some(error.to_string()),
        }
    }

    /// Successful run in which some current-state writes failed
    pub fn is_degraded(&self) -> bool {
        self.success && self.failed_write_count > 0
    }

    /// Fraction of entities that had to be written. 0 for empty or failed runs.
    pub fn write_efficiency(&self) -> f64 {
        if !self.success || self.total_entities == 0 {
            return 0.0;
        }
        self.write_count as f64 / self.total_entities as f64
    }

    /// Percentage of writes avoided compared to a full refresh.
    /// 0 for empty or failed runs.
    pub fn write_reduction_pct(&self) -> f64 {
        if !self.success || self.total_entities == 0 {
            return 0.0;
        }
        let avoided = self.total_entities.saturating_sub(self.write_count);
        avoided as f64 * 100.0 / self.total_entities as f64
    }
}

/// Outcome of indexing one family for one snapshot, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
    pub success: bool,
    pub entity_type: String,
    pub snapshot_id: String,
    pub total_entities: u64,
    pub new_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub unchanged_count: u64,
    pub restored_count: u64,
    pub write_count: u64,
    pub failed_write_count: u64,
    /// Attempts used, including the successful one
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl IndexingResult {
    pub fn from_summary(summary: &SnapshotSummary, attempts: u32) -> Self {
        Self {
            success: summary.success,
            entity_type: summary.entity_type.clone(),
            snapshot_id: summary.snapshot_id.clone(),
            total_entities: summary.total_entities,
            new_count: summary.new_count,
            modified_count: summary.modified_count,
            deleted_count: summary.deleted_count,
            unchanged_count: summary.unchanged_count,
            restored_count: summary.restored_count,
            write_count: summary.write_count,
            failed_write_count: summary.failed_write_count,
            attempts,
            error: summary.error.clone(),
            error_code: summary
                .is_degraded()
                .then(|| ExErrorKind::PartialWrite.code().to_string()),
        }
    }

    pub fn failed(entity_type: &str, snapshot_id: &str, error: &ExError, attempts: u32) -> Self {
        Self {
            success: false,
            entity_type: entity_type.to_string(),
            snapshot_id: snapshot_id.to_string(),
            total_entities: 0,
            new_count: 0,
            modified_count: 0,
            deleted_count: 0,
            unchanged_count: 0,
            restored_count: 0,
            write_count: 0,
            failed_write_count: 0,
            attempts,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.success && self.failed_write_count > 0
    }

    /// Same guard as [`SnapshotSummary::write_reduction_pct`]
    pub fn write_reduction_pct(&self) -> f64 {
        if !self.success || self.total_entities == 0 {
            return 0.0;
        }
        let avoided = self.total_entities.saturating_sub(self.write_count);
        avoided as f64 * 100.0 / self.total_entities as f64
    }
}
