//! Reconciliation output types.
//!
//! Collections are `BTreeMap` or id-sorted `Vec` so serialization is
//! deterministic.

use crate::model::{ChangeRecord, Document};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classification of one entity for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    New,
    Modified,
    Unchanged,
    Deleted,
    /// Reappeared after having been tombstoned
    Restored,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::New => "new",
            Classification::Modified => "modified",
            Classification::Unchanged => "unchanged",
            Classification::Deleted => "deleted",
            Classification::Restored => "restored",
        }
    }
}

/// Per-classification counts of one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    /// Entities in the current snapshot
    pub total: u64,
    pub new: u64,
    pub modified: u64,
    pub unchanged: u64,
    pub deleted: u64,
    pub restored: u64,
}

impl ReconcileStats {
    pub(crate) fn record(&mut self, class: Classification) {
        match class {
            Classification::New => self.new += 1,
            Classification::Modified => self.modified += 1,
            Classification::Unchanged => self.unchanged += 1,
            Classification::Deleted => self.deleted += 1,
            Classification::Restored => self.restored += 1,
        }
    }
}

/// Everything the writers need for one (family, snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub entity_type: String,
    pub snapshot_id: String,
    pub delta_detection_enabled: bool,
    pub classifications: BTreeMap<String, Classification>,
    /// Change records ordered by entity id
    pub change_log: Vec<ChangeRecord>,
    /// Projected documents to upsert, ordered by id
    pub write_set: Vec<Document>,
    /// Ids to flag as tombstoned, ordered
    pub tombstones: Vec<String>,
    pub stats: ReconcileStats,
}

impl ReconcileOutcome {
    /// Ids with the given classification, in id order
    pub fn ids_with(&self, class: Classification) -> Vec<&str> {
        self.classifications
            .iter()
            .filter(|(_, c)| **c == class)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
