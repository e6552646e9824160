use crate::model::run::SnapshotId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Kind of transition recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    New,
    Modified,
    Deleted,
    /// Entity reappeared after having been classified Deleted
    Restored,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::New => "new",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
            ChangeType::Restored => "restored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ChangeType::New),
            "modified" => Some(ChangeType::Modified),
            "deleted" => Some(ChangeType::Deleted),
            "restored" => Some(ChangeType::Restored),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Old/new values of one differing compare field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub old: Value,
    pub new: Value,
}

/// One immutable fact of history.
///
/// Serialized with camelCase keys, which is the wire shape consumers of the
/// audit store already read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub id: String,
    pub entity_id: String,
    pub entity_type: String,
    pub change_type: ChangeType,
    /// RFC 3339 time of the run that observed the change
    pub change_timestamp: String,
    pub snapshot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<BTreeMap<String, FieldDelta>>,
}

impl ChangeRecord {
    pub fn new(
        snapshot_id: &SnapshotId,
        entity_type: &str,
        entity_id: &str,
        change_type: ChangeType,
    ) -> Self {
        Self {
            id: change_record_id(snapshot_id.as_str(), entity_type, entity_id, change_type),
            entity_id: entity_id.to_string(),
            entity_type: entity_type.to_string(),
            change_type,
            change_timestamp: snapshot_id.rfc3339(),
            snapshot_id: snapshot_id.as_str().to_string(),
            previous_value: None,
            new_value: None,
            delta: None,
        }
    }

    pub fn with_previous(mut self, value: Value) -> Self {
        self.previous_value = Some(value);
        self
    }

    pub fn with_new(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn with_delta(mut self, delta: BTreeMap<String, FieldDelta>) -> Self {
        self.delta = Some(delta);
        self
    }
}

/// Deterministic change record id.
///
/// Re-running the same snapshot produces the same ids, so a retried append
/// lands on the existing rows instead of duplicating history.
pub fn change_record_id(
    snapshot_id: &str,
    entity_type: &str,
    entity_id: &str,
    change_type: ChangeType,
) -> String {
    let mut hasher = Sha256::new();
    for part in [snapshot_id, entity_type, entity_id, change_type.as_str()] {
        // Length prefix keeps component boundaries unambiguous for any id text
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Per-type record counts of one (family, snapshot) change-log partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub new: u64,
    pub modified: u64,
    pub deleted: u64,
    pub restored: u64,
}

impl ChangeCounts {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ChangeRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            counts.add(record.change_type, 1);
        }
        counts
    }

    pub fn add(&mut self, change_type: ChangeType, n: u64) {
        match change_type {
            ChangeType::New => self.new += n,
            ChangeType::Modified => self.modified += n,
            ChangeType::Deleted => self.deleted += n,
            ChangeType::Restored => self.restored += n,
        }
    }

    /// Records that imply a document upsert
    pub fn upserts(&self) -> u64 {
        self.new + self.modified + self.restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sid() -> SnapshotId {
        SnapshotId::parse("2025-06-01T04-00-00Z").unwrap()
    }

    #[test]
    fn test_change_record_id_is_stable_and_distinct() {
        let a = change_record_id("s", "principals", "A", ChangeType::New);
        let b = change_record_id("s", "principals", "A", ChangeType::New);
        let c = change_record_id("s", "principals", "A", ChangeType::Modified);
        let d = change_record_id("s", "principalsA", "", ChangeType::New);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_change_record_id_with_separator_in_entity_id() {
        let a = change_record_id("s", "t", "a\u{1f}b", ChangeType::New);
        let b = change_record_id("s", "t\u{1f}a", "b", ChangeType::New);
        let c = change_record_id("s", "t", "a", ChangeType::New);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_change_counts_from_records() {
        let records = [
            ChangeRecord::new(&sid(), "principals", "A", ChangeType::New),
            ChangeRecord::new(&sid(), "principals", "B", ChangeType::New),
            ChangeRecord::new(&sid(), "principals", "C", ChangeType::Restored),
            ChangeRecord::new(&sid(), "principals", "D", ChangeType::Deleted),
        ];
        let counts = ChangeCounts::from_records(&records);
        assert_eq!(counts.new, 2);
        assert_eq!(counts.deleted, 1);
        assert_eq!(counts.upserts(), 3);
    }

    #[test]
    fn test_new_record_omits_absent_values() {
        let record = ChangeRecord::new(&sid(), "principals", "A", ChangeType::New)
            .with_new(json!({"objectId": "A"}));
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["changeType"], "new");
        assert_eq!(v["changeTimestamp"], "2025-06-01T04:00:00Z");
        assert!(v.get("previousValue").is_none());
        assert!(v.get("delta").is_none());
    }

    #[test]
    fn test_change_type_parse_matches_as_str() {
        for ct in [
            ChangeType::New,
            ChangeType::Modified,
            ChangeType::Deleted,
            ChangeType::Restored,
        ] {
            assert_eq!(ChangeType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ChangeType::parse("unchanged"), None);
    }
}
