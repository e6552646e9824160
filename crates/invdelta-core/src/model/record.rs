use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Named attributes of one collected object.
///
/// `serde_json::Map` is ordered by key (no `preserve_order`), which keeps
/// serialized documents byte-stable across runs.
pub type Attributes = serde_json::Map<String, Value>;

/// One entity as collected in the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Stable id extracted from the family's key field
    pub id: String,
    /// Embedded collection time, if present and parseable
    pub collected_at: Option<DateTime<Utc>>,
    /// 1-based line in the staged batch (0 when built in memory)
    pub line: usize,
    pub attributes: Attributes,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            collected_at: None,
            line: 0,
            attributes,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }
}

/// A current-state document: the persisted projection of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub body: Attributes,
}

impl Document {
    pub fn new(id: impl Into<String>, body: Attributes) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

/// Previously persisted state for one family, split by liveness.
///
/// Tombstoned documents belong to entities last classified Deleted. They are
/// kept apart so that a still-absent entity is not reported again and a
/// reappearing one can be told apart from a brand-new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingState {
    pub active: BTreeMap<String, Document>,
    pub tombstoned: BTreeMap<String, Document>,
}

impl ExistingState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a state with only active documents
    pub fn from_active(docs: impl IntoIterator<Item = Document>) -> Self {
        Self {
            active: docs.into_iter().map(|d| (d.id.clone(), d)).collect(),
            tombstoned: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.tombstoned.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.tombstoned.len()
    }
}
