use crate::errors::{ExError, ExErrorKind};
use crate::model::{
    ChangeCounts, ChangeRecord, Document, ExistingState, SnapshotId, SnapshotSummary,
};
use crate::registry::EntityTypeConfig;
use crate::state::{ChangeLogSink, CurrentStateSink, ExistingStateSource, SummarySink};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
struct StoredDocument {
    document: Document,
    tombstoned_snapshot_id: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    /// (entity_type, entity_id) -> document
    current: BTreeMap<(String, String), StoredDocument>,
    /// Append order is kept; ids are unique
    change_log: Vec<ChangeRecord>,
    /// (entity_type, snapshot_id) -> summary
    summaries: BTreeMap<(String, String), SnapshotSummary>,
}

/// In-memory implementation of the store contract.
///
/// Used by tests and by callers that only want classifications. Shared
/// between threads behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, ExError> {
        self.inner.lock().map_err(|_| {
            ExError::new(ExErrorKind::Concurrency)
                .with_op("memory_store")
                .with_message("store mutex poisoned")
        })
    }

    /// Pre-populate active documents, as if written by an earlier run
    pub fn seed(&self, entity_type: &str, documents: impl IntoIterator<Item = Document>) {
        if let Ok(mut inner) = self.lock() {
            for document in documents {
                inner.current.insert(
                    (entity_type.to_string(), document.id.clone()),
                    StoredDocument {
                        document,
                        tombstoned_snapshot_id: None,
                    },
                );
            }
        }
    }

    pub fn document(&self, entity_type: &str, entity_id: &str) -> Option<Document> {
        let inner = self.lock().ok()?;
        inner
            .current
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .map(|s| s.document.clone())
    }

    pub fn is_tombstoned(&self, entity_type: &str, entity_id: &str) -> bool {
        self.lock()
            .ok()
            .and_then(|inner| {
                inner
                    .current
                    .get(&(entity_type.to_string(), entity_id.to_string()))
                    .map(|s| s.tombstoned_snapshot_id.is_some())
            })
            .unwrap_or(false)
    }

    /// Number of stored documents (active and tombstoned) for a family
    pub fn document_count(&self, entity_type: &str) -> usize {
        self.lock()
            .map(|inner| {
                inner
                    .current
                    .keys()
                    .filter(|(t, _)| t == entity_type)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Change records in append order
    pub fn change_log(&self) -> Vec<ChangeRecord> {
        self.lock()
            .map(|inner| inner.change_log.clone())
            .unwrap_or_default()
    }

    pub fn summary(&self, entity_type: &str, snapshot_id: &str) -> Option<SnapshotSummary> {
        let inner = self.lock().ok()?;
        inner
            .summaries
            .get(&(entity_type.to_string(), snapshot_id.to_string()))
            .cloned()
    }
}

impl ExistingStateSource for MemoryStore {
    fn load_existing(&self, entity_type: &str) -> Result<ExistingState, ExError> {
        let inner = self.lock()?;
        let mut state = ExistingState::empty();
        for ((t, id), stored) in &inner.current {
            if t != entity_type {
                continue;
            }
            let target = if stored.tombstoned_snapshot_id.is_some() {
                &mut state.tombstoned
            } else {
                &mut state.active
            };
            target.insert(id.clone(), stored.document.clone());
        }
        Ok(state)
    }
}

impl CurrentStateSink for MemoryStore {
    fn upsert_document(
        &self,
        config: &EntityTypeConfig,
        document: &Document,
        _snapshot_id: &SnapshotId,
    ) -> Result<(), ExError> {
        let mut inner = self.lock()?;
        inner.current.insert(
            (config.entity_type.clone(), document.id.clone()),
            StoredDocument {
                document: document.clone(),
                tombstoned_snapshot_id: None,
            },
        );
        Ok(())
    }

    fn mark_tombstoned(
        &self,
        entity_type: &str,
        entity_id: &str,
        snapshot_id: &SnapshotId,
    ) -> Result<(), ExError> {
        let mut inner = self.lock()?;
        let stored = inner
            .current
            .get_mut(&(entity_type.to_string(), entity_id.to_string()))
            .ok_or_else(|| {
                ExError::new(ExErrorKind::NotFound)
                    .with_op("mark_tombstoned")
                    .with_entity_type(entity_type)
                    .with_entity_id(entity_id)
            })?;
        if stored.tombstoned_snapshot_id.is_none() {
            stored.tombstoned_snapshot_id = Some(snapshot_id.to_string());
        }
        Ok(())
    }
}

impl ChangeLogSink for MemoryStore {
    fn append(&self, record: &ChangeRecord) -> Result<bool, ExError> {
        let mut inner = self.lock()?;
        if inner.change_log.iter().any(|r| r.id == record.id) {
            return Ok(false);
        }
        inner.change_log.push(record.clone());
        Ok(true)
    }

    fn change_counts(&self, entity_type: &str, snapshot_id: &str) -> Result<ChangeCounts, ExError> {
        let inner = self.lock()?;
        Ok(ChangeCounts::from_records(inner.change_log.iter().filter(|r| {
            r.entity_type == entity_type && r.snapshot_id == snapshot_id
        })))
    }
}

impl SummarySink for MemoryStore {
    fn put_summary(&self, summary: &SnapshotSummary) -> Result<(), ExError> {
        let mut inner = self.lock()?;
        inner.summaries.insert(
            (summary.entity_type.clone(), summary.snapshot_id.clone()),
            summary.clone(),
        );
        Ok(())
    }
}
