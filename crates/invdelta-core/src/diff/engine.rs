//! Reconciliation engine.
//!
//! [`reconcile`] compares a loaded snapshot against persisted state and
//! produces classifications, change records, the write-set and the
//! tombstone list. It performs no I/O and reads no clock.

use crate::diff::model::{Classification, ReconcileOutcome, ReconcileStats};
use crate::model::{
    Attributes, ChangeRecord, ChangeType, Document, EntityRecord, ExistingState, FieldDelta,
    RunContext,
};
use crate::registry::EntityTypeConfig;
use serde_json::Value;
use std::collections::BTreeMap;

/// Classify every entity of one family for one run.
///
/// With delta detection disabled every current record is New and written,
/// and no change records or tombstones are produced.
pub fn reconcile(
    current: &BTreeMap<String, EntityRecord>,
    existing: &ExistingState,
    config: &EntityTypeConfig,
    run: &RunContext,
) -> ReconcileOutcome {
    let entity_type = config.entity_type.as_str();
    let snapshot_id = &run.snapshot_id;

    let mut classifications = BTreeMap::new();
    let mut change_log = Vec::new();
    let mut write_set = Vec::new();
    let mut tombstones = Vec::new();
    let mut stats = ReconcileStats {
        total: current.len() as u64,
        ..ReconcileStats::default()
    };

    if !run.delta_detection_enabled {
        for (id, record) in current {
            classifications.insert(id.clone(), Classification::New);
            stats.record(Classification::New);
            write_set.push(project(record, config));
        }
        return ReconcileOutcome {
            entity_type: entity_type.to_string(),
            snapshot_id: snapshot_id.to_string(),
            delta_detection_enabled: false,
            classifications,
            change_log,
            write_set,
            tombstones,
            stats,
        };
    }

    // Walk the union of current and active ids in key order, so the change
    // log comes out sorted by entity id without a second pass.
    let mut current_iter = current.iter().peekable();
    let mut active_iter = existing.active.iter().peekable();

    loop {
        let step = match (current_iter.peek(), active_iter.peek()) {
            (None, None) => break,
            (Some((cid, _)), Some((aid, _))) => cid.as_str().cmp(aid.as_str()),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
        };

        let (id, class) = match step {
            std::cmp::Ordering::Less => {
                let Some((id, record)) = current_iter.next() else {
                    break;
                };
                let projected = project(record, config);
                match existing.tombstoned.get(id) {
                    Some(previous) => {
                        let delta = compare_fields(previous, record, config);
                        let mut change =
                            ChangeRecord::new(snapshot_id, entity_type, id, ChangeType::Restored)
                                .with_previous(previous.to_value())
                                .with_new(projected.to_value());
                        if !delta.is_empty() {
                            change = change.with_delta(delta);
                        }
                        change_log.push(change);
                        write_set.push(projected);
                        (id, Classification::Restored)
                    }
                    None => {
                        change_log.push(
                            ChangeRecord::new(snapshot_id, entity_type, id, ChangeType::New)
                                .with_new(projected.to_value()),
                        );
                        write_set.push(projected);
                        (id, Classification::New)
                    }
                }
            }
            std::cmp::Ordering::Equal => {
                let (Some((id, record)), Some((_, previous))) =
                    (current_iter.next(), active_iter.next())
                else {
                    break;
                };
                let delta = compare_fields(previous, record, config);
                if delta.is_empty() {
                    (id, Classification::Unchanged)
                } else {
                    let projected = project(record, config);
                    change_log.push(
                        ChangeRecord::new(snapshot_id, entity_type, id, ChangeType::Modified)
                            .with_previous(previous.to_value())
                            .with_new(projected.to_value())
                            .with_delta(delta),
                    );
                    write_set.push(projected);
                    (id, Classification::Modified)
                }
            }
            std::cmp::Ordering::Greater => {
                let Some((id, previous)) = active_iter.next() else {
                    break;
                };
                change_log.push(
                    ChangeRecord::new(snapshot_id, entity_type, id, ChangeType::Deleted)
                        .with_previous(previous.to_value()),
                );
                tombstones.push(id.clone());
                (id, Classification::Deleted)
            }
        };

        stats.record(class);
        classifications.insert(id.clone(), class);
    }

    ReconcileOutcome {
        entity_type: entity_type.to_string(),
        snapshot_id: snapshot_id.to_string(),
        delta_detection_enabled: true,
        classifications,
        change_log,
        write_set,
        tombstones,
        stats,
    }
}

/// Compare the configured fields of a stored document against a record.
///
/// Absent and null are equal; nested values compare structurally. Only
/// differing fields appear in the result.
pub fn compare_fields(
    previous: &Document,
    current: &EntityRecord,
    config: &EntityTypeConfig,
) -> BTreeMap<String, FieldDelta> {
    let mut delta = BTreeMap::new();
    for field in &config.compare_fields {
        let old = previous.get(field).unwrap_or(&Value::Null);
        let new = current.get(field).unwrap_or(&Value::Null);
        if old != new {
            delta.insert(
                field.clone(),
                FieldDelta {
                    old: old.clone(),
                    new: new.clone(),
                },
            );
        }
    }
    delta
}

/// Project a record onto the family's document fields.
///
/// The key field is always kept. An empty field list keeps the whole record.
pub fn project(record: &EntityRecord, config: &EntityTypeConfig) -> Document {
    if config.document_fields.is_empty() {
        return Document::new(record.id.clone(), record.attributes.clone());
    }

    let mut body = Attributes::new();
    if let Some(key) = record.get(&config.key_field) {
        body.insert(config.key_field.clone(), key.clone());
    }
    for field in &config.document_fields {
        if let Some(value) = record.get(field) {
            body.insert(field.clone(), value.clone());
        }
    }
    Document::new(record.id.clone(), body)
}
