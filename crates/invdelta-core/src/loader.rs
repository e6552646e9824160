//! Snapshot loader
//!
//! Turns a staged JSONL batch into `map[id] -> record`. Bad lines are
//! skipped and reported; they never abort the batch.

#![allow(clippy::result_large_err)]

use crate::errors::{ExError, ExErrorKind, InvDeltaError};
use crate::model::{Attributes, EntityRecord};
use crate::registry::EntityTypeConfig;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::BufRead;

/// Result of loading one staged batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedSnapshot {
    pub records: BTreeMap<String, EntityRecord>,
    /// Lines dropped for shape problems, in stream order
    pub skipped: Vec<InvDeltaError>,
    /// Non-blank lines seen
    pub lines_read: usize,
    /// Records replaced by a same-id record
    pub duplicates_collapsed: usize,
}

impl LoadedSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load a staged batch for one family.
///
/// # Errors
///
/// `TransientIo` when the underlying reader fails. Shape problems are
/// collected in [`LoadedSnapshot::skipped`] instead.
pub fn load_snapshot<R: BufRead>(
    reader: R,
    config: &EntityTypeConfig,
) -> Result<LoadedSnapshot, ExError> {
    let mut loaded = LoadedSnapshot::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| {
            ExError::new(ExErrorKind::TransientIo)
                .with_op("load_snapshot")
                .with_entity_type(&config.entity_type)
                .with_message(format!("read failed at line {}: {}", line_no, e))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        loaded.lines_read += 1;

        match parse_record(line_no, &line, config) {
            Ok(record) => insert_latest(&mut loaded, record),
            Err(err) => {
                tracing::warn!(
                    entity_type = %config.entity_type,
                    line = line_no,
                    error = %err,
                    "skipping staged record"
                );
                loaded.skipped.push(err);
            }
        }
    }

    tracing::debug!(
        entity_type = %config.entity_type,
        records = loaded.records.len(),
        skipped = loaded.skipped.len(),
        duplicates = loaded.duplicates_collapsed,
        "snapshot loaded"
    );

    Ok(loaded)
}

/// Convenience wrapper over [`load_snapshot`] for in-memory batches
pub fn load_snapshot_str(content: &str, config: &EntityTypeConfig) -> Result<LoadedSnapshot, ExError> {
    load_snapshot(content.as_bytes(), config)
}

/// Parse one staged line into a record.
pub fn parse_record(
    line: usize,
    text: &str,
    config: &EntityTypeConfig,
) -> Result<EntityRecord, InvDeltaError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| InvDeltaError::MalformedRecord {
            entity_type: config.entity_type.clone(),
            line,
            reason: e.to_string(),
        })?;

    let attributes = match value {
        Value::Object(map) => map,
        other => {
            return Err(InvDeltaError::MalformedRecord {
                entity_type: config.entity_type.clone(),
                line,
                reason: format!("expected object, found {}", json_kind(&other)),
            })
        }
    };

    let id = extract_key(&attributes, line, config)?;
    check_discriminator(&attributes, line, config)?;

    let collected_at = attributes
        .get(&config.collected_at_field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(EntityRecord {
        id,
        collected_at,
        line,
        attributes,
    })
}

fn extract_key(
    attributes: &Attributes,
    line: usize,
    config: &EntityTypeConfig,
) -> Result<String, InvDeltaError> {
    let missing = || InvDeltaError::MissingKeyField {
        entity_type: config.entity_type.clone(),
        key_field: config.key_field.clone(),
        line,
    };

    match attributes.get(&config.key_field) {
        None | Some(Value::Null) => Err(missing()),
        Some(Value::String(s)) if s.trim().is_empty() => Err(missing()),
        Some(Value::String(s)) => Ok(s.clone()),
        // Decimal form, so 42, 42.0 and "42" collapse to one entity
        Some(Value::Number(n)) => integral_key(n).ok_or_else(|| InvDeltaError::NonScalarKey {
            entity_type: config.entity_type.clone(),
            line,
        }),
        Some(_) => Err(InvDeltaError::NonScalarKey {
            entity_type: config.entity_type.clone(),
            line,
        }),
    }
}

/// Largest magnitude at which every integer is exactly representable in f64
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

fn integral_key(n: &serde_json::Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return Some(i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.to_string());
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f.abs() <= MAX_EXACT_F64).then(|| (f as i64).to_string())
}

fn check_discriminator(
    attributes: &Attributes,
    line: usize,
    config: &EntityTypeConfig,
) -> Result<(), InvDeltaError> {
    let Some(field) = config.discriminator_field.as_deref() else {
        return Ok(());
    };
    if config.discriminator_values.is_empty() {
        return Ok(());
    }

    let value = match attributes.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "null".to_string(),
        Some(other) => other.to_string(),
    };
    if config.discriminator_values.iter().any(|v| v == &value) {
        Ok(())
    } else {
        Err(InvDeltaError::ForeignDiscriminator {
            entity_type: config.entity_type.clone(),
            line,
            value,
        })
    }
}

/// Keep the record with the latest collection time for each id.
///
/// A parseable timestamp beats a missing one. On equal timestamps, or when
/// both are missing, the record appearing later in the stream wins.
fn insert_latest(loaded: &mut LoadedSnapshot, record: EntityRecord) {
    match loaded.records.get(&record.id) {
        None => {
            loaded.records.insert(record.id.clone(), record);
        }
        Some(existing) => {
            loaded.duplicates_collapsed += 1;
            let replace = match (existing.collected_at, record.collected_at) {
                (Some(held), Some(incoming)) => incoming >= held,
                (None, Some(_)) => true,
                (Some(_), None) => false,
                (None, None) => true,
            };
            if replace {
                loaded.records.insert(record.id.clone(), record);
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principals() -> EntityTypeConfig {
        EntityTypeConfig::new("principals", "objectId", &["displayName"])
            .with_discriminator("principalType", &["user", "group"])
    }

    #[test]
    fn test_numeric_key_is_normalised() {
        let cfg = EntityTypeConfig::new("edges", "id", &["status"]);
        let loaded = load_snapshot_str("{\"id\": 42, \"status\": \"a\"}\n", &cfg).unwrap();
        assert!(loaded.records.contains_key("42"));
    }

    #[test]
    fn test_integral_float_key_matches_integer_key() {
        let cfg = EntityTypeConfig::new("edges", "id", &["status"]);
        let input = concat!(
            "{\"id\": 42.0, \"status\": \"a\"}\n",
            "{\"id\": 1e2, \"status\": \"a\"}\n",
            "{\"id\": 1.5, \"status\": \"a\"}\n",
            "{\"id\": 1e300, \"status\": \"a\"}\n",
        );
        let loaded = load_snapshot_str(input, &cfg).unwrap();
        let ids: Vec<_> = loaded.records.keys().cloned().collect();
        assert_eq!(ids, vec!["100".to_string(), "42".to_string()]);
        assert_eq!(loaded.skipped.len(), 2);
        assert!(matches!(loaded.skipped[0], InvDeltaError::NonScalarKey { line: 3, .. }));
        assert!(matches!(loaded.skipped[1], InvDeltaError::NonScalarKey { line: 4, .. }));
    }

    #[test]
    fn test_bad_lines_are_skipped_not_fatal() {
        let input = concat!(
            "{\"objectId\": \"A\", \"principalType\": \"user\"}\n",
            "not json\n",
            "[1, 2]\n",
            "{\"principalType\": \"user\"}\n",
            "{\"objectId\": \"\", \"principalType\": \"user\"}\n",
            "{\"objectId\": {\"nested\": 1}, \"principalType\": \"user\"}\n",
            "{\"objectId\": \"B\", \"principalType\": \"device\"}\n",
            "\n",
        );
        let loaded = load_snapshot_str(input, &principals()).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.lines_read, 7);
        assert_eq!(loaded.skipped.len(), 6);
        assert!(matches!(
            loaded.skipped[2],
            InvDeltaError::MissingKeyField { line: 4, .. }
        ));
        assert!(matches!(loaded.skipped[4], InvDeltaError::NonScalarKey { .. }));
        assert!(matches!(
            loaded.skipped[5],
            InvDeltaError::ForeignDiscriminator { ref value, .. } if value == "device"
        ));
    }

    #[test]
    fn test_timestamped_record_beats_untimestamped() {
        let input = concat!(
            "{\"objectId\": \"A\", \"principalType\": \"user\", \"collectionTimestamp\": \"2025-01-01T00:00:00Z\", \"v\": 1}\n",
            "{\"objectId\": \"A\", \"principalType\": \"user\", \"v\": 2}\n",
        );
        let loaded = load_snapshot_str(input, &principals()).unwrap();
        assert_eq!(loaded.records["A"].get("v"), Some(&serde_json::json!(1)));
        assert_eq!(loaded.duplicates_collapsed, 1);
    }

    #[test]
    fn test_timestamps_compare_as_instants() {
        let input = concat!(
            "{\"objectId\": \"A\", \"principalType\": \"user\", \"collectionTimestamp\": \"2025-01-01T10:00:00+02:00\", \"v\": 1}\n",
            "{\"objectId\": \"A\", \"principalType\": \"user\", \"collectionTimestamp\": \"2025-01-01T09:00:00Z\", \"v\": 2}\n",
        );
        let loaded = load_snapshot_str(input, &principals()).unwrap();
        assert_eq!(loaded.records["A"].get("v"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_equal_timestamps_keep_later_line() {
        let input = concat!(
            "{\"objectId\": \"A\", \"principalType\": \"user\", \"collectionTimestamp\": \"2025-01-01T00:00:00Z\", \"v\": 1}\n",
            "{\"objectId\": \"A\", \"principalType\": \"user\", \"collectionTimestamp\": \"2025-01-01T00:00:00Z\", \"v\": 2}\n",
        );
        let loaded = load_snapshot_str(input, &principals()).unwrap();
        assert_eq!(loaded.records["A"].get("v"), Some(&serde_json::json!(2)));
        assert_eq!(loaded.records["A"].line, 2);
    }
}
