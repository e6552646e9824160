use invdelta_core::model::{Attributes, Document, EntityRecord};
use invdelta_core::{EntityTypeConfig, RunContext, SnapshotId};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Principals family comparing only `status`
#[allow(dead_code)]
pub fn principals_config() -> EntityTypeConfig {
    EntityTypeConfig::new("principals", "objectId", &["status"])
        .with_document_fields(&["status", "name"])
}

#[allow(dead_code)]
pub fn snapshot(raw: &str) -> SnapshotId {
    SnapshotId::parse(raw).unwrap()
}

#[allow(dead_code)]
pub fn run_at(raw: &str) -> RunContext {
    RunContext::new(snapshot(raw))
}

fn attributes(id: &str, body: Value) -> Attributes {
    let mut attrs = body.as_object().cloned().unwrap_or_default();
    attrs.insert("objectId".to_string(), json!(id));
    attrs
}

/// Current-snapshot map from `(id, body)` pairs
#[allow(dead_code)]
pub fn current(entries: &[(&str, Value)]) -> BTreeMap<String, EntityRecord> {
    entries
        .iter()
        .map(|(id, body)| {
            (
                id.to_string(),
                EntityRecord::new(*id, attributes(id, body.clone())),
            )
        })
        .collect()
}

#[allow(dead_code)]
pub fn documents(entries: &[(&str, Value)]) -> Vec<Document> {
    entries
        .iter()
        .map(|(id, body)| Document::new(*id, attributes(id, body.clone())))
        .collect()
}

/// One JSONL line for the principals family
#[allow(dead_code)]
pub fn principal_line(id: &str, status: &str) -> String {
    json!({"objectId": id, "status": status}).to_string()
}
