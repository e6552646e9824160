//! Entity-type registry
//!
//! Declares, per entity family, which field identifies an entity, which
//! fields decide Modified vs Unchanged and which fields are persisted. The
//! registry is a YAML document so a deployment can add a family without
//! touching reconciliation code.
//!
//! ```yaml
//! schema_version: 0
//! entity_types:
//!   - entity_type: principals
//!     key_field: objectId
//!     compare_fields: [displayName, accountEnabled]
//!     target_container: principals
//! ```

#![allow(clippy::result_large_err)]

use crate::errors::InvDeltaError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Registry shipped with the crate.
pub const DEFAULT_REGISTRY_YAML: &str = include_str!("../../registry/default.yaml");

const SUPPORTED_SCHEMA_VERSION: u32 = 0;

fn default_collected_at_field() -> String {
    "collectionTimestamp".to_string()
}

/// Declarative configuration of one entity family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityTypeConfig {
    pub entity_type: String,
    /// Attribute holding the stable id (e.g. `objectId`)
    pub key_field: String,
    /// Attributes whose change makes an entity Modified
    pub compare_fields: Vec<String>,
    /// Attributes persisted into the current-state document; empty keeps all
    #[serde(default)]
    pub document_fields: Vec<String>,
    pub target_container: String,
    /// Attribute whose value partitions the container; defaults to the key field
    #[serde(default)]
    pub target_partition_key: Option<String>,
    /// Attribute carrying the RFC 3339 collection time used for de-duplication
    #[serde(default = "default_collected_at_field")]
    pub collected_at_field: String,
    /// Attribute naming the sub-kind of the record (e.g. `principalType`)
    #[serde(default)]
    pub discriminator_field: Option<String>,
    /// Accepted discriminator values; empty accepts any value
    #[serde(default)]
    pub discriminator_values: Vec<String>,
}

impl EntityTypeConfig {
    /// Minimal entry, mostly useful for tests and programmatic registries.
    pub fn new(
        entity_type: impl Into<String>,
        key_field: impl Into<String>,
        compare_fields: &[&str],
    ) -> Self {
        let entity_type = entity_type.into();
        Self {
            target_container: entity_type.clone(),
            entity_type,
            key_field: key_field.into(),
            compare_fields: compare_fields.iter().map(|f| f.to_string()).collect(),
            document_fields: Vec::new(),
            target_partition_key: None,
            collected_at_field: default_collected_at_field(),
            discriminator_field: None,
            discriminator_values: Vec::new(),
        }
    }

    pub fn with_document_fields(mut self, fields: &[&str]) -> Self {
        self.document_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_discriminator(mut self, field: &str, values: &[&str]) -> Self {
        self.discriminator_field = Some(field.to_string());
        self.discriminator_values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    /// Attribute used as partition key
    pub fn partition_field(&self) -> &str {
        self.target_partition_key
            .as_deref()
            .unwrap_or(&self.key_field)
    }

    /// Check the entry for internal consistency.
    ///
    /// A compare field that is not persisted would read back as null on the
    /// next run and report every entity Modified forever, so compare fields
    /// must be a subset of document fields whenever the latter are declared.
    pub fn validate(&self) -> Result<(), InvDeltaError> {
        let invalid = |reason: String| InvDeltaError::InvalidRegistryEntry {
            entity_type: self.entity_type.clone(),
            reason,
        };

        if self.entity_type.is_empty()
            || !self
                .entity_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid(
                "entity_type must be non-empty and use only [A-Za-z0-9_-]".to_string(),
            ));
        }
        if self.key_field.is_empty() {
            return Err(invalid("key_field must not be empty".to_string()));
        }
        if self.target_container.is_empty() {
            return Err(invalid("target_container must not be empty".to_string()));
        }
        if self.compare_fields.is_empty() {
            return Err(invalid("compare_fields must not be empty".to_string()));
        }

        let mut seen = BTreeSet::new();
        for field in &self.compare_fields {
            if field.is_empty() {
                return Err(invalid("compare_fields contains an empty name".to_string()));
            }
            if !seen.insert(field.as_str()) {
                return Err(invalid(format!("compare field '{}' listed twice", field)));
            }
            if field == &self.key_field {
                return Err(invalid(format!(
                    "key field '{}' cannot be a compare field",
                    field
                )));
            }
        }

        if !self.document_fields.is_empty() {
            let documented: BTreeSet<&str> =
                self.document_fields.iter().map(String::as_str).collect();
            if let Some(missing) = self
                .compare_fields
                .iter()
                .find(|f| !documented.contains(f.as_str()))
            {
                return Err(invalid(format!(
                    "compare field '{}' is not persisted in document_fields",
                    missing
                )));
            }
        }

        if self.discriminator_field.as_deref() == Some("") {
            return Err(invalid("discriminator_field must not be empty".to_string()));
        }
        if self.discriminator_field.is_none() && !self.discriminator_values.is_empty() {
            return Err(invalid(
                "discriminator_values given without discriminator_field".to_string(),
            ));
        }

        Ok(())
    }
}

/// On-disk registry layout, version 0
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFileV0 {
    schema_version: u32,
    entity_types: Vec<EntityTypeConfig>,
}

/// Validated set of entity-type entries keyed by entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeRegistry {
    entries: BTreeMap<String, EntityTypeConfig>,
}

impl EntityTypeRegistry {
    /// Build from entries, validating each one and rejecting duplicates.
    pub fn from_entries(
        entries: impl IntoIterator<Item = EntityTypeConfig>,
    ) -> Result<Self, InvDeltaError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            entry.validate()?;
            if map.contains_key(&entry.entity_type) {
                return Err(InvDeltaError::DuplicateEntityType {
                    entity_type: entry.entity_type,
                });
            }
            map.insert(entry.entity_type.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    /// Parse and validate a YAML registry document
    pub fn from_yaml_str(content: &str) -> Result<Self, InvDeltaError> {
        let file: RegistryFileV0 =
            serde_yaml::from_str(content).map_err(|e| InvDeltaError::RegistryParse {
                reason: format!("YAML parse error: {}", e),
            })?;

        if file.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(InvDeltaError::RegistryParse {
                reason: format!(
                    "Unsupported schema_version: {}. Expected {}",
                    file.schema_version, SUPPORTED_SCHEMA_VERSION
                ),
            });
        }

        Self::from_entries(file.entity_types)
    }

    /// Load a registry file. Re-reading the file is how a deployment reloads
    /// configuration; nothing is cached globally.
    pub fn from_file(path: &Path) -> Result<Self, InvDeltaError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| InvDeltaError::RegistryParse {
                reason: format!("Failed to read registry {}: {}", path.display(), e),
            })?;
        Self::from_yaml_str(&content)
    }

    /// The registry shipped with the crate
    pub fn builtin() -> Result<Self, InvDeltaError> {
        Self::from_yaml_str(DEFAULT_REGISTRY_YAML)
    }

    /// Look up a family.
    ///
    /// # Errors
    ///
    /// `UnknownEntityType` when the family is not declared; callers treat it
    /// as a configuration error and do not retry.
    pub fn get(&self, entity_type: &str) -> Result<&EntityTypeConfig, InvDeltaError> {
        self.entries
            .get(entity_type)
            .ok_or_else(|| InvDeltaError::UnknownEntityType {
                entity_type: entity_type.to_string(),
            })
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.entries.contains_key(entity_type)
    }

    /// Declared entity types in sorted order
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &EntityTypeConfig> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
