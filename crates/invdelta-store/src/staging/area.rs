#![allow(clippy::result_large_err)]

use crate::errors::{
    from_serde_json, invalid_family_name, io_error, staged_snapshot_missing,
    staged_snapshot_unreadable, Result,
};
use crate::staging::atomic::atomic_write;
use invdelta_core::loader::{load_snapshot, LoadedSnapshot};
use invdelta_core::{EntityTypeConfig, SnapshotId};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

const SNAPSHOT_EXTENSION: &str = "jsonl";

/// Root directory of staged snapshots
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, snapshot_id: &SnapshotId) -> PathBuf {
        self.root.join(snapshot_id.as_str())
    }

    /// `{root}/{ts}/{ts}-{family}.jsonl`
    pub fn snapshot_path(&self, snapshot_id: &SnapshotId, entity_type: &str) -> PathBuf {
        self.run_dir(snapshot_id).join(format!(
            "{}-{}.{}",
            snapshot_id.as_str(),
            entity_type,
            SNAPSHOT_EXTENSION
        ))
    }

    /// Runs present under the root, oldest first. Entries that are not
    /// run timestamps are ignored.
    pub fn list_runs(&self) -> Result<Vec<SnapshotId>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list_runs", e)),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("list_runs", e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| SnapshotId::parse(name).ok())
            {
                runs.push(id);
            }
        }
        runs.sort();
        Ok(runs)
    }

    /// Most recent staged run, if any
    pub fn latest_run(&self) -> Result<Option<SnapshotId>> {
        Ok(self.list_runs()?.pop())
    }

    /// Families with a staged file for this run, sorted
    pub fn staged_families(&self, snapshot_id: &SnapshotId) -> Result<Vec<String>> {
        let dir = self.run_dir(snapshot_id);
        let entries = fs::read_dir(&dir).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                staged_snapshot_missing(&dir)
            } else {
                staged_snapshot_unreadable(&dir, e)
            }
        })?;

        let prefix = format!("{}-", snapshot_id.as_str());
        let suffix = format!(".{}", SNAPSHOT_EXTENSION);
        let mut families = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| staged_snapshot_unreadable(&dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(family) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
            {
                if !family.is_empty() {
                    families.push(family.to_string());
                }
            }
        }
        families.sort();
        Ok(families)
    }

    /// Open the staged file of one family.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing was staged; `TransientIo` when the file exists
    /// but cannot be opened.
    pub fn open_snapshot(
        &self,
        snapshot_id: &SnapshotId,
        entity_type: &str,
    ) -> Result<BufReader<File>> {
        let path = self.snapshot_path(snapshot_id, entity_type);
        match File::open(&path) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(staged_snapshot_missing(&path)),
            Err(e) => Err(staged_snapshot_unreadable(&path, e)),
        }
    }

    /// Open and parse the staged file of one family
    pub fn load(
        &self,
        snapshot_id: &SnapshotId,
        config: &EntityTypeConfig,
    ) -> Result<LoadedSnapshot> {
        let reader = self.open_snapshot(snapshot_id, &config.entity_type)?;
        load_snapshot(reader, config).map_err(|e| e.with_snapshot_id(snapshot_id.as_str()))
    }

    /// Write records as one JSONL file, atomically. Returns the file path.
    pub fn stage_records(
        &self,
        snapshot_id: &SnapshotId,
        entity_type: &str,
        records: &[Value],
    ) -> Result<PathBuf> {
        let mut content = String::new();
        for record in records {
            let line =
                serde_json::to_string(record).map_err(|e| from_serde_json("stage_records", e))?;
            content.push_str(&line);
            content.push('\n');
        }
        self.stage_bytes(snapshot_id, entity_type, content.as_bytes())
    }

    /// Write an already-serialized JSONL batch, atomically
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the family name would not round-trip through
    /// [`StagingArea::staged_families`].
    pub fn stage_bytes(
        &self,
        snapshot_id: &SnapshotId,
        entity_type: &str,
        content: &[u8],
    ) -> Result<PathBuf> {
        if !is_valid_family_name(entity_type) {
            return Err(invalid_family_name(entity_type));
        }
        let path = self.snapshot_path(snapshot_id, entity_type);
        atomic_write(&path, content)?;
        tracing::debug!(
            entity_type,
            snapshot_id = %snapshot_id,
            bytes = content.len(),
            path = %path.display(),
            "snapshot staged"
        );
        Ok(path)
    }
}

fn is_valid_family_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use invdelta_core::ExErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn sid(raw: &str) -> SnapshotId {
        SnapshotId::parse(raw).unwrap()
    }

    #[test]
    fn test_path_convention() {
        let area = StagingArea::new("/staging");
        let path = area.snapshot_path(&sid("2025-06-01T04-00-00Z"), "principals");
        assert_eq!(
            path,
            PathBuf::from("/staging/2025-06-01T04-00-00Z/2025-06-01T04-00-00Z-principals.jsonl")
        );
    }

    #[test]
    fn test_stage_then_list_and_load() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::new(dir.path());
        let run = sid("2025-06-01T04-00-00Z");

        area.stage_records(&run, "edges", &[json!({"id": "e1", "status": "on"})])
            .unwrap();
        area.stage_records(&run, "principals", &[]).unwrap();

        assert_eq!(area.staged_families(&run).unwrap(), vec!["edges", "principals"]);
        assert_eq!(area.list_runs().unwrap(), vec![run.clone()]);

        let cfg = EntityTypeConfig::new("edges", "id", &["status"]);
        let loaded = area.load(&run, &cfg).unwrap();
        assert!(loaded.records.contains_key("e1"));
    }

    #[test]
    fn test_missing_snapshot_is_not_found() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::new(dir.path());
        let err = area
            .open_snapshot(&sid("2025-06-01T04-00-00Z"), "edges")
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_list_runs_ignores_foreign_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("scratch")).unwrap();
        fs::create_dir_all(dir.path().join("2025-06-02T00-00-00Z")).unwrap();
        fs::create_dir_all(dir.path().join("2025-06-01T00-00-00Z")).unwrap();

        let area = StagingArea::new(dir.path());
        assert_eq!(
            area.list_runs().unwrap(),
            vec![sid("2025-06-01T00-00-00Z"), sid("2025-06-02T00-00-00Z")]
        );
        assert_eq!(area.latest_run().unwrap(), Some(sid("2025-06-02T00-00-00Z")));
    }

    #[test]
    fn test_unsafe_family_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::new(dir.path());
        let run = sid("2025-06-01T04-00-00Z");

        for name in ["", "../escape", "a/b", "with space", "dotted.name"] {
            let err = area.stage_bytes(&run, name, b"{}\n").unwrap_err();
            assert_eq!(err.kind(), ExErrorKind::InvalidInput, "{name:?}");
            assert!(!err.is_retryable());
        }
        assert!(area.list_runs().unwrap().is_empty());
        area.stage_bytes(&run, "role_assignments-v2", b"").unwrap();
    }
}
