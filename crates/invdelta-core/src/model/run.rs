use crate::errors::InvDeltaError;
use invdelta_core_types::RunId;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Format of run timestamps, used both as snapshot id and in staged paths.
///
/// Colons are replaced by dashes so the value is a valid file name
/// everywhere. Lexicographic order equals chronological order.
pub const SNAPSHOT_ID_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

/// Identifier of one collection run (its UTC start time).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId {
    raw: String,
    at: DateTime<Utc>,
}

impl SnapshotId {
    /// Parse a run timestamp such as `2025-06-01T04-00-00Z`.
    pub fn parse(raw: &str) -> Result<Self, InvDeltaError> {
        let naive = NaiveDateTime::parse_from_str(raw, SNAPSHOT_ID_FORMAT).map_err(|e| {
            InvDeltaError::InvalidSnapshotId {
                snapshot_id: raw.to_string(),
                reason: format!("expected {}: {}", SNAPSHOT_ID_FORMAT, e),
            }
        })?;
        Ok(Self::from_datetime(Utc.from_utc_datetime(&naive)))
    }

    /// Build from a timestamp, truncated to whole seconds.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let at = at.with_nanosecond(0).unwrap_or(at);
        Self {
            raw: at.format(SNAPSHOT_ID_FORMAT).to_string(),
            at,
        }
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }

    /// RFC 3339 rendering of the run time, used as change timestamp
    pub fn rfc3339(&self) -> String {
        self.at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = InvDeltaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.raw
    }
}

/// Per-run inputs to the reconciler besides the two entity maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub snapshot_id: SnapshotId,
    pub delta_detection_enabled: bool,
    /// Shared by every family and attempt of one driver invocation
    pub run_id: RunId,
}

impl RunContext {
    pub fn new(snapshot_id: SnapshotId) -> Self {
        Self {
            snapshot_id,
            delta_detection_enabled: true,
            run_id: RunId::new(),
        }
    }

    /// Full-refresh mode: write everything, emit no change records
    pub fn full_refresh(snapshot_id: SnapshotId) -> Self {
        Self {
            delta_detection_enabled: false,
            ..Self::new(snapshot_id)
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        let id = SnapshotId::parse("2025-06-01T04-30-00Z").unwrap();
        assert_eq!(id.as_str(), "2025-06-01T04-30-00Z");
        assert_eq!(id.rfc3339(), "2025-06-01T04:30:00Z");
    }

    #[test]
    fn test_parse_rejects_colons() {
        let err = SnapshotId::parse("2025-06-01T04:30:00Z").unwrap_err();
        assert!(matches!(err, InvDeltaError::InvalidSnapshotId { .. }));
    }

    #[test]
    fn test_order_is_chronological() {
        let a = SnapshotId::parse("2025-06-01T04-30-00Z").unwrap();
        let b = SnapshotId::parse("2025-06-02T00-00-00Z").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_from_datetime_truncates_subseconds() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(750);
        let id = SnapshotId::from_datetime(at);
        assert_eq!(id.as_str(), "2025-01-02T03-04-05Z");
        assert_eq!(id, SnapshotId::parse("2025-01-02T03-04-05Z").unwrap());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = SnapshotId::parse("2025-06-01T04-30-00Z").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"2025-06-01T04-30-00Z\"");
        let bad: Result<SnapshotId, _> = serde_json::from_str("\"yesterday\"");
        assert!(bad.is_err());
    }
}
