//! Canonical schema constants for structured logging
//!
//! Every log line emitted by the logging macros uses these keys so that
//! downstream log queries do not depend on call-site spelling.

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_RUN_ID: &str = "run_id";

// Entity identifiers
pub const FIELD_ENTITY_TYPE: &str = "entity_type";
pub const FIELD_ENTITY_ID: &str = "entity_id";
pub const FIELD_SNAPSHOT_ID: &str = "snapshot_id";

// Reconciliation counters
pub const FIELD_TOTAL: &str = "total";
pub const FIELD_NEW: &str = "new";
pub const FIELD_MODIFIED: &str = "modified";
pub const FIELD_UNCHANGED: &str = "unchanged";
pub const FIELD_DELETED: &str = "deleted";
pub const FIELD_RESTORED: &str = "restored";
pub const FIELD_WRITES: &str = "writes";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
