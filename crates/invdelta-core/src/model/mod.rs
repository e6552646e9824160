//! Data model for reconciliation
//!
//! Entity records are attribute bags rather than per-family structs; the
//! registry decides which attributes matter for each family.

pub mod change;
pub mod record;
pub mod run;
pub mod summary;

pub use change::{change_record_id, ChangeCounts, ChangeRecord, ChangeType, FieldDelta};
pub use record::{Attributes, Document, EntityRecord, ExistingState};
pub use run::{RunContext, SnapshotId, SNAPSHOT_ID_FORMAT};
pub use summary::{IndexingResult, SnapshotSummary};
