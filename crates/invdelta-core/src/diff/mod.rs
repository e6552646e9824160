//! Delta reconciliation.
//!
//! Compares a freshly loaded snapshot against the persisted current state of
//! the same family and decides, per entity, what has to be written and what
//! has to be recorded in the audit trail.
//!
//! ## Entry point
//!
//! ```ignore
//! use invdelta_core::diff::reconcile;
//!
//! let outcome = reconcile(&loaded.records, &existing, config, &run);
//! ```
//!
//! ## Guarantees
//!
//! - **Determinism**: identical inputs produce byte-identical serialized output.
//!   Change record ids and timestamps derive from the run, never the clock.
//! - **Minimal writes**: Unchanged entities produce no change record and no write.
//! - **Compare-field scoping**: only the family's compare fields decide
//!   Modified vs Unchanged.
//! - **No physical deletes**: Deleted entities are tombstoned.

pub mod engine;
pub mod human_summary;
pub mod model;

pub use engine::{compare_fields, project, reconcile};
pub use human_summary::render_human_summary;
pub use model::{Classification, ReconcileOutcome, ReconcileStats};
