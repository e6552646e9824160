//! Core types shared across InvDelta facilities
//!
//! - **Correlation**: `RunId`
//! - **Schema constants**: canonical structured-logging field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::RunId;
