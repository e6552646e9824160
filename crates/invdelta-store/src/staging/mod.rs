//! Staged snapshot files
//!
//! Layout: `{root}/{runTimestamp}/{runTimestamp}-{family}.jsonl`, one JSON
//! object per line. Files are written atomically (temp + rename) so a reader
//! never observes a half-written snapshot.

mod area;
mod atomic;

pub use area::StagingArea;
pub use atomic::atomic_write;
