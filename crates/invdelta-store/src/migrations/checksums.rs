//! Checksum validation for migrations
//!
//! Detects edits to a migration after it has been applied somewhere

use sha2::{Digest, Sha256};

/// SHA256 of the migration SQL, hex encoded
pub fn compute_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
