//! Atomic write primitives
//!
//! Uses temp→rename pattern to ensure no partial writes

#![allow(clippy::result_large_err)]

use crate::errors::{io_error, Result};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically write bytes to a file
///
/// The temp file sits next to the target so the rename never crosses
/// filesystems.
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_staging_dir", e))?;
    }

    let temp_path = temp_path_for(target_path);

    let mut file = fs::File::create(&temp_path).map_err(|e| io_error("create_staging_temp", e))?;
    file.write_all(content)
        .map_err(|e| io_error("write_staging_temp", e))?;
    file.sync_all()
        .map_err(|e| io_error("sync_staging_temp", e))?;
    drop(file);

    fs::rename(&temp_path, target_path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        io_error("rename_staging_temp", e)
    })?;

    Ok(())
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
