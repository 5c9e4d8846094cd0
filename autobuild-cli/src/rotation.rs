//! Size-based rotation for the `--log-file` target.
//!
//! Checked once per run, before the file is opened:
//!   autobuild.log → autobuild.log.1 → … → autobuild.log.5

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotate once the log reaches this size (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated copies kept; the oldest beyond this is deleted.
pub const MAX_ROTATED_FILES: usize = 5;

/// Shift `log_path` to `<name>.1` when it is at least `max_bytes` long.
///
/// Returns `true` if a rotation happened. A missing log is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, keep: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes || keep == 0 {
        return Ok(false);
    }

    let oldest = numbered(log_path, keep);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..keep).rev() {
        let from = numbered(log_path, n);
        if from.exists() {
            fs::rename(&from, numbered(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered(log_path, 1))?;
    Ok(true)
}

fn numbered(base: &Path, n: usize) -> PathBuf {
    let mut name = base.file_name().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(format!(".{n}"));
    base.with_file_name(name)
}
