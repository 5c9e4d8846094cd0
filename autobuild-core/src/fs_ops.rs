//! Recursive filesystem primitives.
//!
//! Guarantees:
//! - [`delete_tree`] clears read-only bits before removing, succeeds on a
//!   missing path, and on failure leaves whatever it could not remove in
//!   place (callers detect that with [`is_non_empty_dir`] and retry).
//! - [`copy_tree`] never overwrites: an existing destination file is a
//!   [`FsError::Collision`] and the copy stops there.
//! - Neither is atomic. Atomic replacement is built on top of them by
//!   staging into a sibling directory and renaming (see `autobuild-publish`).

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{fs_err, FsError};

/// Totals reported by [`copy_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub bytes: u64,
}

/// Remove `path` and everything below it.
pub fn delete_tree(path: &Path) -> Result<(), FsError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(fs_err("stat", path, err)),
    };

    if !meta.is_dir() {
        make_writable(path, &meta)?;
        return fs::remove_file(path).map_err(|e| fs_err("remove file", path, e));
    }

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|source| FsError::Walk {
            root: path.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_symlink() {
            continue;
        }
        let meta = entry.metadata().map_err(|source| FsError::Walk {
            root: path.to_path_buf(),
            source,
        })?;
        make_writable(entry.path(), &meta)?;
    }

    fs::remove_dir_all(path).map_err(|e| fs_err("remove tree", path, e))
}

/// Copy the tree under `src` into `dst`, creating `dst` if needed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopyStats, FsError> {
    let src_meta = fs::metadata(src).map_err(|e| fs_err("stat", src, e))?;
    if !src_meta.is_dir() {
        return Err(fs_err(
            "copy tree",
            src,
            io::Error::new(ErrorKind::InvalidInput, "source is not a directory"),
        ));
    }

    fs::create_dir_all(dst).map_err(|e| fs_err("create dir", dst, e))?;

    let mut stats = CopyStats::default();
    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|source| FsError::Walk {
            root: src.to_path_buf(),
            source,
        })?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let out = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&out).map_err(|e| fs_err("create dir", &out, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &out)?;
        } else if file_type.is_file() {
            stats.bytes += copy_file_new(entry.path(), &out)?;
            stats.files += 1;
        }
    }

    Ok(stats)
}

/// `true` if `path` is a directory with at least one entry.
///
/// A missing path or a non-directory is reported as `false`.
pub fn is_non_empty_dir(path: &Path) -> Result<bool, FsError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(false),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(fs_err("stat", path, err)),
    }
    let mut entries = fs::read_dir(path).map_err(|e| fs_err("read dir", path, e))?;
    Ok(entries.next().is_some())
}

fn copy_file_new(src: &Path, dst: &Path) -> Result<u64, FsError> {
    let mut reader = fs::File::open(src).map_err(|e| fs_err("open", src, e))?;
    let mut writer = match fs::OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(FsError::Collision {
                path: dst.to_path_buf(),
            })
        }
        Err(err) => return Err(fs_err("create file", dst, err)),
    };
    let bytes = io::copy(&mut reader, &mut writer).map_err(|e| fs_err("copy", dst, e))?;
    let perms = reader
        .metadata()
        .map_err(|e| fs_err("stat", src, e))?
        .permissions();
    fs::set_permissions(dst, perms).map_err(|e| fs_err("set permissions", dst, e))?;
    Ok(bytes)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), FsError> {
    let target = fs::read_link(src).map_err(|e| fs_err("read link", src, e))?;
    match std::os::unix::fs::symlink(target, dst) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(FsError::Collision {
            path: dst.to_path_buf(),
        }),
        Err(err) => Err(fs_err("symlink", dst, err)),
    }
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), FsError> {
    // Build outputs do not rely on links; copy the target contents instead.
    if fs::metadata(src).map(|m| m.is_file()).unwrap_or(false) {
        copy_file_new(src, dst)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_writable(path: &Path, meta: &fs::Metadata) -> Result<(), FsError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = meta.permissions().mode();
    if mode & 0o200 != 0 {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o200))
        .map_err(|e| fs_err("clear read-only", path, e))
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path, meta: &fs::Metadata) -> Result<(), FsError> {
    let mut perms = meta.permissions();
    if !perms.readonly() {
        return Ok(());
    }
    perms.set_readonly(false);
    fs::set_permissions(path, perms).map_err(|e| fs_err("clear read-only", path, e))
}
