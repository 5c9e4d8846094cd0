//! Artifact publisher.
//!
//! ## Staged mode (default)
//!
//! 1. Recover: delete a stale `<public>.staging`; if `<public>` is gone but
//!    `<public>.previous` exists, an earlier swap was interrupted, so rename
//!    it back.
//! 2. Copy the build output into `<public>.staging` and write the config.
//! 3. Swap: `<public>` → `<public>.previous`, staging → `<public>`.
//! 4. Delete `<public>.previous`.
//!
//! Until step 3 the published directory is untouched, so every earlier
//! failure leaves the previous publish intact.
//!
//! ## In-place mode
//!
//! Delete `<public>` when non-empty, copy into it, write the config. A
//! failure midway leaves a partial directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use autobuild_core::config::SETTINGS_DIR;
use autobuild_core::{fs_ops, PublishMode};

use crate::error::{io_err, PublishError};
use crate::payload::ConfigPayload;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What a successful publish produced.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub mode: PublishMode,
    pub files: u64,
    pub bytes: u64,
    pub public_dir: PathBuf,
    pub config_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Sibling paths
// ---------------------------------------------------------------------------

/// `<public>.staging`
pub fn staging_path(public_dir: &Path) -> PathBuf {
    sibling(public_dir, "staging")
}

/// `<public>.previous`
pub fn previous_path(public_dir: &Path) -> PathBuf {
    sibling(public_dir, "previous")
}

fn sibling(public_dir: &Path, suffix: &str) -> PathBuf {
    let mut name = public_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    public_dir.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Publisher {
    mode: PublishMode,
    config_file_name: String,
}

impl Publisher {
    pub fn new(mode: PublishMode, config_file_name: impl Into<String>) -> Self {
        Self {
            mode,
            config_file_name: config_file_name.into(),
        }
    }

    pub fn mode(&self) -> PublishMode {
        self.mode
    }

    /// `<dir>/Settings/<config file name>`
    pub fn config_path(&self, dir: &Path) -> PathBuf {
        dir.join(SETTINGS_DIR).join(&self.config_file_name)
    }

    /// Replace the contents of `public_dir` with `build_output` plus one
    /// generated config file.
    ///
    /// The payload is resolved before anything on disk changes.
    pub fn publish(
        &self,
        build_output: &Path,
        public_dir: &Path,
        payload: &ConfigPayload,
    ) -> Result<PublishReport, PublishError> {
        if !fs_ops::is_non_empty_dir(build_output)? {
            return Err(PublishError::MissingBuildOutput {
                path: build_output.to_path_buf(),
            });
        }
        let config = payload.resolve()?;

        tracing::info!(
            mode = %self.mode,
            from = %build_output.display(),
            to = %public_dir.display(),
            "publishing",
        );
        let report = match self.mode {
            PublishMode::Staged => self.publish_staged(build_output, public_dir, &config)?,
            PublishMode::InPlace => self.publish_in_place(build_output, public_dir, &config)?,
        };
        tracing::info!(
            files = report.files,
            bytes = report.bytes,
            config = %report.config_path.display(),
            "published",
        );
        Ok(report)
    }

    /// Rewrite only the config file inside an existing publish.
    pub fn refresh_config(
        &self,
        public_dir: &Path,
        payload: &ConfigPayload,
    ) -> Result<PathBuf, PublishError> {
        recover(public_dir)?;
        if !fs_ops::is_non_empty_dir(public_dir)? {
            return Err(PublishError::NotPublished {
                path: public_dir.to_path_buf(),
            });
        }
        let config = payload.resolve()?;
        let path = self.write_config(public_dir, &config)?;
        tracing::info!(config = %path.display(), "config refreshed");
        Ok(path)
    }

    fn publish_staged(
        &self,
        build_output: &Path,
        public_dir: &Path,
        config: &str,
    ) -> Result<PublishReport, PublishError> {
        recover(public_dir)?;

        let staging = staging_path(public_dir);
        let stats = fs_ops::copy_tree(build_output, &staging)?;
        self.write_config(&staging, config)?;

        swap(&staging, public_dir)?;
        Ok(PublishReport {
            mode: PublishMode::Staged,
            files: stats.files,
            bytes: stats.bytes,
            public_dir: public_dir.to_path_buf(),
            config_path: self.config_path(public_dir),
        })
    }

    fn publish_in_place(
        &self,
        build_output: &Path,
        public_dir: &Path,
        config: &str,
    ) -> Result<PublishReport, PublishError> {
        if fs_ops::is_non_empty_dir(public_dir)? {
            tracing::info!(path = %public_dir.display(), "clearing previous publish");
            fs_ops::delete_tree(public_dir)?;
        }
        let stats = fs_ops::copy_tree(build_output, public_dir)?;
        let config_path = self.write_config(public_dir, config)?;
        Ok(PublishReport {
            mode: PublishMode::InPlace,
            files: stats.files,
            bytes: stats.bytes,
            public_dir: public_dir.to_path_buf(),
            config_path,
        })
    }

    /// Write `<dir>/Settings/<name>` through `<dir>.<name>.tmp` and rename.
    /// The temporary file sits beside `dir`, never inside the copied tree.
    /// Any config file the build output shipped under that name is replaced.
    fn write_config(&self, dir: &Path, config: &str) -> Result<PathBuf, PublishError> {
        let settings_dir = dir.join(SETTINGS_DIR);
        fs::create_dir_all(&settings_dir).map_err(|e| io_err(&settings_dir, e))?;

        let path = self.config_path(dir);
        let tmp = sibling(dir, &format!("{}.tmp", self.config_file_name));
        fs::write(&tmp, config).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Staging recovery and swap
// ---------------------------------------------------------------------------

/// Clean up after an interrupted staged publish.
pub fn recover(public_dir: &Path) -> Result<(), PublishError> {
    let staging = staging_path(public_dir);
    if staging.exists() {
        tracing::warn!(path = %staging.display(), "removing leftover staging directory");
        fs_ops::delete_tree(&staging)?;
    }

    let previous = previous_path(public_dir);
    if !previous.exists() {
        return Ok(());
    }
    if public_dir.exists() {
        tracing::warn!(path = %previous.display(), "removing leftover previous publish");
        fs_ops::delete_tree(&previous)?;
    } else {
        tracing::warn!(
            path = %public_dir.display(),
            "restoring previous publish after interrupted swap",
        );
        fs::rename(&previous, public_dir).map_err(|e| io_err(public_dir, e))?;
    }
    Ok(())
}

fn swap(staging: &Path, public_dir: &Path) -> Result<(), PublishError> {
    let previous = previous_path(public_dir);
    let had_previous = public_dir.exists();
    if had_previous {
        fs::rename(public_dir, &previous).map_err(|e| io_err(public_dir, e))?;
    }

    if let Err(err) = fs::rename(staging, public_dir) {
        if had_previous {
            if let Err(restore) = fs::rename(&previous, public_dir) {
                tracing::error!(
                    path = %previous.display(),
                    error = %restore,
                    "could not restore previous publish",
                );
            }
        }
        return Err(io_err(public_dir, err));
    }

    if had_previous {
        discard_previous(&previous);
    }
    Ok(())
}

/// Remove `<public>.previous` once the new publish is live. A failure is
/// only logged: the swap already happened and [`recover`] removes the
/// leftover on the next run.
fn discard_previous(previous: &Path) -> bool {
    match fs_ops::delete_tree(previous) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                path = %previous.display(),
                error = %err,
                "could not remove previous publish",
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_paths_keep_spaces() {
        let public = Path::new("/srv/Compiled GameServer");
        assert_eq!(
            staging_path(public),
            PathBuf::from("/srv/Compiled GameServer.staging")
        );
        assert_eq!(
            previous_path(public),
            PathBuf::from("/srv/Compiled GameServer.previous")
        );
    }

    #[test]
    fn undeletable_previous_publish_is_reported_not_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        assert!(!discard_previous(&blocker.join("public.previous")));

        let previous = tmp.path().join("public.previous");
        fs::create_dir_all(previous.join("Settings")).unwrap();
        fs::write(previous.join("a.dll"), "old").unwrap();
        assert!(discard_previous(&previous));
        assert!(!previous.exists());
    }

    #[test]
    fn config_path_is_under_settings() {
        let publisher = Publisher::new(PublishMode::Staged, "GameInfo.json");
        assert_eq!(
            publisher.config_path(Path::new("/p")),
            PathBuf::from("/p/Settings/GameInfo.json")
        );
    }
}
