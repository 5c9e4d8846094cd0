//! Repository synchronizer: clone vs. fetch vs. skip.
//!
//! 1. Absent or foreign working copy → delete whatever is there, full clone.
//! 2. Valid working copy → fetch `origin`, force-checkout `origin/<branch>`.
//!    The checkout never merges, so local drift cannot block or mask an update.
//! 3. Valid working copy + configured probe that matches → no VCS traffic.
//!
//! Errors propagate untouched; the caller must not build or publish after one.

use std::path::Path;

use serde::Serialize;

use autobuild_core::{fs_ops, BranchName, Fingerprint};

use crate::backend::Vcs;
use crate::error::VcsError;
use crate::remote::{probe, ProbeOutcome, RemoteProbe};

pub const ORIGIN: &str = "origin";

/// What is on disk at the working-copy path before synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    Absent,
    /// Something is there, but not a checkout of the expected repository.
    Foreign { reason: String },
    Valid,
}

impl CheckoutState {
    pub fn is_valid(&self) -> bool {
        matches!(self, CheckoutState::Valid)
    }
}

/// How synchronization was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Cloned,
    Fetched,
    Skipped,
}

/// Desired repository, branch and local path.
#[derive(Debug, Clone, Copy)]
pub struct SyncTarget<'a> {
    pub url: &'a str,
    pub branch: &'a BranchName,
    pub path: &'a Path,
    pub recurse_submodules: bool,
}

/// Classify the working-copy path.
pub fn inspect(vcs: &dyn Vcs, path: &Path, expected_url: &str) -> Result<CheckoutState, VcsError> {
    if !path.exists() {
        return Ok(CheckoutState::Absent);
    }
    if !vcs.is_valid_checkout(path) {
        return Ok(CheckoutState::Foreign {
            reason: "not a repository".to_string(),
        });
    }
    match vcs.origin_url(path)? {
        Some(url) if urls_match(&url, expected_url) => Ok(CheckoutState::Valid),
        Some(url) => Ok(CheckoutState::Foreign {
            reason: format!("origin is {url}"),
        }),
        None => Ok(CheckoutState::Foreign {
            reason: "no origin remote".to_string(),
        }),
    }
}

/// Compare remote URLs ignoring a trailing `/` or `.git`.
pub fn urls_match(a: &str, b: &str) -> bool {
    fn normalize(url: &str) -> &str {
        let url = url.trim().trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url)
    }
    normalize(a) == normalize(b)
}

/// Executes the clone / fetch / skip decision.
pub struct Synchronizer<'a> {
    vcs: &'a dyn Vcs,
    probe: Option<&'a dyn RemoteProbe>,
}

impl<'a> Synchronizer<'a> {
    pub fn new(vcs: &'a dyn Vcs) -> Self {
        Self { vcs, probe: None }
    }

    /// Consult `probe` before fetching a valid working copy.
    pub fn with_probe(mut self, probe: &'a dyn RemoteProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Bring the working copy in line with the remote branch.
    ///
    /// `baseline` is the pre-sync fingerprint; it is only used by the probe.
    pub fn synchronize(
        &self,
        target: &SyncTarget<'_>,
        state: &CheckoutState,
        baseline: Option<&Fingerprint>,
    ) -> Result<SyncOutcome, VcsError> {
        match state {
            CheckoutState::Absent => {
                self.clone_fresh(target)?;
                Ok(SyncOutcome::Cloned)
            }
            CheckoutState::Foreign { reason } => {
                tracing::warn!(
                    path = %target.path.display(),
                    reason = %reason,
                    "replacing invalid working copy",
                );
                fs_ops::delete_tree(target.path)?;
                self.clone_fresh(target)?;
                Ok(SyncOutcome::Cloned)
            }
            CheckoutState::Valid => {
                if self.remote_unchanged(target.branch, baseline) {
                    return Ok(SyncOutcome::Skipped);
                }
                tracing::info!(path = %target.path.display(), "fetching {ORIGIN}");
                self.vcs.fetch(target.path, ORIGIN)?;
                let reference = target.branch.remote_ref(ORIGIN);
                self.vcs.checkout(target.path, &reference)?;
                if target.recurse_submodules {
                    self.vcs.update_submodules(target.path)?;
                }
                Ok(SyncOutcome::Fetched)
            }
        }
    }

    fn clone_fresh(&self, target: &SyncTarget<'_>) -> Result<(), VcsError> {
        if let Some(parent) = target.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| {
                VcsError::Fs(autobuild_core::FsError::Io {
                    op: "create dir",
                    path: parent.to_path_buf(),
                    source,
                })
            })?;
        }
        tracing::info!(
            url = %target.url,
            branch = %target.branch,
            path = %target.path.display(),
            "cloning repository",
        );
        self.vcs.clone_repo(
            target.url,
            target.path,
            target.branch,
            target.recurse_submodules,
        )
    }

    fn remote_unchanged(&self, branch: &BranchName, baseline: Option<&Fingerprint>) -> bool {
        let (Some(source), Some(local)) = (self.probe, baseline) else {
            return false;
        };
        match probe(source, branch, local) {
            ProbeOutcome::Matches => {
                tracing::info!(summary = %local.summary, "remote tip matches local; skipping fetch");
                true
            }
            ProbeOutcome::Differs { remote } => {
                tracing::info!(remote = %remote, "remote tip differs from local");
                false
            }
            ProbeOutcome::Unknown { reason } => {
                tracing::warn!(reason = %reason, "remote probe failed; assuming changed");
                false
            }
        }
    }
}
