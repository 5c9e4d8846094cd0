//! The version-control operations the pipeline consumes.

use std::path::Path;

use autobuild_core::{BranchName, Fingerprint};

use crate::error::VcsError;

/// Backend seam for every repository read and write.
///
/// [`crate::GitCli`] is the production implementation; tests substitute an
/// in-memory remote.
pub trait Vcs {
    /// Full clone of `url` at `branch` into `dest` (which must not exist).
    fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        branch: &BranchName,
        recurse_submodules: bool,
    ) -> Result<(), VcsError>;

    /// `true` iff `path` is the root of an initialized repository.
    fn is_valid_checkout(&self, path: &Path) -> bool;

    /// URL of the `origin` remote, `None` if no such remote is configured.
    fn origin_url(&self, path: &Path) -> Result<Option<String>, VcsError>;

    fn fetch(&self, path: &Path, remote: &str) -> Result<(), VcsError>;

    /// Force-checkout `reference` (detached), discarding local changes.
    fn checkout(&self, path: &Path, reference: &str) -> Result<(), VcsError>;

    /// Bring nested repositories in line with the checked-out commit.
    fn update_submodules(&self, path: &Path) -> Result<(), VcsError>;

    /// Tip of the local `HEAD`; reads local metadata only.
    fn head_fingerprint(&self, path: &Path) -> Result<Fingerprint, VcsError>;

    /// Branch names advertised by the remote.
    fn list_remote_branches(&self, url: &str) -> Result<Vec<String>, VcsError>;
}
