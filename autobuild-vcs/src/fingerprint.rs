//! Fingerprint resolver.
//!
//! Reads only local metadata, so the result reflects the last *fetched*
//! state of the working copy, not the remote's true tip.

use std::path::Path;

use autobuild_core::Fingerprint;

use crate::backend::Vcs;

/// Fingerprint of the working copy at `path`, or `None` when the path is
/// missing, not a checkout, or has no readable tip.
pub fn resolve(vcs: &dyn Vcs, path: &Path) -> Option<Fingerprint> {
    if !path.exists() || !vcs.is_valid_checkout(path) {
        return None;
    }
    match vcs.head_fingerprint(path) {
        Ok(fingerprint) => Some(fingerprint),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not read head commit");
            None
        }
    }
}
