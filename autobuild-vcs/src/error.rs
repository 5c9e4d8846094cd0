//! Error types for autobuild-vcs.

use std::path::PathBuf;

use thiserror::Error;

use autobuild_core::FsError;

/// All errors that can arise from version-control operations.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The VCS program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The VCS program ran and exited non-zero.
    #[error("`{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// The VCS program succeeded but printed something we cannot read.
    #[error("unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput { command: String, output: String },

    /// A synchronized working copy has no readable tip commit.
    #[error("working copy at {path} has no head commit")]
    NoHead { path: PathBuf },

    /// Removing an invalid working copy or creating its parent failed.
    #[error("working copy filesystem error: {0}")]
    Fs(#[from] FsError),
}
