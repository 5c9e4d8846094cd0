//! Error types for autobuild-pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use autobuild_builder::BuildError;
use autobuild_core::ConfigError;
use autobuild_publish::PublishError;
use autobuild_vcs::VcsError;

/// The single terminal error of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("synchronization failed: {0}")]
    Vcs(#[from] VcsError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// The run-state record exists but cannot be decoded.
    #[error("run-state record at {path} is unreadable (delete it to reset): {source}")]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse failure category, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Configuration,
    Synchronization,
    Build,
    Publish,
    State,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Synchronization => "synchronization",
            ErrorKind::Build => "build",
            ErrorKind::Publish => "publish",
            ErrorKind::State => "state",
        };
        f.write_str(label)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::Configuration,
            PipelineError::Vcs(_) => ErrorKind::Synchronization,
            PipelineError::Build(_) => ErrorKind::Build,
            PipelineError::Publish(_) => ErrorKind::Publish,
            PipelineError::State { .. } | PipelineError::Io { .. } => ErrorKind::State,
        }
    }
}

/// Convenience constructor for [`PipelineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.into(),
        source,
    }
}
