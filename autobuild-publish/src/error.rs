//! Error types for autobuild-publish.

use std::path::PathBuf;

use thiserror::Error;

use autobuild_core::FsError;

/// All errors that can arise while publishing an artifact.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The build output to publish is missing or empty.
    #[error("no build output to publish at {path}")]
    MissingBuildOutput { path: PathBuf },

    /// The config template could not be read.
    #[error("config template unreadable at {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config-only refresh found nothing published to refresh.
    #[error("nothing published at {path}; cannot refresh config")]
    NotPublished { path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Convenience constructor for [`PublishError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.into(),
        source,
    }
}
