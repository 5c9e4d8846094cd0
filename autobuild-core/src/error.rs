//! Error types for autobuild-core.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while turning defaults, a config file and
/// CLI flags into a [`crate::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The literal config payload is not a JSON document.
    #[error("config payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// A field failed validation after merging.
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown build configuration '{0}'; expected: release, debug")]
    UnknownConfiguration(String),

    #[error("unknown publish mode '{0}'; expected: staged, in-place")]
    UnknownPublishMode(String),
}

/// Failure of one of the recursive filesystem primitives in [`crate::fs_ops`].
#[derive(Debug, Error)]
pub enum FsError {
    #[error("{op} failed at {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `copy_tree` refuses to overwrite an existing destination file.
    #[error("destination already exists: {path}")]
    Collision { path: PathBuf },

    #[error("walk failed under {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn fs_err(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> FsError {
    FsError::Io {
        op,
        path: path.into(),
        source,
    }
}
