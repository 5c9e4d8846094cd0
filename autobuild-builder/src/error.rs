//! Error types for autobuild-builder.

use std::path::PathBuf;

use thiserror::Error;

use autobuild_core::FsError;

use crate::backend::BuildStep;

/// All errors that can arise while restoring and building.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build manifest not found at {path}")]
    MissingManifest { path: PathBuf },

    /// The tool for a step could not be started.
    #[error("failed to start {step} tool `{program}`: {source}")]
    Spawn {
        step: BuildStep,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {step} process: {source}")]
    Wait {
        step: BuildStep,
        #[source]
        source: std::io::Error,
    },

    /// A step exited non-zero (or was killed).
    #[error("{step} step failed ({})", describe_exit(*.code))]
    StepFailed { step: BuildStep, code: Option<i32> },

    /// Both steps passed but the output tree is missing or empty.
    #[error("build produced no output at {path}")]
    EmptyOutput { path: PathBuf },

    #[error("build output check failed: {0}")]
    Fs(#[from] FsError),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
