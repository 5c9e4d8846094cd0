//! Build trigger: restore, then build, then verify the output tree.
//!
//! The two steps are strictly sequential. A failed restore means the build
//! step is never started. The output directory is cleared first, so a
//! non-empty output after the build was written by this build.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use autobuild_core::{fs_ops, BuildDescriptor};

use crate::backend::{BuildBackend, BuildStep, StepExit};
use crate::error::BuildError;

/// Timings and location of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub restore_ms: u64,
    pub build_ms: u64,
    pub output_dir: PathBuf,
}

/// Clear `output_dir`, restore and build `descriptor`, then require
/// `output_dir` to be a non-empty directory.
pub fn run(
    backend: &dyn BuildBackend,
    descriptor: &BuildDescriptor,
    output_dir: &Path,
) -> Result<BuildReport, BuildError> {
    if !descriptor.solution.is_file() {
        return Err(BuildError::MissingManifest {
            path: descriptor.solution.clone(),
        });
    }

    if output_dir.exists() {
        tracing::info!(output = %output_dir.display(), "clearing previous build output");
        fs_ops::delete_tree(output_dir)?;
    }

    tracing::info!(
        solution = %descriptor.solution.display(),
        configuration = %descriptor.configuration,
        "restoring packages",
    );
    let started = Instant::now();
    check(BuildStep::Restore, backend.restore(descriptor)?)?;
    let restore_ms = elapsed_ms(started);

    tracing::info!(configuration = %descriptor.configuration, "building");
    let started = Instant::now();
    check(BuildStep::Build, backend.build(descriptor)?)?;
    let build_ms = elapsed_ms(started);

    if !fs_ops::is_non_empty_dir(output_dir)? {
        return Err(BuildError::EmptyOutput {
            path: output_dir.to_path_buf(),
        });
    }

    tracing::info!(
        output = %output_dir.display(),
        restore_ms,
        build_ms,
        "build succeeded",
    );
    Ok(BuildReport {
        restore_ms,
        build_ms,
        output_dir: output_dir.to_path_buf(),
    })
}

fn check(step: BuildStep, exit: StepExit) -> Result<(), BuildError> {
    if exit.success() {
        Ok(())
    } else {
        Err(BuildError::StepFailed {
            step,
            code: exit.code,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
