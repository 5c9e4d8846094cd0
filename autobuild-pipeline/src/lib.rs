//! # autobuild-pipeline
//!
//! Wires the VCS, build and publish components into one run. The
//! [`orchestrator`] holds the state machine; [`state`] persists which tip
//! was last published.

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::{ErrorKind, PipelineError};
pub use orchestrator::{Orchestrator, RebuildReason, RunReport, Stage};

use autobuild_builder::ProcessBackend;
use autobuild_core::Settings;
use autobuild_vcs::{GitCli, HttpProbe, Vcs};

/// Run the pipeline once with the production backends: the `git` CLI, the
/// configured restore/build commands and, when `remote_api` is set, the
/// HTTP commit probe.
pub fn run(settings: &Settings) -> Result<RunReport, PipelineError> {
    let vcs = GitCli::new();
    let builder = ProcessBackend::from_settings(settings);
    let probe = settings.remote_api.as_deref().map(|url| HttpProbe::new(url));

    let mut orchestrator = Orchestrator::new(settings, &vcs, &builder);
    if let Some(probe) = &probe {
        orchestrator = orchestrator.with_probe(probe);
    }
    orchestrator.run()
}

/// Branch names on the configured remote, sorted.
pub fn list_branches(settings: &Settings) -> Result<Vec<String>, PipelineError> {
    Ok(GitCli::new().list_remote_branches(&settings.repository)?)
}
