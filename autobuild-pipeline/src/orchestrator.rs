//! The update-and-publish state machine.
//!
//! ```text
//! Start → {Invalid, Valid} → {Cloned, Fetched, Skipped}
//!       → {RebuildNeeded, UpToDate} → Built? → Published? | ConfigRefreshed? → Done
//! ```
//!
//! Any component error ends the run immediately. The run-state record is
//! written only after a publish has completed.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use autobuild_builder::{trigger, BuildBackend, BuildReport};
use autobuild_core::{fs_ops, Fingerprint, Settings};
use autobuild_publish::{ConfigPayload, PublishError, PublishReport, Publisher};
use autobuild_vcs::{
    fingerprint, sync, RemoteProbe, SyncOutcome, SyncTarget, Synchronizer, Vcs, VcsError,
};

use crate::error::PipelineError;
use crate::state::{self, RunState};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// States visited by a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Start,
    Invalid,
    Valid,
    Cloned,
    Fetched,
    Skipped,
    RebuildNeeded,
    UpToDate,
    Built,
    Published,
    ConfigRefreshed,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Start => "Start",
            Stage::Invalid => "Invalid",
            Stage::Valid => "Valid",
            Stage::Cloned => "Cloned",
            Stage::Fetched => "Fetched",
            Stage::Skipped => "Skipped",
            Stage::RebuildNeeded => "RebuildNeeded",
            Stage::UpToDate => "UpToDate",
            Stage::Built => "Built",
            Stage::Published => "Published",
            Stage::ConfigRefreshed => "ConfigRefreshed",
            Stage::Done => "Done",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Rebuild decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebuildReason {
    /// The working copy was (re)cloned this run.
    FreshClone,
    /// Synchronization moved the tip.
    FingerprintChanged,
    /// The last publish recorded a different tip (e.g. an earlier build failed).
    PublishBehind,
    /// No record and nothing in the publish directory.
    NeverPublished,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RebuildReason::FreshClone => "fresh clone",
            RebuildReason::FingerprintChanged => "fingerprint changed",
            RebuildReason::PublishBehind => "last publish is behind",
            RebuildReason::NeverPublished => "never published",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Rebuild(RebuildReason),
    UpToDate,
}

/// Everything [`decide`] looks at.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub sync: SyncOutcome,
    pub before: Option<&'a Fingerprint>,
    pub after: &'a Fingerprint,
    pub recorded: Option<&'a RunState>,
    pub published_non_empty: bool,
}

/// Pure rebuild rule. The first matching clause wins.
pub fn decide(input: &DecisionInput<'_>) -> Decision {
    if input.sync == SyncOutcome::Cloned {
        return Decision::Rebuild(RebuildReason::FreshClone);
    }
    if input.before != Some(input.after) {
        return Decision::Rebuild(RebuildReason::FingerprintChanged);
    }
    match input.recorded {
        Some(record) if record.published.as_ref() != Some(input.after) => {
            Decision::Rebuild(RebuildReason::PublishBehind)
        }
        None if !input.published_non_empty => Decision::Rebuild(RebuildReason::NeverPublished),
        _ => Decision::UpToDate,
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stages: Vec<Stage>,
    pub sync: SyncOutcome,
    pub before: Option<Fingerprint>,
    pub after: Fingerprint,
    pub rebuild: Option<RebuildReason>,
    pub build: Option<BuildReport>,
    pub publish: Option<PublishReport>,
    pub config_path: Option<PathBuf>,
}

impl RunReport {
    pub fn visited(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a> {
    settings: &'a Settings,
    vcs: &'a dyn Vcs,
    builder: &'a dyn BuildBackend,
    probe: Option<&'a dyn RemoteProbe>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(settings: &'a Settings, vcs: &'a dyn Vcs, builder: &'a dyn BuildBackend) -> Self {
        Self {
            settings,
            vcs,
            builder,
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: &'a dyn RemoteProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// One full pass: resolve, synchronize, re-resolve, decide, build, publish.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let settings = self.settings;
        let working_copy = settings.working_copy();
        let public_dir = settings.publish_path();
        let state_path = settings.state_path();
        let mut stages = vec![Stage::Start];

        let recorded = state::load_at(&state_path)?;

        let checkout = sync::inspect(self.vcs, &working_copy, &settings.repository)?;
        let before = if checkout.is_valid() {
            stages.push(Stage::Valid);
            fingerprint::resolve(self.vcs, &working_copy)
        } else {
            stages.push(Stage::Invalid);
            None
        };
        tracing::info!(
            path = %working_copy.display(),
            before = %display_opt(before.as_ref()),
            "working copy inspected",
        );

        let mut synchronizer = Synchronizer::new(self.vcs);
        if let Some(probe) = self.probe {
            synchronizer = synchronizer.with_probe(probe);
        }
        let target = SyncTarget {
            url: &settings.repository,
            branch: &settings.branch,
            path: &working_copy,
            recurse_submodules: true,
        };
        let outcome = synchronizer.synchronize(&target, &checkout, before.as_ref())?;
        stages.push(match outcome {
            SyncOutcome::Cloned => Stage::Cloned,
            SyncOutcome::Fetched => Stage::Fetched,
            SyncOutcome::Skipped => Stage::Skipped,
        });

        let after = self.head_after_sync(&working_copy)?;
        tracing::info!(after = %after, "synchronized");

        let published_non_empty =
            fs_ops::is_non_empty_dir(&public_dir).map_err(PublishError::from)?;
        let decision = decide(&DecisionInput {
            sync: outcome,
            before: before.as_ref(),
            after: &after,
            recorded: recorded.as_ref(),
            published_non_empty,
        });

        let publisher = Publisher::new(settings.publish_mode, settings.config_file_name.clone());
        let payload = ConfigPayload::from_settings(settings);
        let output_dir = settings.build_output_dir();
        let mut report = RunReport {
            stages,
            sync: outcome,
            before,
            after,
            rebuild: None,
            build: None,
            publish: None,
            config_path: None,
        };

        match decision {
            Decision::Rebuild(reason) => {
                tracing::info!(reason = %reason, "rebuild needed");
                report.stages.push(Stage::RebuildNeeded);
                report.rebuild = Some(reason);

                let build = trigger::run(self.builder, &settings.build_descriptor(), &output_dir)?;
                report.stages.push(Stage::Built);
                report.build = Some(build);

                self.publish(&publisher, &output_dir, &public_dir, &payload, &mut report)?;
                self.record(&state_path, recorded.as_ref(), &report.after)?;
            }
            Decision::UpToDate if settings.force_publish => {
                tracing::info!("up to date; force-publishing existing build output");
                report.stages.push(Stage::UpToDate);
                self.publish(&publisher, &output_dir, &public_dir, &payload, &mut report)?;
                self.record(&state_path, recorded.as_ref(), &report.after)?;
            }
            Decision::UpToDate if settings.force_config => {
                tracing::info!("up to date; refreshing config only");
                report.stages.push(Stage::UpToDate);
                let path = publisher.refresh_config(&public_dir, &payload)?;
                report.stages.push(Stage::ConfigRefreshed);
                report.config_path = Some(path);
            }
            Decision::UpToDate => {
                tracing::info!(tip = %report.after, "up to date; nothing to do");
                report.stages.push(Stage::UpToDate);
            }
        }

        report.stages.push(Stage::Done);
        Ok(report)
    }

    fn head_after_sync(&self, working_copy: &Path) -> Result<Fingerprint, PipelineError> {
        if !self.vcs.is_valid_checkout(working_copy) {
            return Err(VcsError::NoHead {
                path: working_copy.to_path_buf(),
            }
            .into());
        }
        Ok(self.vcs.head_fingerprint(working_copy)?)
    }

    fn publish(
        &self,
        publisher: &Publisher,
        output_dir: &Path,
        public_dir: &Path,
        payload: &ConfigPayload,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let published = publisher.publish(output_dir, public_dir, payload)?;
        report.stages.push(Stage::Published);
        report.config_path = Some(published.config_path.clone());
        report.publish = Some(published);
        Ok(())
    }

    fn record(
        &self,
        state_path: &Path,
        recorded: Option<&RunState>,
        fingerprint: &Fingerprint,
    ) -> Result<(), PipelineError> {
        let next = recorded.cloned().unwrap_or_default().after_publish(fingerprint);
        state::save_at(state_path, &next)
    }
}

fn display_opt(fingerprint: Option<&Fingerprint>) -> String {
    fingerprint.map_or_else(|| "(none)".to_string(), ToString::to_string)
}
