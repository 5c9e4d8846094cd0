//! autobuild: unattended game-server update, build and publish.
//!
//! # Usage
//!
//! ```text
//! autobuild [--root <dir>] [--config <file.yaml>] [--repo <url>] [--branch <name>]
//!           [--configuration release|debug] [--force-publish] [--force-config]
//!           [--config-json <json>] [--publish-mode staged|in-place] [--pause] [--json]
//! autobuild --list-branches [--repo <url>]
//! ```
//!
//! One invocation is one run: synchronize the working copy, rebuild if the
//! tracked branch moved, publish, exit.

mod logging;
mod report;
mod rotation;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use autobuild_core::{BuildConfiguration, PublishMode, Settings, SettingsFile};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "autobuild",
    version,
    about = "Keep a published game-server build in step with its source repository",
    long_about = None,
)]
struct Cli {
    /// Directory holding the working copy, publish folder and run state.
    /// Defaults to the directory containing this executable.
    #[arg(long)]
    root: Option<PathBuf>,

    /// YAML settings file, applied over the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote repository URL.
    #[arg(long = "repo")]
    repository: Option<String>,

    /// Branch to track.
    #[arg(long)]
    branch: Option<String>,

    /// Working-copy folder name under the root.
    #[arg(long)]
    source_dir: Option<String>,

    /// Publish folder name under the root.
    #[arg(long)]
    publish_dir: Option<String>,

    /// Build configuration: release or debug.
    #[arg(long, value_parser = parse_configuration)]
    configuration: Option<BuildConfiguration>,

    /// Publish the existing build output even when nothing changed.
    #[arg(long)]
    force_publish: bool,

    /// Rewrite the config file even when nothing changed.
    #[arg(long)]
    force_config: bool,

    /// Literal JSON written as the config file instead of the template.
    #[arg(long)]
    config_json: Option<String>,

    /// How to replace the publish folder: staged or in-place.
    #[arg(long, value_parser = parse_publish_mode)]
    publish_mode: Option<PublishMode>,

    /// Commits API consulted before fetching; a matching tip skips the fetch.
    #[arg(long)]
    remote_api: Option<String>,

    /// Wait for Enter before exiting.
    #[arg(long)]
    pause: bool,

    /// Print the remote's branch names and exit.
    #[arg(long)]
    list_branches: bool,

    /// Emit machine-readable JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Also append log output to this file (rotated at 10 MiB).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn parse_configuration(s: &str) -> std::result::Result<BuildConfiguration, String> {
    s.parse().map_err(|e: autobuild_core::ConfigError| e.to_string())
}

fn parse_publish_mode(s: &str) -> std::result::Result<PublishMode, String> {
    s.parse().map_err(|e: autobuild_core::ConfigError| e.to_string())
}

impl Cli {
    /// Flags as a settings overlay. Switches only override when given.
    fn overrides(&self) -> SettingsFile {
        SettingsFile {
            repository: self.repository.clone(),
            branch: self.branch.clone(),
            source_dir: self.source_dir.clone(),
            publish_dir: self.publish_dir.clone(),
            configuration: self.configuration,
            force_publish: self.force_publish.then_some(true),
            force_config: self.force_config.then_some(true),
            config_json: self.config_json.clone(),
            publish_mode: self.publish_mode,
            remote_api: self.remote_api.clone(),
            ..SettingsFile::default()
        }
    }

    fn settings(&self) -> Result<Settings> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => executable_dir()?,
        };
        let file = match &self.config {
            Some(path) => SettingsFile::load_at(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => SettingsFile::default(),
        };
        Settings::resolve(root, file.merge(self.overrides())).context("invalid configuration")
    }

    fn run(&self) -> Result<()> {
        let settings = self.settings()?;
        logging::init_tracing(self.log_file.as_deref())?;

        if self.list_branches {
            let branches = autobuild_pipeline::list_branches(&settings)
                .with_context(|| format!("failed to list branches of {}", settings.repository))?;
            return report::print_branches(&branches, self.json);
        }

        tracing::info!(
            root = %settings.root.display(),
            repository = %settings.repository,
            branch = %settings.branch,
            configuration = %settings.configuration,
            "starting run",
        );
        let started = Instant::now();
        let run_report = autobuild_pipeline::run(&settings).map_err(|err| {
            let kind = err.kind();
            anyhow::Error::new(err).context(format!("{kind} stage failed"))
        })?;
        report::print_report(&run_report, started.elapsed(), self.json)
    }
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("could not determine executable path")?;
    exe.parent()
        .map(PathBuf::from)
        .context("executable has no parent directory")
}

fn wait_for_enter() {
    eprint!("Press Enter to exit...");
    let _ = io::stderr().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    let code = match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    };
    if cli.pause {
        wait_for_enter();
    }
    code
}
