//! Run summary output: a colored table for people, or JSON with `--json`.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use autobuild_core::Fingerprint;
use autobuild_pipeline::{RunReport, Stage};

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Step")]
    step: &'static str,
    #[tabled(rename = "Detail")]
    detail: String,
}

#[derive(Serialize)]
struct RunReportJson<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    elapsed_ms: u64,
    finished_at: DateTime<Utc>,
}

pub fn print_report(report: &RunReport, elapsed: Duration, json: bool) -> Result<()> {
    if json {
        let payload = RunReportJson {
            report,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            finished_at: Utc::now(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize run report")?
        );
        return Ok(());
    }

    let path = report
        .stages
        .iter()
        .map(|stage| colorize(*stage))
        .collect::<Vec<_>>()
        .join(&" → ".bright_black().to_string());
    println!("autobuild v{} | {path}", env!("CARGO_PKG_VERSION"));

    let mut table = Table::new(rows(report));
    table.with(Style::rounded());
    println!("{table}");

    println!(
        "{} finished in {}",
        "✔".green().bold(),
        format_elapsed(elapsed).bold()
    );
    Ok(())
}

pub fn print_branches(branches: &[String], json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(branches).context("failed to serialize branch list")?
        );
        return Ok(());
    }
    if branches.is_empty() {
        println!("No branches found on remote.");
    }
    for branch in branches {
        println!("{branch}");
    }
    Ok(())
}

fn rows(report: &RunReport) -> Vec<Row> {
    let mut rows = vec![
        Row {
            step: "Sync",
            detail: format!("{:?}", report.sync).to_lowercase(),
        },
        Row {
            step: "Before",
            detail: describe(report.before.as_ref()),
        },
        Row {
            step: "After",
            detail: describe(Some(&report.after)),
        },
        Row {
            step: "Rebuild",
            detail: report
                .rebuild
                .map_or_else(|| "not needed".to_string(), |reason| reason.to_string()),
        },
    ];
    if let Some(build) = &report.build {
        rows.push(Row {
            step: "Build",
            detail: format!(
                "restore {} · build {}",
                format_elapsed(Duration::from_millis(build.restore_ms)),
                format_elapsed(Duration::from_millis(build.build_ms)),
            ),
        });
    }
    if let Some(publish) = &report.publish {
        rows.push(Row {
            step: "Publish",
            detail: format!(
                "{} files, {} → {} ({})",
                publish.files,
                format_bytes(publish.bytes),
                publish.public_dir.display(),
                publish.mode,
            ),
        });
    }
    if let Some(config) = &report.config_path {
        rows.push(Row {
            step: "Config",
            detail: config.display().to_string(),
        });
    }
    rows
}

fn describe(fingerprint: Option<&Fingerprint>) -> String {
    fingerprint.map_or_else(|| "(none)".to_string(), ToString::to_string)
}

fn colorize(stage: Stage) -> String {
    let label = stage.to_string();
    match stage {
        Stage::Built | Stage::Published | Stage::ConfigRefreshed => label.green().to_string(),
        Stage::RebuildNeeded | Stage::Invalid => label.yellow().to_string(),
        Stage::UpToDate | Stage::Skipped => label.cyan().to_string(),
        _ => label,
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes >= KIB * KIB {
        format!("{:.1} MiB", bytes / (KIB * KIB))
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}
