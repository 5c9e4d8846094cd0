//! `git` command-line backend.
//!
//! Every operation is one `git` invocation with captured output. Prompts are
//! disabled (`GIT_TERMINAL_PROMPT=0`) so a missing credential fails fast
//! instead of blocking an unattended run.

use std::path::{Path, PathBuf};
use std::process::Command;

use autobuild_core::{BranchName, Fingerprint};

use crate::backend::Vcs;
use crate::error::VcsError;

/// Field separator for `git log --format`; never appears in names or subjects.
const FIELD_SEP: char = '\u{0}';
const HEAD_FORMAT: &str = "--format=%H%x00%an <%ae>%x00%s";

/// [`Vcs`] implementation that shells out to `git`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific `git` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, VcsError> {
        let mut command = Command::new(&self.program);
        if let Some(dir) = cwd {
            command.arg("-C").arg(dir);
        }
        command.args(args).env("GIT_TERMINAL_PROMPT", "0");

        let rendered = format!("git {}", args.join(" "));
        tracing::debug!(command = %rendered, "running git");

        let output = command.output().map_err(|source| VcsError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(VcsError::Command {
                command: rendered,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Vcs for GitCli {
    fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        branch: &BranchName,
        recurse_submodules: bool,
    ) -> Result<(), VcsError> {
        let dest = dest.to_string_lossy();
        let mut args = vec!["clone", "--branch", branch.0.as_str()];
        if recurse_submodules {
            args.push("--recurse-submodules");
        }
        args.extend(["--", url, dest.as_ref()]);
        self.run(None, &args).map(drop)
    }

    fn is_valid_checkout(&self, path: &Path) -> bool {
        if !path.is_dir() {
            return false;
        }
        match self.run(Some(path), &["rev-parse", "--show-toplevel"]) {
            Ok(top) => same_dir(Path::new(top.trim()), path),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "not a checkout");
                false
            }
        }
    }

    fn origin_url(&self, path: &Path) -> Result<Option<String>, VcsError> {
        match self.run(Some(path), &["remote", "get-url", crate::sync::ORIGIN]) {
            Ok(url) => Ok(Some(url.trim().to_string())),
            Err(VcsError::Command { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn fetch(&self, path: &Path, remote: &str) -> Result<(), VcsError> {
        self.run(Some(path), &["fetch", remote]).map(drop)
    }

    fn checkout(&self, path: &Path, reference: &str) -> Result<(), VcsError> {
        self.run(Some(path), &["checkout", "--force", "--detach", reference])
            .map(drop)
    }

    fn update_submodules(&self, path: &Path) -> Result<(), VcsError> {
        if !path.join(".gitmodules").exists() {
            return Ok(());
        }
        self.run(
            Some(path),
            &["submodule", "update", "--init", "--recursive", "--force"],
        )
        .map(drop)
    }

    fn head_fingerprint(&self, path: &Path) -> Result<Fingerprint, VcsError> {
        let args = ["log", "-1", HEAD_FORMAT, "HEAD"];
        let output = self.run(Some(path), &args)?;
        parse_fingerprint(&output).ok_or_else(|| VcsError::UnexpectedOutput {
            command: format!("git {}", args.join(" ")),
            output,
        })
    }

    fn list_remote_branches(&self, url: &str) -> Result<Vec<String>, VcsError> {
        let output = self.run(None, &["ls-remote", "--heads", "--", url])?;
        Ok(parse_ls_remote(&output))
    }
}

/// Parse `%H\0%an <%ae>\0%s` into a fingerprint.
pub fn parse_fingerprint(output: &str) -> Option<Fingerprint> {
    let line = output.trim_end_matches(['\r', '\n']);
    let mut fields = line.splitn(3, FIELD_SEP);
    let commit_id = fields.next()?.trim();
    let author = fields.next()?;
    let summary = fields.next()?;
    if commit_id.is_empty() {
        return None;
    }
    Some(Fingerprint::new(commit_id, author, summary))
}

/// Branch names from `git ls-remote --heads` output, sorted.
pub fn parse_ls_remote(output: &str) -> Vec<String> {
    let mut branches: Vec<String> = output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|reference| reference.strip_prefix("refs/heads/"))
        .map(str::to_string)
        .collect();
    branches.sort();
    branches.dedup();
    branches
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
