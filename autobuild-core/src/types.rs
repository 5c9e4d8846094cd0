//! Domain types shared by every autobuild crate.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for the tracked branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchName(pub String);

impl BranchName {
    /// Remote-tracking ref checked out after a fetch, e.g. `origin/master`.
    pub fn remote_ref(&self, remote: &str) -> String {
        format!("{remote}/{}", self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Identity of a branch tip: commit id, author and short message.
///
/// Compared byte-for-byte on all three components and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub commit_id: String,
    pub author: String,
    pub summary: String,
}

impl Fingerprint {
    pub fn new(
        commit_id: impl Into<String>,
        author: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            commit_id: commit_id.into(),
            author: author.into(),
            summary: summary.into(),
        }
    }

    /// Abbreviated commit id for display.
    pub fn short_id(&self) -> &str {
        self.commit_id.get(..10).unwrap_or(&self.commit_id)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} \"{}\"", self.short_id(), self.author, self.summary)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Build configuration passed to the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BuildConfiguration {
    #[default]
    #[serde(alias = "Release")]
    Release,
    #[serde(alias = "Debug")]
    Debug,
}

impl BuildConfiguration {
    /// Label as the build tool expects it.
    pub fn label(self) -> &'static str {
        match self {
            BuildConfiguration::Release => "Release",
            BuildConfiguration::Debug => "Debug",
        }
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BuildConfiguration {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "release" => Ok(Self::Release),
            "debug" => Ok(Self::Debug),
            other => Err(ConfigError::UnknownConfiguration(other.to_string())),
        }
    }
}

/// How the publisher replaces the public directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PublishMode {
    /// Copy into a sibling staging directory, then rename-swap it into place.
    #[default]
    Staged,
    /// Delete the public directory, then copy straight into it.
    InPlace,
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishMode::Staged => write!(f, "staged"),
            PublishMode::InPlace => write!(f, "in-place"),
        }
    }
}

impl FromStr for PublishMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "staged" => Ok(Self::Staged),
            "in-place" | "inplace" => Ok(Self::InPlace),
            other => Err(ConfigError::UnknownPublishMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Build inputs
// ---------------------------------------------------------------------------

/// What to build and how: the manifest inside the working copy plus the
/// configuration label. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    /// Absolute path to the solution / project file.
    pub solution: PathBuf,
    pub configuration: BuildConfiguration,
    /// Directory the build is run from (the working copy root).
    pub working_dir: PathBuf,
}

/// An external command line with `{solution}` / `{configuration}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Expand placeholders in every argument.
    pub fn expand(&self, solution: &Path, configuration: BuildConfiguration) -> Vec<String> {
        let solution = solution.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{solution}", &solution)
                    .replace("{configuration}", configuration.label())
            })
            .collect()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
