//! Remote commit probe.
//!
//! Asks a commits API for the latest commit message on the tracked branch.
//! This is advisory only: any failure yields [`ProbeOutcome::Unknown`], which
//! callers treat as "assume changed".

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use autobuild_core::{BranchName, Fingerprint};

const USER_AGENT: &str = concat!("autobuild/", env!("CARGO_PKG_VERSION"));
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Failure to obtain or decode the remote's latest commit.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("response is not a commit list: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("remote returned no commits")]
    Empty,
}

/// Result of comparing the remote tip with the local fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Matches,
    Differs { remote: String },
    Unknown { reason: String },
}

/// Source of the latest remote commit summary.
pub trait RemoteProbe {
    fn latest_summary(&self, branch: &BranchName) -> Result<String, ProbeError>;
}

/// Compare the remote's latest summary with `local`.
pub fn probe(source: &dyn RemoteProbe, branch: &BranchName, local: &Fingerprint) -> ProbeOutcome {
    match source.latest_summary(branch) {
        Ok(remote) if remote == local.summary => ProbeOutcome::Matches,
        Ok(remote) => ProbeOutcome::Differs { remote },
        Err(err) => ProbeOutcome::Unknown {
            reason: err.to_string(),
        },
    }
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
}

/// Decode a commits-API body and return the first line of the newest message.
pub fn decode_latest_summary(body: &str) -> Result<String, ProbeError> {
    let commits: Vec<CommitEntry> = serde_json::from_str(body)?;
    let first = commits.into_iter().next().ok_or(ProbeError::Empty)?;
    Ok(first
        .commit
        .message
        .lines()
        .next()
        .unwrap_or_default()
        .to_string())
}

/// [`RemoteProbe`] backed by an HTTP commits endpoint such as
/// `https://api.github.com/repos/<owner>/<repo>/commits`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    api_url: String,
    agent: ureq::Agent,
}

impl HttpProbe {
    pub fn new(api_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(PROBE_TIMEOUT).build();
        Self {
            api_url: api_url.into(),
            agent,
        }
    }
}

impl RemoteProbe for HttpProbe {
    fn latest_summary(&self, branch: &BranchName) -> Result<String, ProbeError> {
        let body = self
            .agent
            .get(&self.api_url)
            .set("User-Agent", USER_AGENT)
            .set("Accept", "application/json")
            .query("sha", &branch.0)
            .query("per_page", "1")
            .call()
            .map_err(|e| ProbeError::Http(e.to_string()))?
            .into_string()
            .map_err(|e| ProbeError::Http(e.to_string()))?;
        decode_latest_summary(&body)
    }
}
