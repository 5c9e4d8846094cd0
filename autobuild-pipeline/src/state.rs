//! Run-state record: which fingerprint was last published, and when.
//!
//! Persists a `RunState` JSON document at `<root>/.autobuild/state.json`.
//! Writes use the atomic `.tmp` + rename pattern. The record is only ever
//! written after a successful publish.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autobuild_core::Fingerprint;

use crate::error::{io_err, PipelineError};

/// On-disk run-state payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunState {
    #[serde(default)]
    pub published: Option<Fingerprint>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Number of successful publishes recorded.
    #[serde(default)]
    pub runs: u64,
}

impl RunState {
    /// The record after publishing `fingerprint` now.
    pub fn after_publish(&self, fingerprint: &Fingerprint) -> RunState {
        RunState {
            published: Some(fingerprint.clone()),
            published_at: Some(Utc::now()),
            runs: self.runs.saturating_add(1),
        }
    }
}

/// Load the record. `Ok(None)` when no record exists yet.
pub fn load_at(path: &Path) -> Result<Option<RunState>, PipelineError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| PipelineError::State {
            path: path.to_path_buf(),
            source,
        })
}

/// Save the record atomically: write `<path>.tmp` then rename.
pub fn save_at(path: &Path, state: &RunState) -> Result<(), PipelineError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid run-state path")));
    };
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(state).map_err(|source| PipelineError::State {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}
