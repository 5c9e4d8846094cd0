//! Runtime config payload: a caller-supplied literal, else a template file.

use std::fs;
use std::path::PathBuf;

use autobuild_core::Settings;

use crate::error::PublishError;

/// Where the generated config file's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPayload {
    /// Written verbatim.
    Literal(String),
    /// Read from a template inside the working copy at publish time.
    Template(PathBuf),
}

impl ConfigPayload {
    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.config_json {
            Some(literal) => ConfigPayload::Literal(literal.clone()),
            None => ConfigPayload::Template(settings.template_path()),
        }
    }

    /// The bytes to write. Template content is passed through untouched.
    pub fn resolve(&self) -> Result<String, PublishError> {
        match self {
            ConfigPayload::Literal(text) => Ok(text.clone()),
            ConfigPayload::Template(path) => {
                fs::read_to_string(path).map_err(|source| PublishError::Template {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}
