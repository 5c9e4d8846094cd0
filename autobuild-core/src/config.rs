//! Run settings.
//!
//! Resolution order (later wins):
//!
//! ```text
//! built-in defaults  <-  YAML file (--config)  <-  CLI flags
//! ```
//!
//! Both the file and the CLI produce a [`SettingsFile`] overlay; overlays are
//! merged with [`SettingsFile::merge`] and then resolved once into an
//! immutable [`Settings`] that is passed by reference to every component.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{BranchName, BuildConfiguration, BuildDescriptor, CommandTemplate, PublishMode};

pub const DEFAULT_REPOSITORY: &str = "https://github.com/LeagueSandbox/GameServer.git";
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_SOURCE_DIR: &str = "CurrentRepository";
pub const DEFAULT_PUBLISH_DIR: &str = "Compiled GameServer";
pub const DEFAULT_SOLUTION: &str = "GameServer.sln";
pub const DEFAULT_BUILD_OUTPUT: &str = "GameServerApp/bin/{configuration}";
pub const DEFAULT_CONFIG_TEMPLATE: &str = "GameServerApp/Settings/GameInfo.json.template";
pub const DEFAULT_CONFIG_FILE_NAME: &str = "GameInfo.json";
/// Folder inside the published artifact that receives the config file.
pub const SETTINGS_DIR: &str = "Settings";

/// Directory under the root holding the run-state record.
pub const STATE_DIR: &str = ".autobuild";
pub const STATE_FILE: &str = "state.json";

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// Partial settings as read from a YAML file or collected from CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub source_dir: Option<String>,
    pub publish_dir: Option<String>,
    pub configuration: Option<BuildConfiguration>,
    pub force_publish: Option<bool>,
    pub force_config: Option<bool>,
    pub config_json: Option<String>,
    pub publish_mode: Option<PublishMode>,
    pub remote_api: Option<String>,
    pub solution: Option<PathBuf>,
    pub build_output: Option<String>,
    pub config_template: Option<PathBuf>,
    pub config_file_name: Option<String>,
    pub restore: Option<CommandTemplate>,
    pub build: Option<CommandTemplate>,
}

impl SettingsFile {
    /// Load an overlay from a YAML file.
    ///
    /// Returns `ConfigError::Io` if unreadable and `ConfigError::Parse`
    /// (with path + line context) if malformed.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `other` on top of `self`; every `Some` in `other` wins.
    pub fn merge(self, other: SettingsFile) -> SettingsFile {
        SettingsFile {
            repository: other.repository.or(self.repository),
            branch: other.branch.or(self.branch),
            source_dir: other.source_dir.or(self.source_dir),
            publish_dir: other.publish_dir.or(self.publish_dir),
            configuration: other.configuration.or(self.configuration),
            force_publish: other.force_publish.or(self.force_publish),
            force_config: other.force_config.or(self.force_config),
            config_json: other.config_json.or(self.config_json),
            publish_mode: other.publish_mode.or(self.publish_mode),
            remote_api: other.remote_api.or(self.remote_api),
            solution: other.solution.or(self.solution),
            build_output: other.build_output.or(self.build_output),
            config_template: other.config_template.or(self.config_template),
            config_file_name: other.config_file_name.or(self.config_file_name),
            restore: other.restore.or(self.restore),
            build: other.build.or(self.build),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Fully resolved, immutable run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding the working copy, the publish dir and `.autobuild/`.
    pub root: PathBuf,
    pub repository: String,
    pub branch: BranchName,
    pub source_dir: String,
    pub publish_dir: String,
    pub configuration: BuildConfiguration,
    pub force_publish: bool,
    pub force_config: bool,
    /// Literal config payload; validated as JSON, written verbatim.
    pub config_json: Option<String>,
    pub publish_mode: PublishMode,
    pub remote_api: Option<String>,
    /// Relative to the working copy.
    pub solution: PathBuf,
    /// Relative to the working copy; may contain `{configuration}`.
    pub build_output: String,
    /// Relative to the working copy.
    pub config_template: PathBuf,
    pub config_file_name: String,
    pub restore: CommandTemplate,
    pub build: CommandTemplate,
}

impl Settings {
    /// Resolve an overlay against the built-in defaults and validate it.
    pub fn resolve(root: PathBuf, file: SettingsFile) -> Result<Settings, ConfigError> {
        let settings = Settings {
            root,
            repository: file
                .repository
                .unwrap_or_else(|| DEFAULT_REPOSITORY.to_string()),
            branch: BranchName::from(file.branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string())),
            source_dir: file
                .source_dir
                .unwrap_or_else(|| DEFAULT_SOURCE_DIR.to_string()),
            publish_dir: file
                .publish_dir
                .unwrap_or_else(|| DEFAULT_PUBLISH_DIR.to_string()),
            configuration: file.configuration.unwrap_or_default(),
            force_publish: file.force_publish.unwrap_or(false),
            force_config: file.force_config.unwrap_or(false),
            config_json: file.config_json,
            publish_mode: file.publish_mode.unwrap_or_default(),
            remote_api: file.remote_api.filter(|url| !url.trim().is_empty()),
            solution: file
                .solution
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOLUTION)),
            build_output: file
                .build_output
                .unwrap_or_else(|| DEFAULT_BUILD_OUTPUT.to_string()),
            config_template: file
                .config_template
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_TEMPLATE)),
            config_file_name: file
                .config_file_name
                .unwrap_or_else(|| DEFAULT_CONFIG_FILE_NAME.to_string()),
            restore: file.restore.unwrap_or_else(default_restore),
            build: file.build.unwrap_or_else(default_build),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.trim().is_empty() {
            return Err(invalid("repository", "must not be empty"));
        }
        if self.branch.0.trim().is_empty() || self.branch.0.contains(char::is_whitespace) {
            return Err(invalid("branch", "must be a non-empty name without spaces"));
        }
        check_folder_name("source_dir", &self.source_dir)?;
        check_folder_name("publish_dir", &self.publish_dir)?;
        if self.source_dir == self.publish_dir {
            return Err(invalid("publish_dir", "must differ from source_dir"));
        }
        check_folder_name("config_file_name", &self.config_file_name)?;
        check_relative("solution", &self.solution)?;
        check_relative("build_output", Path::new(&self.build_output))?;
        check_relative("config_template", &self.config_template)?;
        if self.restore.program.trim().is_empty() {
            return Err(invalid("restore.program", "must not be empty"));
        }
        if self.build.program.trim().is_empty() {
            return Err(invalid("build.program", "must not be empty"));
        }
        if let Some(payload) = &self.config_json {
            serde_json::from_str::<serde_json::Value>(payload)
                .map_err(ConfigError::InvalidPayload)?;
        }
        Ok(())
    }

    /// `<root>/<source_dir>`
    pub fn working_copy(&self) -> PathBuf {
        self.root.join(&self.source_dir)
    }

    /// `<root>/<publish_dir>`
    pub fn publish_path(&self) -> PathBuf {
        self.root.join(&self.publish_dir)
    }

    /// `<root>/.autobuild/state.json`
    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(STATE_FILE)
    }

    /// Build output directory inside the working copy for the configured mode.
    pub fn build_output_dir(&self) -> PathBuf {
        let relative = self
            .build_output
            .replace("{configuration}", self.configuration.label());
        self.working_copy().join(relative)
    }

    /// Config template inside the working copy.
    pub fn template_path(&self) -> PathBuf {
        self.working_copy().join(&self.config_template)
    }

    pub fn build_descriptor(&self) -> BuildDescriptor {
        let working_copy = self.working_copy();
        BuildDescriptor {
            solution: working_copy.join(&self.solution),
            configuration: self.configuration,
            working_dir: working_copy,
        }
    }
}

fn default_restore() -> CommandTemplate {
    CommandTemplate::new("dotnet", &["restore", "{solution}"])
}

fn default_build() -> CommandTemplate {
    CommandTemplate::new(
        "dotnet",
        &[
            "build",
            "{solution}",
            "--configuration",
            "{configuration}",
            "--verbosity",
            "minimal",
        ],
    )
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// A folder (or file) name directly under its parent: one plain path component.
fn check_folder_name(field: &'static str, name: &str) -> Result<(), ConfigError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.trim().is_empty() => Ok(()),
        _ => Err(invalid(field, &format!("'{name}' must be a single folder name"))),
    }
}

fn check_relative(field: &'static str, path: &Path) -> Result<(), ConfigError> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.as_os_str().is_empty() || escapes {
        return Err(invalid(
            field,
            &format!(
                "'{}' must be a relative path inside the working copy",
                path.display()
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
