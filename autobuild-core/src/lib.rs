//! autobuild core library: domain types, settings, filesystem primitives.
//!
//! Public API surface:
//! - [`types`]: newtypes and domain structs ([`Fingerprint`], [`BuildDescriptor`], …)
//! - [`config`]: [`Settings`] resolution from defaults, YAML file and CLI overrides
//! - [`fs_ops`]: recursive delete / copy used by the publisher
//! - [`error`]: [`ConfigError`], [`FsError`]

pub mod config;
pub mod error;
pub mod fs_ops;
pub mod types;

pub use config::{Settings, SettingsFile};
pub use error::{ConfigError, FsError};
pub use types::{
    BranchName, BuildConfiguration, BuildDescriptor, CommandTemplate, Fingerprint, PublishMode,
};
