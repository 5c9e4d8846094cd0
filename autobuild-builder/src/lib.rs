//! # autobuild-builder
//!
//! Drives the external build toolchain: a [`BuildBackend`] seam, the
//! child-process implementation that streams tool output into the log, and
//! the [`trigger`] that sequences restore and build.

pub mod backend;
pub mod error;
pub mod trigger;

pub use backend::{BuildBackend, BuildStep, ProcessBackend, StepExit};
pub use error::BuildError;
pub use trigger::BuildReport;
