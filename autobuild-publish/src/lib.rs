//! # autobuild-publish
//!
//! Replaces the consumer-facing directory with a fresh build output plus one
//! generated config file. See [`publisher`] for the staged swap protocol.

pub mod error;
pub mod payload;
pub mod publisher;

pub use error::PublishError;
pub use payload::ConfigPayload;
pub use publisher::{PublishReport, Publisher};
