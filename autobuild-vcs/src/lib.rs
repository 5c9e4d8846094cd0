//! # autobuild-vcs
//!
//! Version-control side of the pipeline: the [`Vcs`] backend seam and its
//! `git` implementation, the fingerprint resolver, the repository
//! synchronizer and the optional remote commit probe.

pub mod backend;
pub mod error;
pub mod fingerprint;
pub mod git;
pub mod remote;
pub mod sync;

pub use backend::Vcs;
pub use error::VcsError;
pub use git::GitCli;
pub use remote::{HttpProbe, ProbeOutcome, RemoteProbe};
pub use sync::{CheckoutState, SyncOutcome, SyncTarget, Synchronizer};
