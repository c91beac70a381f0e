//! # zs-versioned
//!
//! The Documents zone keeps a git history of itself. [`VersionedZoneStore`]
//! wraps the plain zone store so that each successful write, delete or
//! rename is followed by exactly one commit, with a default message when the
//! caller gives none. [`GitRepo`] is the trusted plumbing underneath; caller
//! git commands never go through it.

pub mod error;
pub mod git;
pub mod store;

pub use error::VersionedError;
pub use git::{CommitIdentity, GitRepo};
pub use store::{messages, Committed, VersionedZoneStore};
