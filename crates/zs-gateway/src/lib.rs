//! # zs-gateway
//!
//! Operation surface for zoned user storage.
//!
//! `StorageService` exposes every storage operation (exec, write, delete,
//! rename, the safe-edit protocol, bridges and utilities) for a `Caller`
//! and answers each with a uniform JSON [`Envelope`]. It composes the lower
//! crates: `zs-policy` decides which commands may run, `zs-workspace` keeps
//! paths inside their zone and owns locks and quotas, `zs-sandbox` runs the
//! authorized command, `zs-versioned` commits Documents changes and
//! `zs-audit` records every outcome.
//!
//! ## Key invariants
//!
//! - No operation panics or returns a bare error; failures are envelopes
//!   with a stable code.
//! - Policy and resource checks happen before anything is spawned or written.
//! - Every successful Documents mutation is exactly one commit.

pub mod admin;
pub mod bridge;
pub mod config;
pub mod edit;
pub mod envelope;
pub mod error;
pub mod exec;
pub mod files;
pub mod request;
pub mod service;

pub use admin::{ImportRequest, UploadedFile, HELP};
pub use config::StorageConfig;
pub use envelope::Envelope;
pub use error::GatewayError;
pub use exec::ExecParams;
pub use request::Request;
pub use service::{Caller, StorageService};

pub use zs_policy::ErrorCode;
pub use zs_workspace::{Clock, ManualClock, SystemClock, Zone};
