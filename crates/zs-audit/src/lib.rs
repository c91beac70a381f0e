//! # zs-audit
//!
//! Append-only record of every storage operation.
//!
//! Each operation, allowed or not, becomes one [`AuditEvent`] in a JSONL
//! file. Events are hash-chained through `previous_hash`, and
//! [`AuditLog::verify_chain`] detects any line that was inserted, removed or
//! edited after the fact.

pub mod error;
pub mod event;
pub mod hasher;
pub mod log;

pub use error::AuditError;
pub use event::{AuditEvent, AuditOutcome};
pub use log::AuditLog;
