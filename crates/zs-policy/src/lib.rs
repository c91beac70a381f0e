//! # zs-policy
//!
//! Command authorization for zoned user storage.
//!
//! Agents never get a shell. A command request is a program name plus an
//! argument vector, and the [`CommandAuthorizer`] decides, before anything is
//! spawned, whether that exact vector may run in a zone of a given
//! [`CapabilityLevel`].
//!
//! ## Key components
//!
//! - [`CommandPolicy`]: immutable whitelist/blacklist/git tables plus
//!   compiled per-command guards, built once and shared by reference.
//! - [`ArgSchema`]: which arguments of a command are paths, scripts or
//!   option values, and which nest another command.
//! - [`CommandAuthorizer`]: the ordered check pipeline, with an optional
//!   evaluation trace for the audit log.
//! - [`ErrorCode`]: the stable failure codes shared by every crate.
//!
//! ## Key invariants
//!
//! - **Syntax first**: shell metacharacters are rejected before any other
//!   rule is consulted.
//! - **Blacklist everywhere**: shells, interpreters, privilege and network
//!   tools are refused in every zone.
//! - **Paths stay inside**: every path-like argument, including those of
//!   wrapped commands, is validated through a [`PathValidator`].

pub mod capability;
pub mod code;
pub mod commands;
pub mod engine;
pub mod error;
pub mod guards;
pub mod schema;

pub use capability::CapabilityLevel;
pub use code::ErrorCode;
pub use commands::{CommandClass, CommandPolicy, GitRule};
pub use engine::{
    AuthorizationDecision, AuthorizationRequest, AuthorizedCommand, CommandAuthorizer,
    EvaluationStep, EvaluationTrace, PathValidator,
};
pub use error::{AuthorizationError, PolicyError};
pub use schema::ArgSchema;
