//! # zs-sandbox
//!
//! Runs authorized commands without a shell.
//!
//! The [`CommandExecutor`] spawns the program named in an already-authorized
//! argv inside a zone directory, with a rebuilt environment ([`SandboxEnv`]),
//! a clamped timeout and bounded output capture ([`ExecLimits`]). Timeouts,
//! cancellation and early drops kill the child's whole process group, so no
//! orphaned processes survive a call.
//!
//! A non-zero exit status is a normal [`ExecOutput`], not an error.

pub mod env;
pub mod error;
pub mod executor;
pub mod limits;

pub use env::SandboxEnv;
pub use error::SandboxError;
pub use executor::{CommandExecutor, ExecOutput, ExecRequest};
pub use limits::ExecLimits;
