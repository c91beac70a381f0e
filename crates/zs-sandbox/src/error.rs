// error.rs — Error types for command execution.

use std::path::PathBuf;

use serde_json::{json, Value};
use thiserror::Error;
use zs_policy::ErrorCode;

#[derive(Debug, Error)]
pub enum SandboxError {
    /// The command ran past its timeout and its process group was killed.
    #[error("'{command}' timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    /// The program is whitelisted but not installed on this host.
    #[error("'{command}' is not installed")]
    CommandNotFound { command: String },

    #[error("'{command}' was cancelled")]
    Cancelled { command: String },

    #[error("failed to start '{command}': {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("failed waiting for '{command}': {source}")]
    WaitFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("working directory {} does not exist", .path.display())]
    InvalidWorkingDir { path: PathBuf },
}

impl SandboxError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SandboxError::Timeout { .. } => ErrorCode::Timeout,
            SandboxError::CommandNotFound { .. } => ErrorCode::CommandNotFound,
            _ => ErrorCode::ExecError,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            SandboxError::Timeout { .. } => {
                Some("narrow the command or pass a longer timeout".to_string())
            }
            SandboxError::CommandNotFound { .. } => {
                Some("see allowed_commands for what is installed".to_string())
            }
            _ => None,
        }
    }

    pub fn details(&self) -> Value {
        match self {
            SandboxError::Timeout {
                command,
                timeout_secs,
            } => json!({ "command": command, "timeout_seconds": timeout_secs }),
            SandboxError::CommandNotFound { command } | SandboxError::Cancelled { command } => {
                json!({ "command": command })
            }
            SandboxError::SpawnFailed { command, source }
            | SandboxError::WaitFailed { command, source } => {
                json!({ "command": command, "error": source.to_string() })
            }
            SandboxError::InvalidWorkingDir { path } => json!({ "path": path }),
        }
    }
}
