// error.rs — Error types for the policy subsystem.

use serde_json::{json, Value};
use thiserror::Error;

use crate::code::ErrorCode;

/// Errors raised while building the command policy tables.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A guard pattern in the command tables failed to compile.
    #[error("invalid guard pattern '{pattern}' for '{command}': {reason}")]
    InvalidPattern {
        command: String,
        pattern: String,
        reason: String,
    },
}

/// Why a command request was refused. Every variant is a pre-flight decision:
/// nothing has been spawned when one of these is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    /// An argument carries shell syntax or a forbidden option.
    #[error("argument '{argument}' is not allowed: {reason}")]
    ArgumentForbidden { argument: String, reason: String },

    /// The command (or git subcommand) is never allowed.
    #[error("command '{command}' is forbidden: {reason}")]
    CommandForbidden { command: String, reason: String },

    /// The command is not on any whitelist.
    #[error("command '{command}' is not in the whitelist")]
    CommandNotFound { command: String },

    /// The command is known but the zone's capability level does not allow it.
    #[error("command '{command}' is not allowed in this zone: {reason}")]
    ZoneForbidden { command: String, reason: String },

    /// A path-like argument resolves outside the zone.
    #[error("argument '{argument}' escapes the zone: {reason}")]
    PathEscape { argument: String, reason: String },
}

impl AuthorizationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthorizationError::ArgumentForbidden { .. } => ErrorCode::ArgumentForbidden,
            AuthorizationError::CommandForbidden { .. } => ErrorCode::CommandForbidden,
            AuthorizationError::CommandNotFound { .. } => ErrorCode::CommandNotFound,
            AuthorizationError::ZoneForbidden { .. } => ErrorCode::ZoneForbidden,
            AuthorizationError::PathEscape { .. } => ErrorCode::PathEscape,
        }
    }

    /// Short advice for the caller on how to rephrase the request.
    pub fn hint(&self) -> Option<String> {
        match self {
            AuthorizationError::ArgumentForbidden { .. } => Some(
                "arguments are passed verbatim without a shell; drop pipes, redirects, \
                 substitutions and in-place/exec options"
                    .to_string(),
            ),
            AuthorizationError::CommandForbidden { .. } => {
                Some("use a whitelisted command; see allowed_commands".to_string())
            }
            AuthorizationError::CommandNotFound { .. } => {
                Some("see allowed_commands for the commands available in each zone".to_string())
            }
            AuthorizationError::ZoneForbidden { .. } => Some(
                "Uploads is read-only; copy the file to Storage or Documents first".to_string(),
            ),
            AuthorizationError::PathEscape { .. } => {
                Some("use paths relative to the zone root".to_string())
            }
        }
    }

    pub fn details(&self) -> Value {
        match self {
            AuthorizationError::ArgumentForbidden { argument, reason }
            | AuthorizationError::PathEscape { argument, reason } => {
                json!({ "argument": argument, "reason": reason })
            }
            AuthorizationError::CommandForbidden { command, reason }
            | AuthorizationError::ZoneForbidden { command, reason } => {
                json!({ "command": command, "reason": reason })
            }
            AuthorizationError::CommandNotFound { command } => json!({ "command": command }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_details_line_up() {
        let err = AuthorizationError::PathEscape {
            argument: "../x".to_string(),
            reason: "climbs above the zone root".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::PathEscape);
        assert_eq!(err.details()["argument"], "../x");
        assert!(err.hint().is_some());
        assert!(err.to_string().contains("../x"));
    }
}
