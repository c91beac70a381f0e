// error.rs — Error types for the storage gateway.

use std::path::PathBuf;

use serde_json::{json, Value};
use thiserror::Error;
use zs_policy::ErrorCode;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A zone, lock or edit-session operation failed.
    #[error(transparent)]
    Workspace(#[from] zs_workspace::WorkspaceError),

    /// A Documents operation or commit failed.
    #[error(transparent)]
    Versioned(#[from] zs_versioned::VersionedError),

    /// A command could not be run to completion.
    #[error(transparent)]
    Sandbox(#[from] zs_sandbox::SandboxError),

    /// The command authorizer refused the request.
    #[error(transparent)]
    Denied(#[from] zs_policy::AuthorizationError),

    /// The built-in command tables could not be compiled.
    #[error("policy tables are invalid: {0}")]
    Policy(#[from] zs_policy::PolicyError),

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    /// The audit log could not be opened or written.
    #[error("audit log error: {0}")]
    Audit(String),
}

/// Convert AuditError to GatewayError (not a From-derive: AuditError wraps
/// io::Error, which the workspace variants already account for).
impl From<zs_audit::AuditError> for GatewayError {
    fn from(e: zs_audit::AuditError) -> Self {
        GatewayError::Audit(e.to_string())
    }
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Workspace(e) => e.code(),
            GatewayError::Versioned(e) => e.code(),
            GatewayError::Sandbox(e) => e.code(),
            GatewayError::Denied(e) => e.code(),
            GatewayError::Policy(_) | GatewayError::Config { .. } | GatewayError::Audit(_) => {
                ErrorCode::ExecError
            }
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            GatewayError::Workspace(e) => e.hint(),
            GatewayError::Versioned(e) => e.hint(),
            GatewayError::Sandbox(e) => e.hint(),
            GatewayError::Denied(e) => e.hint(),
            GatewayError::Config { .. } => {
                Some("fix the configuration file or remove it to use defaults".to_string())
            }
            GatewayError::Policy(_) | GatewayError::Audit(_) => None,
        }
    }

    pub fn details(&self) -> Value {
        match self {
            GatewayError::Workspace(e) => e.details(),
            GatewayError::Versioned(e) => e.details(),
            GatewayError::Sandbox(e) => e.details(),
            GatewayError::Denied(e) => e.details(),
            GatewayError::Config { path, reason } => json!({ "path": path, "reason": reason }),
            GatewayError::Policy(e) => json!({ "error": e.to_string() }),
            GatewayError::Audit(e) => json!({ "error": e }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zs_policy::AuthorizationError;
    use zs_workspace::WorkspaceError;

    #[test]
    fn wrapped_errors_keep_their_code() {
        let denied: GatewayError = AuthorizationError::CommandForbidden {
            command: "bash".to_string(),
            reason: "blacklisted".to_string(),
        }
        .into();
        assert_eq!(denied.code(), ErrorCode::CommandForbidden);
        assert_eq!(denied.details()["command"], "bash");

        let locked: GatewayError = WorkspaceError::FileLocked {
            path: "a.txt".to_string(),
            holder: Some("conv-1".to_string()),
            locked_at: None,
        }
        .into();
        assert_eq!(locked.code(), ErrorCode::FileLocked);
        assert!(locked.hint().is_some());
    }

    #[test]
    fn versioned_workspace_errors_surface_the_inner_code() {
        let inner = WorkspaceError::QuotaExceeded {
            used: 10,
            incoming: 5,
            quota: 12,
        };
        let err: GatewayError = zs_versioned::VersionedError::from(inner).into();
        assert_eq!(err.code(), ErrorCode::QuotaExceeded);
    }
}
