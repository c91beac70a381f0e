// error.rs — Error types for the versioned zone.

use serde_json::{json, Value};
use thiserror::Error;
use zs_policy::ErrorCode;
use zs_workspace::WorkspaceError;

#[derive(Debug, Error)]
pub enum VersionedError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// git could not be started at all.
    #[error("git is not available: {0}")]
    GitUnavailable(std::io::Error),

    /// A git invocation exited non-zero.
    #[error("git {args} failed: {stderr}")]
    Git { args: String, stderr: String },

    /// The store passed in is not the Documents zone.
    #[error("{zone} is not a versioned zone")]
    NotVersioned { zone: String },
}

impl VersionedError {
    pub fn code(&self) -> ErrorCode {
        match self {
            VersionedError::Workspace(e) => e.code(),
            VersionedError::NotVersioned { .. } => ErrorCode::ZoneForbidden,
            VersionedError::GitUnavailable(_) | VersionedError::Git { .. } => {
                ErrorCode::ExecError
            }
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            VersionedError::Workspace(e) => e.hint(),
            VersionedError::GitUnavailable(_) => {
                Some("Documents needs git installed on the host".to_string())
            }
            VersionedError::Git { .. } => Some(
                "the change is on disk but not committed; retry or commit with git add/commit"
                    .to_string(),
            ),
            VersionedError::NotVersioned { .. } => None,
        }
    }

    pub fn details(&self) -> Value {
        match self {
            VersionedError::Workspace(e) => e.details(),
            VersionedError::GitUnavailable(e) => json!({ "error": e.to_string() }),
            VersionedError::Git { args, stderr } => {
                let fragment: String = stderr.chars().take(500).collect();
                json!({ "git": args, "stderr": fragment })
            }
            VersionedError::NotVersioned { zone } => json!({ "zone": zone }),
        }
    }
}
