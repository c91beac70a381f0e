// error.rs — Error types for the workspace subsystem.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use zs_policy::ErrorCode;

const MB: f64 = 1024.0 * 1024.0;

/// Errors that can occur during zone operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A caller-supplied path would leave the zone root.
    #[error("path '{path}' escapes the zone: {reason}")]
    PathEscape { path: String, reason: String },

    /// A user or conversation id is not a safe single path component.
    #[error("invalid {kind} '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("file not found: '{path}'")]
    FileNotFound { path: String },

    /// A file operation targeted a directory.
    #[error("'{path}' is a directory")]
    NotAFile { path: String },

    /// No usable edit session for this path and session.
    #[error("no edit session for '{path}': {reason}")]
    NoEditSession { path: String, reason: String },

    /// Another session holds a live lock on the path (or an overlapping one).
    #[error("'{path}' is locked by session '{}'", .holder.as_deref().unwrap_or("unknown"))]
    FileLocked {
        path: String,
        holder: Option<String>,
        locked_at: Option<DateTime<Utc>>,
    },

    /// The write would push the user's total usage over the quota.
    #[error("quota exceeded: {used} bytes used + {incoming} incoming > {quota} allowed")]
    QuotaExceeded { used: u64, incoming: u64, quota: u64 },

    /// A single file would exceed the per-file ceiling.
    #[error("file too large: {size} bytes > {limit} allowed")]
    FileTooLarge { size: u64, limit: u64 },

    /// The zone's capability level does not allow the operation.
    #[error("operation not allowed in {zone}: {reason}")]
    ZoneForbidden { zone: String, reason: String },

    /// A tree holds symlinks, special files or repository metadata, which
    /// are never copied; the operation would silently lose them.
    #[error("'{path}' contains entries that cannot be copied: {}", .entries.join(", "))]
    UncopyableEntries { path: String, entries: Vec<String> },

    /// Failed to serialize/deserialize a lock record.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl WorkspaceError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| WorkspaceError::IoError { path, source }
    }

    pub(crate) fn escape(path: &str, reason: impl Into<String>) -> Self {
        WorkspaceError::PathEscape {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            WorkspaceError::PathEscape { .. } | WorkspaceError::InvalidIdentifier { .. } => {
                ErrorCode::PathEscape
            }
            WorkspaceError::FileNotFound { .. } | WorkspaceError::NoEditSession { .. } => {
                ErrorCode::FileNotFound
            }
            WorkspaceError::FileLocked { .. } => ErrorCode::FileLocked,
            WorkspaceError::QuotaExceeded { .. } | WorkspaceError::FileTooLarge { .. } => {
                ErrorCode::QuotaExceeded
            }
            WorkspaceError::ZoneForbidden { .. } | WorkspaceError::UncopyableEntries { .. } => {
                ErrorCode::ZoneForbidden
            }
            WorkspaceError::IoError { .. }
            | WorkspaceError::NotAFile { .. }
            | WorkspaceError::SerializationError(_) => ErrorCode::ExecError,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            WorkspaceError::PathEscape { .. } => {
                Some("use relative paths that stay inside the zone".to_string())
            }
            WorkspaceError::FileNotFound { .. } => {
                Some("check the path with ls or find first".to_string())
            }
            WorkspaceError::NoEditSession { .. } => {
                Some("open the file with edit_open first".to_string())
            }
            WorkspaceError::FileLocked { .. } => Some(
                "wait for the other session, or use force_unlock / maintenance".to_string(),
            ),
            WorkspaceError::QuotaExceeded { .. } => {
                Some("delete files you no longer need; see stats".to_string())
            }
            WorkspaceError::FileTooLarge { limit, .. } => Some(format!(
                "max file size is {:.0} MB",
                *limit as f64 / MB
            )),
            WorkspaceError::ZoneForbidden { .. } => {
                Some("copy the file to Storage or Documents to modify it".to_string())
            }
            WorkspaceError::UncopyableEntries { .. } => {
                Some("remove or replace the listed entries first".to_string())
            }
            _ => None,
        }
    }

    pub fn details(&self) -> Value {
        match self {
            WorkspaceError::IoError { path, source } => {
                json!({ "path": path, "error": source.to_string() })
            }
            WorkspaceError::PathEscape { path, reason } => json!({ "path": path, "reason": reason }),
            WorkspaceError::InvalidIdentifier { kind, value } => {
                json!({ "kind": kind, "value": value })
            }
            WorkspaceError::FileNotFound { path } | WorkspaceError::NotAFile { path } => {
                json!({ "path": path })
            }
            WorkspaceError::NoEditSession { path, reason } => {
                json!({ "path": path, "reason": reason })
            }
            WorkspaceError::FileLocked {
                path,
                holder,
                locked_at,
            } => json!({
                "path": path,
                "locked_by": holder,
                "locked_since": locked_at.map(|t| t.to_rfc3339()),
            }),
            WorkspaceError::QuotaExceeded {
                used,
                incoming,
                quota,
            } => json!({
                "used_mb": format!("{:.2}", *used as f64 / MB),
                "incoming_mb": format!("{:.2}", *incoming as f64 / MB),
                "quota_mb": format!("{:.0}", *quota as f64 / MB),
            }),
            WorkspaceError::FileTooLarge { size, limit } => json!({
                "size_mb": format!("{:.2}", *size as f64 / MB),
                "max_mb": format!("{:.0}", *limit as f64 / MB),
            }),
            WorkspaceError::ZoneForbidden { zone, reason } => {
                json!({ "zone": zone, "reason": reason })
            }
            WorkspaceError::UncopyableEntries { path, entries } => {
                json!({ "path": path, "entries": entries })
            }
            WorkspaceError::SerializationError(e) => json!({ "error": e.to_string() }),
        }
    }
}

impl From<walkdir::Error> for WorkspaceError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
        WorkspaceError::IoError { path, source }
    }
}
