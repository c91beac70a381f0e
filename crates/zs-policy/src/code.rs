// code.rs — Stable error codes surfaced to callers.
//
// Every failure anywhere in the workspace maps onto exactly one of these
// codes. They appear verbatim in the `error` field of the response envelope,
// so the spelling is part of the external contract.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PathEscape,
    CommandForbidden,
    ArgumentForbidden,
    FileNotFound,
    FileLocked,
    QuotaExceeded,
    Timeout,
    CommandNotFound,
    ExecError,
    ZoneForbidden,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PathEscape => "PATH_ESCAPE",
            ErrorCode::CommandForbidden => "COMMAND_FORBIDDEN",
            ErrorCode::ArgumentForbidden => "ARGUMENT_FORBIDDEN",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::FileLocked => "FILE_LOCKED",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::CommandNotFound => "COMMAND_NOT_FOUND",
            ErrorCode::ExecError => "EXEC_ERROR",
            ErrorCode::ZoneForbidden => "ZONE_FORBIDDEN",
        }
    }

    /// Policy violations and resource conflicts are decided before anything
    /// runs or is written; retrying the same request cannot succeed.
    pub fn is_preflight(&self) -> bool {
        !matches!(self, ErrorCode::Timeout | ErrorCode::ExecError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
