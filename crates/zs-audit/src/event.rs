// event.rs — One audited storage operation.
//
// Every operation, whether it succeeded, was refused before running, or
// failed while running, produces exactly one event. Events are chained by
// `previous_hash` when appended to the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zs_policy::ErrorCode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    /// Refused by a pre-flight check; nothing was changed.
    Denied,
    /// Authorized, but failed while running.
    Failed,
}

impl AuditOutcome {
    /// Classify a failure code.
    pub fn for_error(code: ErrorCode) -> Self {
        if code.is_preflight() {
            AuditOutcome::Denied
        } else {
            AuditOutcome::Failed
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub conversation_id: String,

    /// Operation name, e.g. "storage_write" or "edit_save".
    pub operation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Path or command the operation acted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    pub outcome: AuditOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,

    /// SHA-256 of written content, when the operation carried any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    /// Commit recorded in Documents, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    /// Hash of the previous line in the log; None for the first event.
    pub previous_hash: Option<String>,

    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        operation: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            operation: operation.into(),
            zone: None,
            target: None,
            outcome,
            error_code: None,
            content_hash: None,
            commit: None,
            previous_hash: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_error(mut self, code: ErrorCode) -> Self {
        self.error_code = Some(code);
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
