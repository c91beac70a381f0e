// config.rs — Storage service configuration.
//
// StorageConfig is read once at start-up (usually from a TOML file) and is
// immutable afterwards. Every field has a default, so an empty file or a
// bare `StorageConfig::new(root)` is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zs_sandbox::ExecLimits;
use zs_versioned::CommitIdentity;
use zs_workspace::QuotaTracker;

use crate::error::GatewayError;

/// Configuration for the storage service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per user.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Total bytes a user may keep, across all zones, in MB.
    #[serde(default = "default_quota_per_user_mb")]
    pub quota_per_user_mb: u64,

    /// Largest single file, in MB.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Edit locks older than this are treated as abandoned.
    #[serde(default = "default_lock_max_age_hours")]
    pub lock_max_age_hours: u64,

    /// Timeout for commands that do not ask for one, in seconds.
    #[serde(default = "default_exec_timeout_default")]
    pub exec_timeout_default: u64,

    /// Upper bound on any requested timeout, in seconds.
    #[serde(default = "default_exec_timeout_max")]
    pub exec_timeout_max: u64,

    /// Per-stream cap on captured command output.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Audit log location. Defaults to `<storage_root>/.audit/audit.jsonl`.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,

    /// Set to false to run without an audit log.
    #[serde(default = "default_audit_enabled")]
    pub audit_enabled: bool,

    /// Author of the commits recorded in Documents.
    #[serde(default)]
    pub commit: CommitIdentity,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/users")
}

fn default_quota_per_user_mb() -> u64 {
    1000
}

fn default_max_file_size_mb() -> u64 {
    300
}

fn default_lock_max_age_hours() -> u64 {
    24
}

fn default_exec_timeout_default() -> u64 {
    30
}

fn default_exec_timeout_max() -> u64 {
    300
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_audit_enabled() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(default_storage_root())
    }
}

impl StorageConfig {
    /// Defaults, rooted at `storage_root`.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            quota_per_user_mb: default_quota_per_user_mb(),
            max_file_size_mb: default_max_file_size_mb(),
            lock_max_age_hours: default_lock_max_age_hours(),
            exec_timeout_default: default_exec_timeout_default(),
            exec_timeout_max: default_exec_timeout_max(),
            max_output_bytes: default_max_output_bytes(),
            audit_log: None,
            audit_enabled: default_audit_enabled(),
            commit: CommitIdentity::default(),
        }
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let content = std::fs::read_to_string(path).map_err(|e| GatewayError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| GatewayError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn with_quota_mb(mut self, quota_mb: u64) -> Self {
        self.quota_per_user_mb = quota_mb;
        self
    }

    pub fn with_max_file_size_mb(mut self, max_mb: u64) -> Self {
        self.max_file_size_mb = max_mb;
        self
    }

    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    pub fn exec_limits(&self) -> ExecLimits {
        ExecLimits {
            default_timeout_secs: self.exec_timeout_default,
            max_timeout_secs: self.exec_timeout_max,
            max_output_bytes: self.max_output_bytes,
        }
    }

    pub fn quota(&self) -> QuotaTracker {
        QuotaTracker::new(self.quota_per_user_mb, self.max_file_size_mb)
    }

    /// Where audit records go, or `None` when auditing is off.
    pub fn audit_log_path(&self) -> Option<PathBuf> {
        if !self.audit_enabled {
            return None;
        }
        Some(
            self.audit_log
                .clone()
                .unwrap_or_else(|| self.storage_root.join(".audit").join("audit.jsonl")),
        )
    }
}
