// limits.rs — Timeout and output bounds for command execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_timeout_secs() -> u64 {
    300
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

/// Bounds applied to every spawned command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecLimits {
    /// Used when the caller does not ask for a timeout.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Upper bound on any requested timeout.
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,

    /// Per-stream capture limit; output beyond it is drained and dropped.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            max_timeout_secs: default_max_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl ExecLimits {
    /// Effective timeout in whole seconds, clamped to `[1, max_timeout_secs]`.
    pub fn timeout_secs(&self, requested: Option<u64>) -> u64 {
        let max = self.max_timeout_secs.max(1);
        requested
            .unwrap_or(self.default_timeout_secs)
            .clamp(1, max)
    }

    pub fn timeout(&self, requested: Option<u64>) -> Duration {
        Duration::from_secs(self.timeout_secs(requested))
    }
}
