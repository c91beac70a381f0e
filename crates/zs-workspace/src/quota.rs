// quota.rs — Per-user byte accounting.
//
// Usage is derived by walking the user root on every check; there is no
// ledger to drift out of sync with the filesystem.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::WorkspaceError;

const MB: u64 = 1024 * 1024;

/// Bytes and regular-file count under a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeUsage {
    pub bytes: u64,
    pub files: u64,
    /// Size of the largest single file.
    pub largest: u64,
}

/// Sum regular-file sizes under `dir`, skipping entries that vanish mid-walk.
///
/// A missing `dir` counts as empty. Symlinks are not followed.
pub fn tree_usage(dir: &Path) -> Result<TreeUsage, WorkspaceError> {
    let mut usage = TreeUsage::default();
    if !dir.exists() {
        return Ok(usage);
    }
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => continue,
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => {
                usage.bytes += meta.len();
                usage.files += 1;
                usage.largest = usage.largest.max(meta.len());
            }
            Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(usage)
}

/// Enforces the per-user quota and the per-file ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaTracker {
    quota_bytes: u64,
    max_file_bytes: u64,
}

impl QuotaTracker {
    pub fn new(quota_mb: u64, max_file_mb: u64) -> Self {
        Self::from_bytes(quota_mb.saturating_mul(MB), max_file_mb.saturating_mul(MB))
    }

    pub fn from_bytes(quota_bytes: u64, max_file_bytes: u64) -> Self {
        Self {
            quota_bytes,
            max_file_bytes,
        }
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Total bytes currently stored under the user root.
    pub fn usage(&self, user_root: &Path) -> Result<u64, WorkspaceError> {
        Ok(tree_usage(user_root)?.bytes)
    }

    /// Fail if adding `incoming` bytes would push the user over quota.
    pub fn check(&self, user_root: &Path, incoming: u64) -> Result<(), WorkspaceError> {
        if incoming == 0 {
            return Ok(());
        }
        let used = self.usage(user_root)?;
        if used.saturating_add(incoming) > self.quota_bytes {
            tracing::warn!(used, incoming, quota = self.quota_bytes, "quota exceeded");
            return Err(WorkspaceError::QuotaExceeded {
                used,
                incoming,
                quota: self.quota_bytes,
            });
        }
        Ok(())
    }

    pub fn check_single_file(&self, bytes: u64) -> Result<(), WorkspaceError> {
        if bytes > self.max_file_bytes {
            return Err(WorkspaceError::FileTooLarge {
                size: bytes,
                limit: self.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Apply the per-file ceiling to every file of a tree about to land.
    pub fn check_each_file(&self, incoming: &TreeUsage) -> Result<(), WorkspaceError> {
        self.check_single_file(incoming.largest)
    }
}
