// lock.rs — Filesystem-resident edit locks.
//
// One JSON record per locked path at `<locks>/<path>.lock`. A lock is live
// until it is released or its recorded age passes the ceiling; there is no
// heartbeat. Time comes from a `Clock` so expiry can be tested without
// waiting.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::WorkspaceError;
use crate::fsops;

const LOCK_SUFFIX: &str = ".lock";

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The on-disk lock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub session_id: String,
    pub user_id: String,
    pub path: String,
    pub locked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Free,
    Held(LockRecord),
    Expired(LockRecord),
    /// The record exists but cannot be parsed.
    Corrupt,
}

/// Result of a successful `acquire`.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub record: LockRecord,
    /// Session whose expired lock was taken over, if any.
    pub reclaimed_from: Option<String>,
}

/// Manages the lock records of one zone.
#[derive(Debug, Clone)]
pub struct LockManager {
    locks_root: PathBuf,
    user_id: String,
    max_age: Duration,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    pub fn new(
        locks_root: impl Into<PathBuf>,
        user_id: impl Into<String>,
        max_age_hours: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let hours = i64::try_from(max_age_hours).unwrap_or(i64::MAX / 3600);
        Self {
            locks_root: locks_root.into(),
            user_id: user_id.into(),
            max_age: Duration::hours(hours),
            clock,
        }
    }

    pub fn locks_root(&self) -> &Path {
        &self.locks_root
    }

    pub fn lock_path(&self, relative: &str) -> PathBuf {
        self.locks_root.join(format!("{}{}", relative, LOCK_SUFFIX))
    }

    pub fn is_expired(&self, record: &LockRecord) -> bool {
        self.clock.now() - record.locked_at > self.max_age
    }

    pub fn inspect(&self, relative: &str) -> Result<LockState, WorkspaceError> {
        let path = self.lock_path(relative);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LockState::Free),
            Err(source) => return Err(WorkspaceError::IoError { path, source }),
        };
        let record: LockRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(_) => return Ok(LockState::Corrupt),
        };
        if self.is_expired(&record) {
            Ok(LockState::Expired(record))
        } else {
            Ok(LockState::Held(record))
        }
    }

    /// Take the lock on `relative` for `session_id`.
    ///
    /// Fails with `FileLocked` if the path, one of its ancestors, or anything
    /// below it carries a live lock of any session.
    pub fn acquire(&self, relative: &str, session_id: &str) -> Result<Acquired, WorkspaceError> {
        self.check_overlapping(relative)?;

        let mut reclaimed_from = None;
        match self.inspect(relative)? {
            LockState::Free => {}
            LockState::Held(record) => return Err(locked(relative, &record)),
            LockState::Expired(record) => {
                tracing::warn!(
                    path = relative,
                    session = %record.session_id,
                    "reclaiming expired lock"
                );
                fsops::remove_path(&self.lock_path(relative))?;
                reclaimed_from = Some(record.session_id);
            }
            LockState::Corrupt => {
                tracing::warn!(path = relative, "replacing corrupt lock record");
                fsops::remove_path(&self.lock_path(relative))?;
            }
        }

        let record = LockRecord {
            session_id: session_id.to_string(),
            user_id: self.user_id.clone(),
            path: relative.to_string(),
            locked_at: self.clock.now(),
        };
        self.create(relative, &record)?;
        tracing::info!(path = relative, session = session_id, "lock acquired");
        Ok(Acquired {
            record,
            reclaimed_from,
        })
    }

    fn create(&self, relative: &str, record: &LockRecord) -> Result<(), WorkspaceError> {
        let path = self.lock_path(relative);
        let parent = path.parent().unwrap_or(&self.locks_root).to_path_buf();
        fs::create_dir_all(&parent).map_err(WorkspaceError::io(&parent))?;
        let mut temp = NamedTempFile::new_in(&parent).map_err(WorkspaceError::io(&parent))?;
        serde_json::to_writer_pretty(temp.as_file_mut(), record)?;
        temp.flush().map_err(WorkspaceError::io(&path))?;
        match temp.persist_noclobber(&path) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                // Lost a race with another acquirer.
                match self.inspect(relative)? {
                    LockState::Held(other) | LockState::Expired(other) => {
                        Err(locked(relative, &other))
                    }
                    _ => Err(WorkspaceError::FileLocked {
                        path: relative.to_string(),
                        holder: None,
                        locked_at: None,
                    }),
                }
            }
            Err(e) => Err(WorkspaceError::IoError {
                path,
                source: e.error,
            }),
        }
    }

    fn check_overlapping(&self, relative: &str) -> Result<(), WorkspaceError> {
        let parts: Vec<&str> = relative.split('/').collect();
        for end in 1..parts.len() {
            let ancestor = parts[..end].join("/");
            if let LockState::Held(record) = self.inspect(&ancestor)? {
                return Err(locked(&ancestor, &record));
            }
        }
        let below = self.locks_root.join(relative);
        if below.is_dir() {
            for (path, state) in self.list_under(&below)? {
                if let LockState::Held(record) = state {
                    return Err(locked(&path, &record));
                }
            }
        }
        Ok(())
    }

    /// Remove the lock on `relative`. Returns false if there was none.
    pub fn release(&self, relative: &str) -> Result<bool, WorkspaceError> {
        let removed = fsops::remove_with_empty_parents(&self.lock_path(relative), &self.locks_root)?;
        if removed {
            tracing::info!(path = relative, "lock released");
        }
        Ok(removed)
    }

    /// Every lock record in the zone, keyed by locked path.
    pub fn list(&self) -> Result<Vec<(String, LockState)>, WorkspaceError> {
        if !self.locks_root.is_dir() {
            return Ok(Vec::new());
        }
        self.list_under(&self.locks_root)
    }

    fn list_under(&self, dir: &Path) -> Result<Vec<(String, LockState)>, WorkspaceError> {
        let mut locks = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.locks_root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            let Some(locked) = relative.strip_suffix(LOCK_SUFFIX) else {
                continue;
            };
            let state = self.inspect(locked)?;
            locks.push((locked.to_string(), state));
        }
        Ok(locks)
    }
}

fn locked(path: &str, record: &LockRecord) -> WorkspaceError {
    WorkspaceError::FileLocked {
        path: path.to_string(),
        holder: Some(record.session_id.clone()),
        locked_at: Some(record.locked_at),
    }
}
