// editzone.rs — Lock-protected copy-on-write editing.
//
// edit_open locks a path and copies it to `editzone/<session>/<path>`; the
// session edits the copy; edit_save swaps it over the original and releases
// the lock; edit_cancel throws the copy away. The original is never touched
// until save, and save either fully replaces it or leaves it as it was.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::WorkspaceError;
use crate::fsops;
use crate::lock::{Clock, LockManager, LockState};
use crate::quota::tree_usage;
use crate::resolve::{PathResolver, ResolvedPath};
use crate::zone::{write_checked, WriteOutcome, Zone, ZoneStore, GIT_DIR};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOpened {
    pub path: String,
    /// Where the session's commands run.
    pub working_copy: PathBuf,
    /// False when the path did not exist and an empty placeholder was created.
    pub existed: bool,
    pub is_dir: bool,
    /// Session whose expired lock was taken over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reclaimed_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSaved {
    pub path: String,
    /// False when the save created the path.
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceUnlocked {
    pub path: String,
    pub lock_removed: bool,
    /// Sessions whose working copies were discarded.
    pub copies_removed: Vec<String>,
}

/// What a maintenance sweep cleaned up, as `<Zone>/<path>` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub expired_locks: Vec<String>,
    pub corrupted_locks: Vec<String>,
    pub orphan_editzones: Vec<String>,
}

impl MaintenanceReport {
    pub fn merge(&mut self, other: MaintenanceReport) {
        self.expired_locks.extend(other.expired_locks);
        self.corrupted_locks.extend(other.corrupted_locks);
        self.orphan_editzones.extend(other.orphan_editzones);
    }

    pub fn is_empty(&self) -> bool {
        self.expired_locks.is_empty()
            && self.corrupted_locks.is_empty()
            && self.orphan_editzones.is_empty()
    }
}

/// Safe-edit sessions for one writable zone.
#[derive(Debug, Clone)]
pub struct EditZone {
    store: ZoneStore,
    locks: LockManager,
    editzone_root: PathBuf,
    session_id: String,
}

impl EditZone {
    pub fn new(
        store: ZoneStore,
        lock_max_age_hours: u64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WorkspaceError> {
        let zone = store.zone();
        if !zone.supports_edit() {
            return Err(WorkspaceError::ZoneForbidden {
                zone: zone.to_string(),
                reason: "edit sessions require a writable zone".to_string(),
            });
        }
        let layout = store.layout();
        let locks = LockManager::new(
            layout.locks_root(zone),
            layout.user_id(),
            lock_max_age_hours,
            clock,
        );
        let editzone_root = layout.editzone_root(zone);
        let session_id = layout.conversation_id().to_string();
        Ok(Self {
            store,
            locks,
            editzone_root,
            session_id,
        })
    }

    pub fn zone(&self) -> Zone {
        self.store.zone()
    }

    pub fn store(&self) -> &ZoneStore {
        &self.store
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn session_dir(&self) -> PathBuf {
        self.editzone_root.join(&self.session_id)
    }

    fn working_copy(&self, session: &str, relative: &str) -> PathBuf {
        self.editzone_root.join(session).join(relative)
    }

    fn resolve_target(&self, path: &str) -> Result<ResolvedPath, WorkspaceError> {
        let resolved = self.store.resolve(path)?;
        if resolved.is_root() {
            return Err(WorkspaceError::escape(path, "cannot edit the zone root"));
        }
        Ok(resolved)
    }

    /// Lock `path` for this session and copy it into the session's editzone.
    pub fn open(&self, path: &str) -> Result<EditOpened, WorkspaceError> {
        let target = self.resolve_target(path)?;
        let acquired = self.locks.acquire(&target.relative, &self.session_id)?;
        if let Some(previous) = &acquired.reclaimed_from {
            fsops::remove_with_empty_parents(
                &self.working_copy(previous, &target.relative),
                &self.editzone_root,
            )?;
        }

        let copy = self.working_copy(&self.session_id, &target.relative);
        match self.populate(&target, &copy) {
            Ok((existed, is_dir)) => {
                tracing::info!(
                    zone = %self.zone(),
                    path = %target.relative,
                    session = %self.session_id,
                    existed,
                    "edit session opened"
                );
                Ok(EditOpened {
                    path: target.relative,
                    working_copy: copy,
                    existed,
                    is_dir,
                    reclaimed_from: acquired.reclaimed_from,
                })
            }
            Err(err) => {
                let _ = fsops::remove_with_empty_parents(&copy, &self.editzone_root);
                let _ = self.locks.release(&target.relative);
                Err(err)
            }
        }
    }

    fn populate(&self, target: &ResolvedPath, copy: &Path) -> Result<(bool, bool), WorkspaceError> {
        fsops::remove_path(copy)?;
        match fs::metadata(&target.absolute) {
            Ok(meta) => {
                let size = tree_usage(&target.absolute)?;
                let quota = self.store.quota();
                quota.check_each_file(&size)?;
                quota.check(&self.store.layout().user_root(), size.bytes)?;
                // Saving swaps the whole tree, so anything left out of the
                // copy would be lost.
                let skipped = fsops::uncopyable_entries(&target.absolute)?;
                if !skipped.is_empty() {
                    return Err(WorkspaceError::UncopyableEntries {
                        path: target.relative.clone(),
                        entries: skipped,
                    });
                }
                fsops::copy_tree(&target.absolute, copy)?;
                Ok((true, meta.is_dir()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fsops::write_atomic(copy, b"", false)?;
                Ok((false, false))
            }
            Err(source) => Err(WorkspaceError::IoError {
                path: target.absolute.clone(),
                source,
            }),
        }
    }

    /// Resolver rooted at this session's editzone.
    pub fn session_resolver(&self) -> Result<PathResolver, WorkspaceError> {
        let dir = self.session_dir();
        if !dir.is_dir() {
            return Err(WorkspaceError::ZoneForbidden {
                zone: self.zone().to_string(),
                reason: "no edit session is open in this conversation".to_string(),
            });
        }
        Ok(PathResolver::new(dir)?.with_reserved(GIT_DIR))
    }

    /// Write into the session's working copies.
    pub fn write(&self, path: &str, content: &[u8], append: bool) -> Result<WriteOutcome, WorkspaceError> {
        let resolver = self.session_resolver()?;
        let resolved = resolver.resolve(path)?;
        let outcome = write_checked(
            self.store.quota(),
            &self.store.layout().user_root(),
            &resolved,
            content,
            append,
        )?;
        tracing::info!(zone = %self.zone(), path = %outcome.path, "working copy written");
        Ok(outcome)
    }

    /// Check that this session holds a live lock on `relative`.
    fn require_own_lock(&self, relative: &str, allow_expired: bool) -> Result<(), WorkspaceError> {
        match self.locks.inspect(relative)? {
            LockState::Held(record) if record.session_id == self.session_id => Ok(()),
            LockState::Expired(record) if record.session_id == self.session_id => {
                if allow_expired {
                    Ok(())
                } else {
                    Err(WorkspaceError::NoEditSession {
                        path: relative.to_string(),
                        reason: "the edit lock has expired".to_string(),
                    })
                }
            }
            LockState::Held(record) | LockState::Expired(record) => {
                Err(WorkspaceError::FileLocked {
                    path: relative.to_string(),
                    holder: Some(record.session_id),
                    locked_at: Some(record.locked_at),
                })
            }
            LockState::Corrupt => Err(WorkspaceError::FileLocked {
                path: relative.to_string(),
                holder: None,
                locked_at: None,
            }),
            LockState::Free => Err(WorkspaceError::NoEditSession {
                path: relative.to_string(),
                reason: "no edit session is open for this path".to_string(),
            }),
        }
    }

    /// Replace the original with the working copy and end the session.
    pub fn save(&self, path: &str) -> Result<EditSaved, WorkspaceError> {
        let target = self.resolve_target(path)?;
        self.require_own_lock(&target.relative, false)?;

        let copy = self.working_copy(&self.session_id, &target.relative);
        if fs::symlink_metadata(&copy).is_err() {
            return Err(WorkspaceError::NoEditSession {
                path: target.relative,
                reason: "the working copy is missing".to_string(),
            });
        }

        let replaced = replace_atomic(&copy, &target.absolute)?;
        fsops::prune_empty_parents(&copy, &self.editzone_root);
        self.locks.release(&target.relative)?;
        tracing::info!(
            zone = %self.zone(),
            path = %target.relative,
            session = %self.session_id,
            "edit session saved"
        );
        Ok(EditSaved {
            path: target.relative,
            replaced,
        })
    }

    /// Discard the working copy and release the lock.
    pub fn cancel(&self, path: &str) -> Result<String, WorkspaceError> {
        let target = self.resolve_target(path)?;
        self.require_own_lock(&target.relative, true)?;
        fsops::remove_with_empty_parents(
            &self.working_copy(&self.session_id, &target.relative),
            &self.editzone_root,
        )?;
        self.locks.release(&target.relative)?;
        tracing::info!(zone = %self.zone(), path = %target.relative, "edit session cancelled");
        Ok(target.relative)
    }

    /// Drop the lock on `path` and every session's working copy of it.
    pub fn force_unlock(&self, path: &str) -> Result<ForceUnlocked, WorkspaceError> {
        let target = self.resolve_target(path)?;
        let lock_removed = self.locks.release(&target.relative)?;
        let mut copies_removed = Vec::new();
        for session in self.sessions()? {
            let copy = self.working_copy(&session, &target.relative);
            if fsops::remove_with_empty_parents(&copy, &self.editzone_root)? {
                copies_removed.push(session);
            }
        }
        tracing::warn!(
            zone = %self.zone(),
            path = %target.relative,
            lock_removed,
            copies = copies_removed.len(),
            "force unlock"
        );
        Ok(ForceUnlocked {
            path: target.relative,
            lock_removed,
            copies_removed,
        })
    }

    fn sessions(&self) -> Result<Vec<String>, WorkspaceError> {
        let reader = match fs::read_dir(&self.editzone_root) {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(WorkspaceError::IoError {
                    path: self.editzone_root.clone(),
                    source,
                })
            }
        };
        let mut sessions = Vec::new();
        for entry in reader {
            let entry = entry.map_err(WorkspaceError::io(&self.editzone_root))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                sessions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    /// Remove expired and corrupt locks, and working copies no lock covers.
    pub fn sweep(&self) -> Result<MaintenanceReport, WorkspaceError> {
        let zone = self.zone();
        let mut report = MaintenanceReport::default();

        for (relative, state) in self.locks.list()? {
            match state {
                LockState::Expired(record) => {
                    self.locks.release(&relative)?;
                    fsops::remove_with_empty_parents(
                        &self.working_copy(&record.session_id, &relative),
                        &self.editzone_root,
                    )?;
                    report.expired_locks.push(format!("{}/{}", zone, relative));
                }
                LockState::Corrupt => {
                    self.locks.release(&relative)?;
                    report.corrupted_locks.push(format!("{}/{}", zone, relative));
                }
                LockState::Held(_) | LockState::Free => {}
            }
        }

        for session in self.sessions()? {
            let session_dir = self.editzone_root.join(&session);
            let mut orphans = Vec::new();
            for entry in WalkDir::new(&session_dir).min_depth(1).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&session_dir) else {
                    continue;
                };
                let relative = relative.to_string_lossy().replace('\\', "/");
                if !self.covered_by_lock(&relative, &session)? {
                    orphans.push((entry.path().to_path_buf(), relative));
                }
            }
            for (path, relative) in orphans {
                fsops::remove_with_empty_parents(&path, &self.editzone_root)?;
                report.orphan_editzones.push(format!("{}/{}", zone, relative));
            }
            // An emptied session directory goes too.
            let _ = fs::remove_dir(&session_dir);
        }

        if !report.is_empty() {
            tracing::warn!(
                zone = %zone,
                expired = report.expired_locks.len(),
                corrupted = report.corrupted_locks.len(),
                orphans = report.orphan_editzones.len(),
                "maintenance cleaned up edit state"
            );
        }
        Ok(report)
    }

    /// Whether `session` holds a lock on `relative` or one of its ancestors.
    fn covered_by_lock(&self, relative: &str, session: &str) -> Result<bool, WorkspaceError> {
        let parts: Vec<&str> = relative.split('/').collect();
        for end in 1..=parts.len() {
            let prefix = parts[..end].join("/");
            if let LockState::Held(record) = self.locks.inspect(&prefix)? {
                if record.session_id == session {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Move `copy` over `target`. Returns whether `target` existed.
///
/// A plain file replacing a plain file is a single rename. Anything else
/// goes through a staged swap: the original is renamed aside, the copy
/// renamed in, and the original restored if that fails.
fn replace_atomic(copy: &Path, target: &Path) -> Result<bool, WorkspaceError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(WorkspaceError::io(parent))?;
    }
    let copy_is_dir = fs::symlink_metadata(copy)
        .map_err(WorkspaceError::io(copy))?
        .is_dir();
    let target_meta = match fs::symlink_metadata(target) {
        Ok(meta) => Some(meta),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(source) => {
            return Err(WorkspaceError::IoError {
                path: target.to_path_buf(),
                source,
            })
        }
    };

    let Some(target_meta) = target_meta else {
        fs::rename(copy, target).map_err(WorkspaceError::io(target))?;
        return Ok(false);
    };
    if !copy_is_dir && !target_meta.is_dir() {
        fs::rename(copy, target).map_err(WorkspaceError::io(target))?;
        return Ok(true);
    }

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup = target.with_file_name(format!(".zs-swap-{}-{}", name, uuid::Uuid::new_v4()));
    fs::rename(target, &backup).map_err(WorkspaceError::io(target))?;
    if let Err(source) = fs::rename(copy, target) {
        if let Err(restore) = fs::rename(&backup, target) {
            tracing::error!(
                path = %target.display(),
                backup = %backup.display(),
                error = %restore,
                "failed to restore original after swap failure"
            );
        }
        return Err(WorkspaceError::IoError {
            path: target.to_path_buf(),
            source,
        });
    }
    fsops::remove_path(&backup)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::ManualClock;
    use crate::quota::QuotaTracker;
    use crate::zone::ZoneLayout;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn edit_zone(root: &Path, conversation: &str, clock: Arc<ManualClock>) -> EditZone {
        let layout = ZoneLayout::new(root, "alice", conversation).unwrap();
        let store =
            ZoneStore::open(&layout, Zone::Storage, QuotaTracker::from_bytes(10_000, 5_000))
                .unwrap();
        EditZone::new(store, 24, clock).unwrap()
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc::now()))
    }

    #[test]
    fn uploads_cannot_be_edited() {
        let dir = tempdir().unwrap();
        let layout = ZoneLayout::new(dir.path(), "alice", "c1").unwrap();
        let store = ZoneStore::open(&layout, Zone::Uploads, QuotaTracker::new(1, 1)).unwrap();
        assert!(matches!(
            EditZone::new(store, 24, clock()),
            Err(WorkspaceError::ZoneForbidden { .. })
        ));
    }

    #[test]
    fn open_write_save_replaces_original() {
        let dir = tempdir().unwrap();
        let edits = edit_zone(dir.path(), "c1", clock());
        edits.store().write("doc.txt", b"v1", false).unwrap();

        let opened = edits.open("doc.txt").unwrap();
        assert!(opened.existed);
        assert_eq!(fs::read(&opened.working_copy).unwrap(), b"v1");

        edits.write("doc.txt", b"v2", false).unwrap();
        // The original is untouched until save.
        assert_eq!(edits.store().read("doc.txt").unwrap(), b"v1");

        let saved = edits.save("doc.txt").unwrap();
        assert!(saved.replaced);
        assert_eq!(edits.store().read("doc.txt").unwrap(), b"v2");
        assert_eq!(edits.locks().inspect("doc.txt").unwrap(), LockState::Free);
        assert!(!opened.working_copy.exists());
    }

    #[test]
    fn cancel_leaves_original_untouched() {
        let dir = tempdir().unwrap();
        let edits = edit_zone(dir.path(), "c1", clock());
        edits.store().write("doc.txt", b"v1", false).unwrap();
        edits.open("doc.txt").unwrap();
        edits.write("doc.txt", b"scratch", false).unwrap();
        edits.cancel("doc.txt").unwrap();
        assert_eq!(edits.store().read("doc.txt").unwrap(), b"v1");
        assert!(matches!(
            edits.cancel("doc.txt"),
            Err(WorkspaceError::NoEditSession { .. })
        ));
    }

    #[test]
    fn other_session_is_locked_out() {
        let dir = tempdir().unwrap();
        let clock = clock();
        let first = edit_zone(dir.path(), "c1", clock.clone());
        let second = edit_zone(dir.path(), "c2", clock);
        first.store().write("doc.txt", b"v1", false).unwrap();
        first.open("doc.txt").unwrap();

        assert!(matches!(
            second.open("doc.txt"),
            Err(WorkspaceError::FileLocked { .. })
        ));
        assert!(matches!(
            second.cancel("doc.txt"),
            Err(WorkspaceError::FileLocked { .. })
        ));
        assert!(matches!(
            second.save("doc.txt"),
            Err(WorkspaceError::FileLocked { .. })
        ));
        // No session dir for c2, so writes have nowhere to go.
        assert!(matches!(
            second.write("doc.txt", b"x", false),
            Err(WorkspaceError::ZoneForbidden { .. })
        ));
    }

    #[test]
    fn expired_lock_can_be_taken_over() {
        let dir = tempdir().unwrap();
        let clock = clock();
        let first = edit_zone(dir.path(), "c1", clock.clone());
        let second = edit_zone(dir.path(), "c2", clock.clone());
        first.store().write("doc.txt", b"v1", false).unwrap();
        let stale = first.open("doc.txt").unwrap();

        clock.advance(Duration::hours(25));
        let opened = second.open("doc.txt").unwrap();
        assert_eq!(opened.reclaimed_from.as_deref(), Some("c1"));
        assert!(!stale.working_copy.exists());
        assert!(matches!(
            first.save("doc.txt"),
            Err(WorkspaceError::FileLocked { .. })
        ));
    }

    #[test]
    fn opening_missing_path_creates_placeholder() {
        let dir = tempdir().unwrap();
        let edits = edit_zone(dir.path(), "c1", clock());
        let opened = edits.open("new/file.md").unwrap();
        assert!(!opened.existed);
        edits.write("new/file.md", b"# title", false).unwrap();
        let saved = edits.save("new/file.md").unwrap();
        assert!(!saved.replaced);
        assert_eq!(edits.store().read("new/file.md").unwrap(), b"# title");
    }

    #[test]
    fn directory_edit_swaps_whole_tree() {
        let dir = tempdir().unwrap();
        let edits = edit_zone(dir.path(), "c1", clock());
        edits.store().write("site/index.html", b"old", false).unwrap();
        edits.store().write("site/gone.css", b"x", false).unwrap();

        let opened = edits.open("site").unwrap();
        assert!(opened.is_dir);
        edits.write("site/index.html", b"new", false).unwrap();
        fs::remove_file(opened.working_copy.join("gone.css")).unwrap();

        edits.save("site").unwrap();
        assert_eq!(edits.store().read("site/index.html").unwrap(), b"new");
        assert!(matches!(
            edits.store().read("site/gone.css"),
            Err(WorkspaceError::FileNotFound { .. })
        ));
        let leftovers: Vec<_> = fs::read_dir(edits.store().data_root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".zs-swap"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn directory_with_an_oversized_file_cannot_be_opened() {
        let dir = tempdir().unwrap();
        let edits = edit_zone(dir.path(), "c1", clock());
        let big = edits.store().data_root().join("site/assets/big.bin");
        fs::create_dir_all(big.parent().unwrap()).unwrap();
        // Over the 5000-byte file ceiling, under the 10000-byte quota.
        fs::write(&big, vec![0u8; 6_000]).unwrap();

        assert!(matches!(
            edits.open("site"),
            Err(WorkspaceError::FileTooLarge { size: 6_000, .. })
        ));
        assert_eq!(edits.locks().inspect("site").unwrap(), LockState::Free);
    }

    #[cfg(unix)]
    #[test]
    fn directory_with_symlinks_cannot_be_opened() {
        let dir = tempdir().unwrap();
        let edits = edit_zone(dir.path(), "c1", clock());
        edits.store().write("site/index.html", b"x", false).unwrap();
        let root = edits.store().data_root().to_path_buf();
        std::os::unix::fs::symlink("index.html", root.join("site/home.html")).unwrap();

        match edits.open("site") {
            Err(WorkspaceError::UncopyableEntries { entries, .. }) => {
                assert_eq!(entries, vec!["home.html".to_string()])
            }
            other => panic!("expected UncopyableEntries, got {:?}", other),
        }
        assert_eq!(edits.locks().inspect("site").unwrap(), LockState::Free);
        assert!(fs::symlink_metadata(root.join("site/home.html")).is_ok());
    }

    #[test]
    fn save_after_expiry_is_refused() {
        let dir = tempdir().unwrap();
        let clock = clock();
        let edits = edit_zone(dir.path(), "c1", clock.clone());
        edits.open("doc.txt").unwrap();
        clock.advance(Duration::hours(25));
        assert!(matches!(
            edits.save("doc.txt"),
            Err(WorkspaceError::NoEditSession { .. })
        ));
        // Cancelling an expired session of our own still cleans up.
        edits.cancel("doc.txt").unwrap();
    }

    #[test]
    fn force_unlock_clears_every_session() {
        let dir = tempdir().unwrap();
        let edits = edit_zone(dir.path(), "c1", clock());
        edits.store().write("doc.txt", b"v1", false).unwrap();
        edits.open("doc.txt").unwrap();

        let forced = edits.force_unlock("doc.txt").unwrap();
        assert!(forced.lock_removed);
        assert_eq!(forced.copies_removed, vec!["c1".to_string()]);
        assert_eq!(edits.locks().inspect("doc.txt").unwrap(), LockState::Free);
        assert!(edits.open("doc.txt").is_ok());
    }

    #[test]
    fn sweep_reports_expired_corrupt_and_orphans() {
        let dir = tempdir().unwrap();
        let clock = clock();
        let edits = edit_zone(dir.path(), "c1", clock.clone());
        edits.open("old.txt").unwrap();
        clock.advance(Duration::hours(25));
        edits.open("live/tree.txt").unwrap();

        let locks_root = edits.locks().locks_root().to_path_buf();
        fs::write(locks_root.join("broken.txt.lock"), "???").unwrap();
        let orphan = dir.path().join("alice/Storage/editzone/c9/lost.txt");
        fs::create_dir_all(orphan.parent().unwrap()).unwrap();
        fs::write(&orphan, "x").unwrap();

        let report = edits.sweep().unwrap();
        assert_eq!(report.expired_locks, vec!["Storage/old.txt"]);
        assert_eq!(report.corrupted_locks, vec!["Storage/broken.txt"]);
        assert_eq!(report.orphan_editzones, vec!["Storage/lost.txt"]);
        assert!(!orphan.exists());
        // The live session is left alone.
        assert!(matches!(
            edits.locks().inspect("live/tree.txt").unwrap(),
            LockState::Held(_)
        ));
        assert!(edits.session_resolver().is_ok());
    }
}
