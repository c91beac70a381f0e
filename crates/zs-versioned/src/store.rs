// store.rs — The Documents zone: a ZoneStore whose every successful
// mutation becomes exactly one git commit.
//
// The mutation happens first; only when it succeeds are the affected paths
// staged and committed. A failed mutation leaves history untouched.

use serde::{Deserialize, Serialize};
use zs_workspace::{RenameOutcome, WriteOutcome, Zone, ZoneStore};

use crate::error::VersionedError;
use crate::git::{CommitIdentity, GitRepo};

/// Default commit messages, used when the caller gives none.
pub mod messages {
    pub fn created(path: &str) -> String {
        format!("Created {}", path)
    }

    pub fn modified(path: &str) -> String {
        format!("Modified {}", path)
    }

    pub fn appended(path: &str) -> String {
        format!("Appended to {}", path)
    }

    pub fn deleted(path: &str) -> String {
        format!("Deleted {}", path)
    }

    pub fn renamed(from: &str, to: &str) -> String {
        format!("Renamed {} -> {}", from, to)
    }

    pub fn edited(path: &str) -> String {
        format!("Edited {}", path)
    }

    pub fn imported_from(path: &str, zone: &str) -> String {
        format!("Imported {} from {}", path, zone)
    }

    pub fn moved_to(path: &str, zone: &str) -> String {
        format!("Moved {} to {}", path, zone)
    }
}

/// An operation outcome plus the commit that recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committed<T> {
    #[serde(flatten)]
    pub outcome: T,
    pub commit: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct VersionedZoneStore {
    store: ZoneStore,
    repo: GitRepo,
}

impl VersionedZoneStore {
    /// Wrap the Documents store, creating its repository if needed.
    pub fn open(store: ZoneStore, identity: CommitIdentity) -> Result<Self, VersionedError> {
        if store.zone() != Zone::Documents {
            return Err(VersionedError::NotVersioned {
                zone: store.zone().to_string(),
            });
        }
        let repo = GitRepo::new(
            store.data_root(),
            store.layout().repo_dir(Zone::Documents),
            identity,
        );
        repo.init_if_missing()?;
        Ok(Self { store, repo })
    }

    pub fn store(&self) -> &ZoneStore {
        &self.store
    }

    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }

    /// Stage `paths` and record one commit.
    pub fn commit_paths(&self, paths: &[&str], message: &str) -> Result<String, VersionedError> {
        self.repo.stage(paths)?;
        self.repo.commit(message)
    }

    pub fn write(
        &self,
        path: &str,
        content: &[u8],
        append: bool,
        message: Option<&str>,
    ) -> Result<Committed<WriteOutcome>, VersionedError> {
        let outcome = self.store.write(path, content, append)?;
        let message = match message {
            Some(m) => m.to_string(),
            None if outcome.created => messages::created(&outcome.path),
            None if append => messages::appended(&outcome.path),
            None => messages::modified(&outcome.path),
        };
        let commit = self.commit_paths(&[&outcome.path], &message)?;
        Ok(Committed {
            outcome,
            commit,
            message,
        })
    }

    pub fn delete(&self, path: &str, message: Option<&str>) -> Result<Committed<String>, VersionedError> {
        let removed = self.store.delete(path)?;
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| messages::deleted(&removed));
        let commit = self.commit_paths(&[&removed], &message)?;
        Ok(Committed {
            outcome: removed,
            commit,
            message,
        })
    }

    pub fn rename(
        &self,
        from: &str,
        to: &str,
        message: Option<&str>,
    ) -> Result<Committed<RenameOutcome>, VersionedError> {
        let outcome = self.store.rename(from, to)?;
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| messages::renamed(&outcome.from, &outcome.to));
        let commit = self.commit_paths(&[&outcome.from, &outcome.to], &message)?;
        Ok(Committed {
            outcome,
            commit,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;
    use zs_workspace::{QuotaTracker, WorkspaceError, ZoneLayout};

    fn git_installed() -> bool {
        which::which("git").is_ok()
    }

    fn documents(root: &Path) -> VersionedZoneStore {
        let layout = ZoneLayout::new(root, "alice", "conv-1").unwrap();
        let store =
            ZoneStore::open(&layout, Zone::Documents, QuotaTracker::new(10, 1)).unwrap();
        VersionedZoneStore::open(store, CommitIdentity::default()).unwrap()
    }

    #[test]
    fn only_documents_is_versioned() {
        let dir = tempdir().unwrap();
        let layout = ZoneLayout::new(dir.path(), "alice", "conv-1").unwrap();
        let store = ZoneStore::open(&layout, Zone::Storage, QuotaTracker::new(10, 1)).unwrap();
        assert!(matches!(
            VersionedZoneStore::open(store, CommitIdentity::default()),
            Err(VersionedError::NotVersioned { .. })
        ));
    }

    #[test]
    fn each_mutation_is_one_commit() {
        if !git_installed() {
            return;
        }
        let dir = tempdir().unwrap();
        let docs = documents(dir.path());
        assert!(docs.repo().is_initialized());
        assert_eq!(docs.repo().commit_count().unwrap(), 0);

        let written = docs.write("report.md", b"# Q1", false, None).unwrap();
        assert_eq!(written.message, "Created report.md");
        docs.write("report.md", b"\nmore", true, None).unwrap();
        docs.write("report.md", b"# Q2", false, Some("rewrite")).unwrap();
        docs.rename("report.md", "final.md", None).unwrap();
        docs.delete("final.md", None).unwrap();

        let repo = docs.repo();
        assert_eq!(repo.commit_count().unwrap(), 5);
        assert!(!docs.store().data_root().join(".git").exists());
        assert_eq!(
            repo.last_message().unwrap().as_deref(),
            Some("Deleted final.md")
        );
        assert!(repo.is_clean().unwrap());
    }

    #[test]
    fn failed_mutation_leaves_history_alone() {
        if !git_installed() {
            return;
        }
        let dir = tempdir().unwrap();
        let docs = documents(dir.path());
        docs.write("a.txt", b"a", false, None).unwrap();
        let before = docs.repo().head().unwrap();

        assert!(matches!(
            docs.delete("missing.txt", None),
            Err(VersionedError::Workspace(WorkspaceError::FileNotFound { .. }))
        ));
        let too_big = vec![0u8; 2 * 1024 * 1024];
        assert!(docs.write("big.bin", &too_big, false, None).is_err());
        assert_eq!(docs.repo().head().unwrap(), before);
    }

    #[test]
    fn deleting_an_untracked_file_still_commits() {
        if !git_installed() {
            return;
        }
        let dir = tempdir().unwrap();
        let docs = documents(dir.path());
        std::fs::write(docs.store().data_root().join("scratch.txt"), "x").unwrap();
        let deleted = docs.delete("scratch.txt", None).unwrap();
        assert_eq!(deleted.message, "Deleted scratch.txt");
        assert_eq!(docs.repo().commit_count().unwrap(), 1);
    }

    #[test]
    fn paths_with_glob_characters_are_literal() {
        if !git_installed() {
            return;
        }
        let dir = tempdir().unwrap();
        let docs = documents(dir.path());
        docs.write("a*.txt", b"star", false, None).unwrap();
        docs.write("ab.txt", b"plain", false, None).unwrap();
        docs.delete("a*.txt", None).unwrap();
        assert!(docs.store().read("ab.txt").is_ok());
        assert!(docs.repo().is_clean().unwrap());
    }

    #[test]
    fn a_git_directory_inside_the_data_root_is_just_data() {
        if !git_installed() {
            return;
        }
        let dir = tempdir().unwrap();
        let docs = documents(dir.path());
        docs.write("a.txt", b"a", false, None).unwrap();
        let head = docs.repo().head().unwrap();

        // Something a command might extract from an archive.
        let planted = docs.store().data_root().join(".git");
        std::fs::create_dir_all(&planted).unwrap();
        std::fs::write(planted.join("HEAD"), "ref: refs/heads/evil\n").unwrap();
        std::fs::write(planted.join("config"), "[core]\n\tbare = true\n").unwrap();

        assert_eq!(docs.repo().head().unwrap(), head);
        docs.write("b.txt", b"b", false, None).unwrap();
        assert_eq!(docs.repo().commit_count().unwrap(), 2);
    }
}
