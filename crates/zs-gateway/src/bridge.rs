// bridge.rs — Cross-zone copies and moves.
//
// Four directions exist:
//
//   Uploads   → Storage     copy
//   Uploads   → Documents   copy + commit
//   Storage   → Documents   copy + commit
//   Documents → Storage     copy, then a committed delete in Documents
//
// Both ends are resolved inside their own zones before anything is copied,
// and the destination store applies the quota to the bytes coming in.
// Nothing ever lands in Uploads except through `import`. Symlinks, special
// files and `.git` directories are never copied: a copy reports them, a move
// out of Documents is refused while the source holds any.

use std::fs;

use serde::Serialize;
use zs_versioned::messages;
use zs_workspace::{fsops, WorkspaceError, Zone};

use crate::envelope::Envelope;
use crate::error::GatewayError;
use crate::files::CommitInfo;
use crate::service::{Caller, OpContext, Reply, StorageService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bridged {
    /// `<Zone>/<path>` of the source.
    pub from: String,
    /// `<Zone>/<path>` of the destination.
    pub to: String,
    pub bytes: u64,
    pub files: u64,
    /// True when the source was removed.
    pub moved: bool,
    /// Entries left behind because they cannot be copied.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    #[serde(flatten)]
    pub commit: Option<CommitInfo>,
}

fn supported(from: Zone, to: Zone) -> bool {
    matches!(
        (from, to),
        (Zone::Uploads, Zone::Storage)
            | (Zone::Uploads, Zone::Documents)
            | (Zone::Storage, Zone::Documents)
            | (Zone::Documents, Zone::Storage)
    )
}

impl StorageService {
    /// Copy (or, out of Documents, move) `src` in `from` to `dest` in `to`.
    pub fn bridge(
        &self,
        caller: &Caller,
        from: Zone,
        to: Zone,
        src: &str,
        dest: &str,
        message: Option<&str>,
    ) -> Envelope {
        let ctx = OpContext::new(format!("{}_to_{}", from.as_str(), to.as_str()))
            .with_target(format!("{}/{} -> {}/{}", from, src, to, dest));
        let result = self
            .try_bridge(caller, from, to, src, dest, message)
            .map(|bridged| {
                let verb = if bridged.moved { "Moved" } else { "Copied" };
                let text = format!("{}: {} -> {}", verb, bridged.from, bridged.to);
                let commit = bridged.commit.as_ref().map(|c| c.commit.clone());
                Reply::new(bridged, text).with_commit(commit)
            });
        self.finish(caller, ctx, result)
    }

    pub fn uploads_to_storage(&self, caller: &Caller, src: &str, dest: &str) -> Envelope {
        self.bridge(caller, Zone::Uploads, Zone::Storage, src, dest, None)
    }

    pub fn uploads_to_documents(
        &self,
        caller: &Caller,
        src: &str,
        dest: &str,
        message: Option<&str>,
    ) -> Envelope {
        self.bridge(caller, Zone::Uploads, Zone::Documents, src, dest, message)
    }

    pub fn storage_to_documents(
        &self,
        caller: &Caller,
        src: &str,
        dest: &str,
        message: Option<&str>,
    ) -> Envelope {
        self.bridge(caller, Zone::Storage, Zone::Documents, src, dest, message)
    }

    pub fn documents_to_storage(
        &self,
        caller: &Caller,
        src: &str,
        dest: &str,
        message: Option<&str>,
    ) -> Envelope {
        self.bridge(caller, Zone::Documents, Zone::Storage, src, dest, message)
    }

    fn try_bridge(
        &self,
        caller: &Caller,
        from: Zone,
        to: Zone,
        src: &str,
        dest: &str,
        message: Option<&str>,
    ) -> Result<Bridged, GatewayError> {
        if !supported(from, to) {
            return Err(WorkspaceError::ZoneForbidden {
                zone: to.to_string(),
                reason: format!("there is no bridge from {} to {}", from, to),
            }
            .into());
        }

        let source_store = self.store(caller, from)?;
        let source = source_store.resolve(src)?;
        if source.is_root() {
            return Err(WorkspaceError::PathEscape {
                path: src.to_string(),
                reason: "cannot copy a whole zone".to_string(),
            }
            .into());
        }
        if fs::symlink_metadata(&source.absolute).is_err() {
            return Err(WorkspaceError::FileNotFound {
                path: format!("{}/{}", from, source.relative),
            }
            .into());
        }

        if to == Zone::Documents {
            let versioned = self.versioned(caller)?;
            let copied = versioned.store().copy_in(&source.absolute, dest)?;
            let message = message
                .map(str::to_string)
                .unwrap_or_else(|| messages::imported_from(&copied.path, from.dir_name()));
            let commit = versioned.commit_paths(&[&copied.path], &message)?;
            return Ok(Bridged {
                from: format!("{}/{}", from, source.relative),
                to: format!("{}/{}", to, copied.path),
                bytes: copied.bytes,
                files: copied.files,
                moved: false,
                skipped: copied.skipped,
                commit: Some(CommitInfo { commit, message }),
            });
        }

        if from == Zone::Documents {
            let entries = fsops::uncopyable_entries(&source.absolute)?;
            if !entries.is_empty() {
                return Err(WorkspaceError::UncopyableEntries {
                    path: format!("{}/{}", from, source.relative),
                    entries,
                }
                .into());
            }
        }
        let copied = self.store(caller, Zone::Storage)?.copy_in(&source.absolute, dest)?;
        let mut bridged = Bridged {
            from: format!("{}/{}", from, source.relative),
            to: format!("{}/{}", to, copied.path),
            bytes: copied.bytes,
            files: copied.files,
            moved: false,
            skipped: copied.skipped,
            commit: None,
        };
        if from == Zone::Documents {
            let default_message = messages::moved_to(&source.relative, to.dir_name());
            let removed = self
                .versioned_from(source_store)?
                .delete(&source.relative, Some(message.unwrap_or(&default_message)))?;
            bridged.moved = true;
            bridged.commit = Some(CommitInfo {
                commit: removed.commit,
                message: removed.message,
            });
        }
        Ok(bridged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use tempfile::tempdir;
    use zs_policy::ErrorCode;

    #[test]
    fn uploads_to_storage_copies_and_keeps_the_source() {
        let dir = tempdir().unwrap();
        let service = StorageService::new(StorageConfig::new(dir.path()).without_audit()).unwrap();
        let caller = Caller::new("alice", "c1");
        let upload = dir.path().join("alice/Uploads/c1/data.csv");
        fs::create_dir_all(upload.parent().unwrap()).unwrap();
        fs::write(&upload, "a,b\n").unwrap();

        let env = service.uploads_to_storage(&caller, "data.csv", "in/data.csv");
        assert!(env.success, "{:?}", env);
        assert_eq!(env.message.as_deref(), Some("Copied: Uploads/data.csv -> Storage/in/data.csv"));
        assert!(upload.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("alice/Storage/data/in/data.csv")).unwrap(),
            "a,b\n"
        );
    }

    #[test]
    fn missing_source_and_unsupported_directions_are_refused() {
        let dir = tempdir().unwrap();
        let service = StorageService::new(StorageConfig::new(dir.path()).without_audit()).unwrap();
        let caller = Caller::new("alice", "c1");

        let env = service.uploads_to_storage(&caller, "nothing.txt", "x.txt");
        assert_eq!(env.code(), Some(ErrorCode::FileNotFound));

        let env = service.bridge(&caller, Zone::Storage, Zone::Uploads, "a", "b", None);
        assert_eq!(env.code(), Some(ErrorCode::ZoneForbidden));

        let env = service.uploads_to_storage(&caller, "../../bob/Storage/data/x", "x");
        assert_eq!(env.code(), Some(ErrorCode::PathEscape));
    }

    #[test]
    fn bridge_respects_the_destination_quota() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path()).without_audit().with_quota_mb(1);
        let service = StorageService::new(config).unwrap();
        let caller = Caller::new("alice", "c1");
        let upload = dir.path().join("alice/Uploads/c1/big.bin");
        fs::create_dir_all(upload.parent().unwrap()).unwrap();
        fs::write(&upload, vec![0u8; 600 * 1024]).unwrap();

        let env = service.uploads_to_storage(&caller, "big.bin", "big.bin");
        assert_eq!(env.code(), Some(ErrorCode::QuotaExceeded));
        assert!(!dir.path().join("alice/Storage/data/big.bin").exists());
    }

    #[test]
    fn every_file_of_a_directory_meets_the_size_ceiling() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path()).without_audit().with_max_file_size_mb(1);
        let service = StorageService::new(config).unwrap();
        let caller = Caller::new("alice", "c1");
        let folder = dir.path().join("alice/Uploads/c1/batch");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("small.txt"), "ok").unwrap();
        fs::write(folder.join("huge.bin"), vec![0u8; 1536 * 1024]).unwrap();

        let env = service.uploads_to_storage(&caller, "batch", "batch");
        assert_eq!(env.code(), Some(ErrorCode::QuotaExceeded));
        assert!(!dir.path().join("alice/Storage/data/batch").exists());
    }

    #[cfg(unix)]
    #[test]
    fn copies_report_links_and_moves_refuse_them() {
        let dir = tempdir().unwrap();
        let service = StorageService::new(StorageConfig::new(dir.path()).without_audit()).unwrap();
        let caller = Caller::new("alice", "c1");
        let folder = dir.path().join("alice/Uploads/c1/photos");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("a.jpg"), "jpeg").unwrap();
        std::os::unix::fs::symlink("a.jpg", folder.join("latest.jpg")).unwrap();

        let env = service.uploads_to_storage(&caller, "photos", "photos");
        assert!(env.success, "{:?}", env);
        assert_eq!(env.data.unwrap()["skipped"], serde_json::json!(["latest.jpg"]));
        assert!(dir.path().join("alice/Storage/data/photos/a.jpg").exists());

        if which::which("git").is_err() {
            return;
        }
        let env = service.uploads_to_documents(&caller, "photos", "photos", None);
        assert!(env.success, "{:?}", env);
        let documents = dir.path().join("alice/Documents/data/photos");
        std::os::unix::fs::symlink("a.jpg", documents.join("cover.jpg")).unwrap();

        let env = service.documents_to_storage(&caller, "photos", "archived", None);
        assert_eq!(env.code(), Some(ErrorCode::ZoneForbidden));
        assert_eq!(env.details.unwrap()["entries"], serde_json::json!(["cover.jpg"]));
        assert!(documents.join("a.jpg").exists());
        assert!(!dir.path().join("alice/Storage/data/archived").exists());
    }
}
