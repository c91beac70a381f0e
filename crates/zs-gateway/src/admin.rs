// admin.rs — Utilities: import, stats, allowed commands, help, force unlock
// and maintenance.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zs_workspace::{tree_usage, ForceUnlocked, MaintenanceReport, WorkspaceError, Zone};

use crate::envelope::Envelope;
use crate::error::GatewayError;
use crate::service::{Caller, OpContext, Reply, StorageService};

const MB: f64 = 1024.0 * 1024.0;

/// A file the host received for this conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Display name; falls back to the last component of `path`.
    #[serde(default)]
    pub name: Option<String>,
    /// Where the host stored it.
    pub path: PathBuf,
}

impl UploadedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            path: path.into(),
        }
    }

    pub fn named(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: Some(name.into()),
            path: path.into(),
        }
    }

    /// A single safe file name: the last component, never `.` or `..`.
    fn file_name(&self) -> String {
        let raw = self
            .name
            .clone()
            .or_else(|| {
                self.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        let last = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
        match last {
            "" | "." | ".." => "unknown".to_string(),
            name => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub files: Vec<UploadedFile>,
    /// Import only names matching this glob (an exact name works too).
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub import_all: bool,
    /// Subdirectory of the conversation's Uploads to import into.
    #[serde(default)]
    pub dest_subdir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Imported {
    pub imported: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStats {
    pub size_bytes: u64,
    pub size_human: String,
    pub files: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalStats {
    pub size_bytes: u64,
    pub size_human: String,
    pub quota_mb: u64,
    pub usage_percent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStats {
    pub uploads: ZoneStats,
    pub storage: ZoneStats,
    pub documents: ZoneStats,
    /// Everything the quota counts, including working copies and history.
    pub total: TotalStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandAvailability {
    pub available: Vec<String>,
    pub missing: Vec<String>,
}

impl CommandAvailability {
    fn without(mut self, command: &str) -> Self {
        self.available.retain(|c| c != command);
        self.missing.retain(|c| c != command);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    pub total_whitelist: usize,
    pub available: usize,
    pub missing: usize,
    pub coverage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedCommands {
    pub uploads: CommandAvailability,
    pub storage: CommandAvailability,
    pub documents: CommandAvailability,
    pub summary: CoverageSummary,
}

fn human(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MB)
}

fn name_filter(pattern: &str) -> impl Fn(&str) -> bool + '_ {
    let compiled = glob::Pattern::new(pattern).ok();
    move |name: &str| match &compiled {
        Some(p) => p.matches(name),
        None => name == pattern,
    }
}

pub const HELP: &str = "\
# Zoned user storage

## Uploading files
  1. import(import_all=true)            copy the conversation's uploads in
  2. uploads_to_storage(src, dest)      or uploads_to_documents(src, dest)

## Zones
  Uploads    files imported from the chat; read and delete only
  Storage    free working space; every operation
  Documents  version-controlled space; every change is a commit

## Operations
  <zone>_exec(cmd, args, timeout)       uploads, storage, documents
  <zone>_write(path, content, append)   storage, documents (+ message)
  <zone>_delete(path)                   every zone (+ message in documents)
  <zone>_rename(from, to)               storage, documents (+ message)

## Safe editing (storage, documents)
  edit_open(path)      lock the path and copy it to a working area
  edit_exec(cmd, args) run a command in the working area
  edit_write(path, content)
  edit_save(path)      replace the original (commits in documents)
  edit_cancel(path)    discard the working copy

## Bridges
  uploads_to_storage, uploads_to_documents,
  storage_to_documents, documents_to_storage (a move)

## Utilities
  help, stats, allowed_commands, force_unlock(zone, path), maintenance

## Commands
  Programs run directly, never through a shell. Arguments may not contain
  ; | & ` $ or redirections. See allowed_commands for what is installed.
  git (local history only) runs in documents.
";

impl StorageService {
    /// Copy host-side uploads into this conversation's Uploads.
    pub fn import(&self, caller: &Caller, request: &ImportRequest) -> Envelope {
        let ctx = OpContext::new("import").with_target(
            request
                .filename
                .clone()
                .unwrap_or_else(|| "*".to_string()),
        );
        let result = self.try_import(caller, request).map(|imported| {
            let text = format!("Imported {} file(s)", imported.count);
            Reply::new(imported, text)
        });
        self.finish(caller, ctx, result)
    }

    fn try_import(&self, caller: &Caller, request: &ImportRequest) -> Result<Imported, GatewayError> {
        let uploads = self.store(caller, Zone::Uploads)?;
        let subdir = match request.dest_subdir.as_deref().filter(|s| !s.is_empty()) {
            Some(subdir) => Some(uploads.resolve(subdir)?.relative),
            None => None,
        };
        if request.files.is_empty() {
            return Err(WorkspaceError::FileNotFound {
                path: "no files attached to this conversation".to_string(),
            }
            .into());
        }

        let matches = request.filename.as_deref().map(name_filter);
        let mut imported = Vec::new();
        let mut errors = Vec::new();
        let mut first_error: Option<WorkspaceError> = None;
        for file in &request.files {
            let name = file.file_name();
            let selected = match &matches {
                Some(matches) => matches(&name),
                None => request.import_all,
            };
            if !selected {
                continue;
            }
            let dest = match &subdir {
                Some(subdir) => format!("{}/{}", subdir, name),
                None => name.clone(),
            };
            let copied = if fs::metadata(&file.path).map(|m| m.is_file()).unwrap_or(false) {
                uploads.copy_in(&file.path, &dest)
            } else {
                Err(WorkspaceError::FileNotFound { path: name.clone() })
            };
            match copied {
                Ok(outcome) => imported.push(outcome.path),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "import skipped a file");
                    errors.push(format!("{}: {}", name, e));
                    first_error.get_or_insert(e);
                }
            }
        }

        if imported.is_empty() {
            return Err(first_error
                .unwrap_or_else(|| WorkspaceError::FileNotFound {
                    path: request.filename.clone().unwrap_or_else(|| "*".to_string()),
                })
                .into());
        }
        Ok(Imported {
            count: imported.len(),
            imported,
            errors,
        })
    }

    /// Static usage text.
    pub fn help(&self, caller: &Caller) -> Envelope {
        let reply = Reply::new(serde_json::json!({ "help": HELP }), "Usage");
        self.finish(caller, OpContext::new("help"), Ok(reply))
    }

    /// Per-zone usage and the quota.
    pub fn stats(&self, caller: &Caller) -> Envelope {
        let result = self.try_stats(caller).map(|stats| {
            let text = format!(
                "{} of {} MB used",
                stats.total.size_human, stats.total.quota_mb
            );
            Reply::new(stats, text)
        });
        self.finish(caller, OpContext::new("stats"), result)
    }

    fn try_stats(&self, caller: &Caller) -> Result<StorageStats, GatewayError> {
        let layout = self.layout(caller)?;
        let zone_stats = |dir: &Path| -> Result<ZoneStats, GatewayError> {
            let usage = tree_usage(dir)?;
            Ok(ZoneStats {
                size_bytes: usage.bytes,
                size_human: human(usage.bytes),
                files: usage.files,
            })
        };
        let quota = self.config().quota();
        let used = quota.usage(&layout.user_root())?;
        let percent = if quota.quota_bytes() == 0 {
            100.0
        } else {
            used as f64 * 100.0 / quota.quota_bytes() as f64
        };
        Ok(StorageStats {
            uploads: zone_stats(&layout.zone_dir(Zone::Uploads))?,
            storage: zone_stats(&layout.data_root(Zone::Storage))?,
            documents: zone_stats(&layout.data_root(Zone::Documents))?,
            total: TotalStats {
                size_bytes: used,
                size_human: human(used),
                quota_mb: self.config().quota_per_user_mb,
                usage_percent: format!("{:.1}%", percent),
            },
        })
    }

    /// Which whitelisted programs are installed on this host.
    pub fn allowed_commands(&self, caller: &Caller) -> Envelope {
        let commands = self.command_availability();
        let text = format!("{} commands available", commands.summary.available);
        self.finish(
            caller,
            OpContext::new("allowed_commands"),
            Ok(Reply::new(commands, text)),
        )
    }

    fn command_availability(&self) -> AllowedCommands {
        let cwd = std::env::temp_dir();
        let mut read_only = CommandAvailability::default();
        let mut read_write = CommandAvailability::default();
        for (commands, bucket) in [
            (self.policy().read_only_commands().collect::<Vec<_>>(), &mut read_only),
            (self.policy().read_write_commands().collect::<Vec<_>>(), &mut read_write),
        ] {
            for command in commands {
                if self.executor().locate(command, &cwd).is_ok() {
                    bucket.available.push(command.to_string());
                } else {
                    bucket.missing.push(command.to_string());
                }
            }
        }

        let mut writable = read_only.clone();
        writable.available.extend(read_write.available);
        writable.missing.extend(read_write.missing);
        writable.available.sort();
        writable.missing.sort();

        let total = writable.available.len() + writable.missing.len();
        let coverage = if total == 0 {
            0.0
        } else {
            writable.available.len() as f64 * 100.0 / total as f64
        };
        AllowedCommands {
            summary: CoverageSummary {
                total_whitelist: total,
                available: writable.available.len(),
                missing: writable.missing.len(),
                coverage: format!("{:.1}%", coverage),
            },
            uploads: read_only.without("git"),
            storage: writable.clone().without("git"),
            documents: writable,
        }
    }

    /// Drop the lock on `path` and every working copy of it, whoever owns them.
    pub fn force_unlock(&self, caller: &Caller, zone: Zone, path: &str) -> Envelope {
        let ctx = OpContext::in_zone(zone, "force_unlock").with_target(path);
        let result = self
            .store(caller, zone)
            .and_then(|store| self.editzone(store))
            .and_then(|editzone| editzone.force_unlock(path).map_err(GatewayError::from))
            .map(|unlocked: ForceUnlocked| {
                let text = format!("Unlocked: {} in {}", unlocked.path, zone.as_str());
                Reply::new(unlocked, text)
            });
        self.finish(caller, ctx, result)
    }

    /// Sweep expired and corrupt locks and orphaned working copies in
    /// Storage and Documents.
    pub fn maintenance(&self, caller: &Caller) -> Envelope {
        let result = self.try_maintenance(caller).map(|report| {
            let cleaned = report.expired_locks.len()
                + report.corrupted_locks.len()
                + report.orphan_editzones.len();
            let text = format!("Maintenance complete: {} element(s) cleaned", cleaned);
            Reply::new(report, text)
        });
        self.finish(caller, OpContext::new("maintenance"), result)
    }

    fn try_maintenance(&self, caller: &Caller) -> Result<MaintenanceReport, GatewayError> {
        let mut report = MaintenanceReport::default();
        for zone in [Zone::Storage, Zone::Documents] {
            let editzone = self.editzone(self.store(caller, zone)?)?;
            report.merge(editzone.sweep()?);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use tempfile::tempdir;
    use zs_policy::ErrorCode;

    fn service(root: &Path) -> StorageService {
        StorageService::new(StorageConfig::new(root).without_audit()).unwrap()
    }

    #[test]
    fn uploaded_names_are_reduced_to_one_component() {
        assert_eq!(UploadedFile::named("../../etc/passwd", "/x").file_name(), "passwd");
        assert_eq!(UploadedFile::named("a\\b\\c.txt", "/x").file_name(), "c.txt");
        assert_eq!(UploadedFile::named("..", "/x").file_name(), "unknown");
        assert_eq!(UploadedFile::new("/tmp/up/report.pdf").file_name(), "report.pdf");
    }

    #[test]
    fn import_filters_by_name_and_reports_missing_sources() {
        let host = tempdir().unwrap();
        let root = tempdir().unwrap();
        let service = service(root.path());
        let caller = Caller::new("alice", "c1");
        let a = host.path().join("a.csv");
        let b = host.path().join("b.txt");
        fs::write(&a, "1,2\n").unwrap();
        fs::write(&b, "hello").unwrap();
        let files = vec![
            UploadedFile::new(&a),
            UploadedFile::new(&b),
            UploadedFile::named("gone.csv", host.path().join("gone.csv")),
        ];

        let env = service.import(
            &caller,
            &ImportRequest {
                files: files.clone(),
                filename: Some("*.csv".to_string()),
                ..Default::default()
            },
        );
        assert!(env.success, "{:?}", env);
        let data = env.data.unwrap();
        assert_eq!(data["imported"], serde_json::json!(["a.csv"]));
        assert_eq!(data["errors"].as_array().unwrap().len(), 1);
        assert!(root.path().join("alice/Uploads/c1/a.csv").exists());
        assert!(!root.path().join("alice/Uploads/c1/b.txt").exists());

        let env = service.import(
            &caller,
            &ImportRequest {
                files: files.clone(),
                import_all: true,
                dest_subdir: Some("batch".to_string()),
                ..Default::default()
            },
        );
        assert!(env.success);
        assert!(root.path().join("alice/Uploads/c1/batch/b.txt").exists());

        let env = service.import(
            &caller,
            &ImportRequest {
                files,
                ..Default::default()
            },
        );
        assert_eq!(env.code(), Some(ErrorCode::FileNotFound));
    }

    #[test]
    fn import_rejects_an_escaping_subdir() {
        let root = tempdir().unwrap();
        let env = service(root.path()).import(
            &Caller::new("alice", "c1"),
            &ImportRequest {
                files: vec![UploadedFile::new("/nonexistent")],
                import_all: true,
                dest_subdir: Some("../c2".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(env.code(), Some(ErrorCode::PathEscape));
    }

    #[test]
    fn stats_counts_each_zone() {
        let root = tempdir().unwrap();
        let service = service(root.path());
        let caller = Caller::new("alice", "c1");
        assert!(service.write(&caller, Zone::Storage, "a.txt", "12345", false, None).success);

        let env = service.stats(&caller);
        assert!(env.success, "{:?}", env);
        let data = env.data.unwrap();
        assert_eq!(data["storage"]["size_bytes"], 5);
        assert_eq!(data["storage"]["files"], 1);
        assert_eq!(data["uploads"]["files"], 0);
        assert_eq!(data["total"]["quota_mb"], 1000);
        assert_eq!(data["total"]["usage_percent"], "0.0%");
    }

    #[test]
    fn allowed_commands_partitions_the_whitelist() {
        let root = tempdir().unwrap();
        let env = service(root.path()).allowed_commands(&Caller::new("alice", "c1"));
        let data = env.data.unwrap();
        let uploads = data["uploads"]["available"].as_array().unwrap().len()
            + data["uploads"]["missing"].as_array().unwrap().len();
        let storage = data["storage"]["available"].as_array().unwrap().len()
            + data["storage"]["missing"].as_array().unwrap().len();
        let documents = data["documents"]["available"].as_array().unwrap().len()
            + data["documents"]["missing"].as_array().unwrap().len();
        assert!(uploads < storage);
        assert_eq!(storage + 1, documents);
        assert_eq!(data["summary"]["total_whitelist"], documents);
        assert!(!data["uploads"]["missing"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "rm"));
        for zone in ["uploads", "storage"] {
            let listed = data[zone]["available"]
                .as_array()
                .unwrap()
                .iter()
                .chain(data[zone]["missing"].as_array().unwrap())
                .any(|c| c == "git");
            assert!(!listed, "git listed for {}", zone);
        }
    }

    #[test]
    fn force_unlock_only_applies_to_editable_zones() {
        let root = tempdir().unwrap();
        let service = service(root.path());
        let owner = Caller::new("alice", "c1");
        let other = Caller::new("alice", "c2");
        assert!(service.edit_open(&owner, Zone::Storage, "a.txt").success);

        let env = service.force_unlock(&other, Zone::Uploads, "a.txt");
        assert_eq!(env.code(), Some(ErrorCode::ZoneForbidden));

        let env = service.force_unlock(&other, Zone::Storage, "a.txt");
        assert!(env.success, "{:?}", env);
        assert_eq!(env.data.unwrap()["copies_removed"], serde_json::json!(["c1"]));
        assert!(service.edit_open(&other, Zone::Storage, "a.txt").success);
    }

    #[test]
    fn maintenance_on_a_clean_user_reports_nothing() {
        let root = tempdir().unwrap();
        let env = service(root.path()).maintenance(&Caller::new("alice", "c1"));
        assert!(env.success);
        assert_eq!(
            env.message.as_deref(),
            Some("Maintenance complete: 0 element(s) cleaned")
        );
    }

    #[test]
    fn help_names_every_zone() {
        let root = tempdir().unwrap();
        let env = service(root.path()).help(&Caller::new("alice", "c1"));
        let text = env.data.unwrap()["help"].as_str().unwrap().to_string();
        for zone in ["Uploads", "Storage", "Documents"] {
            assert!(text.contains(zone));
        }
    }
}
