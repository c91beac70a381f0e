// zone.rs — Zones, on-disk layout, and the plain zone store.
//
// Layout under the storage root:
//
//   <user>/Uploads/<conversation>/...        read + delete
//   <user>/Storage/data/...                  read + write
//   <user>/Documents/data/...                read + write, versioned
//   <user>/Documents/repo.git                history of Documents/data
//   <user>/{Storage,Documents}/editzone/<session>/<path>
//   <user>/{Storage,Documents}/locks/<path>.lock
//
// The repository sits beside the data root, never inside it, so nothing a
// caller can address reaches its config.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zs_policy::CapabilityLevel;

use crate::error::WorkspaceError;
use crate::fsops;
use crate::quota::{tree_usage, QuotaTracker, TreeUsage};
use crate::resolve::{PathResolver, ResolvedPath};

/// Name of the version-control directory, reserved at any depth in every zone.
pub const GIT_DIR: &str = ".git";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Uploads,
    Storage,
    Documents,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Uploads, Zone::Storage, Zone::Documents];

    pub fn capability(&self) -> CapabilityLevel {
        match self {
            Zone::Uploads => CapabilityLevel::ReadDelete,
            Zone::Storage => CapabilityLevel::ReadWrite,
            Zone::Documents => CapabilityLevel::VersionedReadWrite,
        }
    }

    /// Directory name under the user root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Zone::Uploads => "Uploads",
            Zone::Storage => "Storage",
            Zone::Documents => "Documents",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Uploads => "uploads",
            Zone::Storage => "storage",
            Zone::Documents => "documents",
        }
    }

    /// Whether the safe-edit protocol is available.
    pub fn supports_edit(&self) -> bool {
        self.capability().can_write()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uploads" => Ok(Zone::Uploads),
            "storage" => Ok(Zone::Storage),
            "documents" => Ok(Zone::Documents),
            other => Err(format!("unknown zone '{}'", other)),
        }
    }
}

/// Reject ids that are not one safe path component.
pub fn validate_identifier(kind: &'static str, value: &str) -> Result<(), WorkspaceError> {
    let bad = value.is_empty()
        || value.starts_with('.')
        || value.contains(['/', '\\', '\0'])
        || value.len() > 255;
    if bad {
        return Err(WorkspaceError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Directory layout for one user and conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneLayout {
    storage_root: PathBuf,
    user_id: String,
    conversation_id: String,
}

impl ZoneLayout {
    pub fn new(
        storage_root: impl Into<PathBuf>,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Self, WorkspaceError> {
        validate_identifier("user id", user_id)?;
        validate_identifier("conversation id", conversation_id)?;
        Ok(Self {
            storage_root: storage_root.into(),
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn user_root(&self) -> PathBuf {
        self.storage_root.join(&self.user_id)
    }

    pub fn zone_dir(&self, zone: Zone) -> PathBuf {
        self.user_root().join(zone.dir_name())
    }

    pub fn data_root(&self, zone: Zone) -> PathBuf {
        match zone {
            Zone::Uploads => self.zone_dir(zone).join(&self.conversation_id),
            _ => self.zone_dir(zone).join("data"),
        }
    }

    pub fn editzone_root(&self, zone: Zone) -> PathBuf {
        self.zone_dir(zone).join("editzone")
    }

    pub fn session_editzone(&self, zone: Zone) -> PathBuf {
        self.editzone_root(zone).join(&self.conversation_id)
    }

    pub fn locks_root(&self, zone: Zone) -> PathBuf {
        self.zone_dir(zone).join("locks")
    }

    /// Git directory holding the history of a zone's data root.
    pub fn repo_dir(&self, zone: Zone) -> PathBuf {
        self.zone_dir(zone).join("repo.git")
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub path: String,
    pub bytes_written: u64,
    pub size: u64,
    pub created: bool,
    pub appended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOutcome {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOutcome {
    pub path: String,
    pub bytes: u64,
    pub files: u64,
    /// Source entries that were not copied (symlinks, special files, `.git`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Size-checked atomic write of `content` to an already resolved path.
pub(crate) fn write_checked(
    quota: &QuotaTracker,
    user_root: &Path,
    target: &ResolvedPath,
    content: &[u8],
    append: bool,
) -> Result<WriteOutcome, WorkspaceError> {
    if target.is_root() {
        return Err(WorkspaceError::escape(".", "cannot write to the zone root"));
    }
    let existing = match fs::metadata(&target.absolute) {
        Ok(meta) if meta.is_dir() => {
            return Err(WorkspaceError::NotAFile {
                path: target.relative.clone(),
            })
        }
        Ok(meta) => Some(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(source) => {
            return Err(WorkspaceError::IoError {
                path: target.absolute.clone(),
                source,
            })
        }
    };

    let incoming = content.len() as u64;
    let old_size = existing.unwrap_or(0);
    let new_size = if append { old_size + incoming } else { incoming };
    quota.check_single_file(new_size)?;
    quota.check(user_root, new_size.saturating_sub(old_size))?;

    fsops::write_atomic(&target.absolute, content, append)?;
    Ok(WriteOutcome {
        path: target.relative.clone(),
        bytes_written: incoming,
        size: new_size,
        created: existing.is_none(),
        appended: append,
    })
}

/// Read, list, write, delete and rename inside one zone.
#[derive(Debug, Clone)]
pub struct ZoneStore {
    layout: ZoneLayout,
    zone: Zone,
    resolver: PathResolver,
    quota: QuotaTracker,
}

impl ZoneStore {
    /// Open a zone, creating its data root if needed.
    pub fn open(layout: &ZoneLayout, zone: Zone, quota: QuotaTracker) -> Result<Self, WorkspaceError> {
        let root = layout.data_root(zone);
        fs::create_dir_all(&root).map_err(WorkspaceError::io(&root))?;
        // A planted repository could configure git to run programs.
        let resolver = PathResolver::new(&root)?.with_reserved(GIT_DIR);
        Ok(Self {
            layout: layout.clone(),
            zone,
            resolver,
            quota,
        })
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn layout(&self) -> &ZoneLayout {
        &self.layout
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn data_root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn resolve(&self, path: &str) -> Result<ResolvedPath, WorkspaceError> {
        self.resolver.resolve(path)
    }

    fn require_write(&self, operation: &str) -> Result<(), WorkspaceError> {
        if self.zone.capability().can_write() {
            return Ok(());
        }
        Err(WorkspaceError::ZoneForbidden {
            zone: self.zone.to_string(),
            reason: format!("{} is not allowed in a read-only zone", operation),
        })
    }

    fn require_existing(&self, resolved: &ResolvedPath) -> Result<fs::Metadata, WorkspaceError> {
        match fs::symlink_metadata(&resolved.absolute) {
            Ok(meta) => Ok(meta),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(WorkspaceError::FileNotFound {
                path: resolved.display().to_string(),
            }),
            Err(source) => Err(WorkspaceError::IoError {
                path: resolved.absolute.clone(),
                source,
            }),
        }
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceError> {
        let resolved = self.resolve(path)?;
        let meta = self.require_existing(&resolved)?;
        if meta.is_dir() {
            return Err(WorkspaceError::NotAFile {
                path: resolved.display().to_string(),
            });
        }
        fs::read(&resolved.absolute).map_err(WorkspaceError::io(&resolved.absolute))
    }

    /// List a directory (sorted by name), or describe a single file.
    pub fn list(&self, path: &str) -> Result<Vec<EntryInfo>, WorkspaceError> {
        let resolved = self.resolve(path)?;
        let meta = self.require_existing(&resolved)?;
        if !meta.is_dir() {
            let name = resolved
                .relative
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            return Ok(vec![entry_info(name, &meta)]);
        }

        let reader =
            fs::read_dir(&resolved.absolute).map_err(WorkspaceError::io(&resolved.absolute))?;
        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(WorkspaceError::io(&resolved.absolute))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.eq_ignore_ascii_case(GIT_DIR) {
                continue;
            }
            let meta = entry.metadata().map_err(WorkspaceError::io(entry.path()))?;
            entries.push(entry_info(name, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Create or replace (or append to) a file.
    pub fn write(&self, path: &str, content: &[u8], append: bool) -> Result<WriteOutcome, WorkspaceError> {
        self.require_write("write")?;
        let resolved = self.resolve(path)?;
        let outcome = write_checked(
            &self.quota,
            &self.layout.user_root(),
            &resolved,
            content,
            append,
        )?;
        tracing::info!(
            zone = %self.zone,
            path = %outcome.path,
            bytes = outcome.bytes_written,
            append,
            "file written"
        );
        Ok(outcome)
    }

    /// Delete a file or a whole directory tree. Allowed in every zone.
    pub fn delete(&self, path: &str) -> Result<String, WorkspaceError> {
        let resolved = self.resolve(path)?;
        if resolved.is_root() {
            return Err(WorkspaceError::escape(path, "cannot delete the zone root"));
        }
        self.require_existing(&resolved)?;
        fsops::remove_path(&resolved.absolute)?;
        tracing::info!(zone = %self.zone, path = %resolved.relative, "deleted");
        Ok(resolved.relative)
    }

    /// Move `from` to `to`. An existing directory at `to` receives `from`
    /// inside it; an existing file at `to` is replaced.
    pub fn rename(&self, from: &str, to: &str) -> Result<RenameOutcome, WorkspaceError> {
        self.require_write("rename")?;
        let source = self.resolve(from)?;
        let mut dest = self.resolve(to)?;
        if source.is_root() {
            return Err(WorkspaceError::escape(from, "cannot move the zone root"));
        }
        let source_meta = self.require_existing(&source)?;

        if dest.absolute.is_dir() {
            let name = source.relative.rsplit('/').next().unwrap_or_default();
            let inside = if dest.is_root() {
                name.to_string()
            } else {
                format!("{}/{}", dest.relative, name)
            };
            dest = self.resolve(&inside)?;
        }
        if dest.relative == source.relative {
            return Ok(RenameOutcome {
                from: source.relative.clone(),
                to: dest.relative,
            });
        }
        if dest.relative.starts_with(&format!("{}/", source.relative)) {
            return Err(WorkspaceError::escape(to, "cannot move a directory into itself"));
        }
        if dest.absolute.is_dir() && !source_meta.is_dir() {
            return Err(WorkspaceError::NotAFile {
                path: dest.relative,
            });
        }

        if let Some(parent) = dest.absolute.parent() {
            fs::create_dir_all(parent).map_err(WorkspaceError::io(parent))?;
        }
        fs::rename(&source.absolute, &dest.absolute)
            .map_err(WorkspaceError::io(&source.absolute))?;
        tracing::info!(zone = %self.zone, from = %source.relative, to = %dest.relative, "renamed");
        Ok(RenameOutcome {
            from: source.relative,
            to: dest.relative,
        })
    }

    /// Copy a file or tree from outside this zone to `dest`, after the quota
    /// check and the per-file check of every file in the tree. Callers are
    /// responsible for validating `source`.
    pub fn copy_in(&self, source: &Path, dest: &str) -> Result<CopyOutcome, WorkspaceError> {
        let resolved = self.resolve(dest)?;
        if resolved.is_root() {
            return Err(WorkspaceError::escape(dest, "cannot replace the zone root"));
        }
        let source_meta = fs::metadata(source).map_err(WorkspaceError::io(source))?;
        let incoming = tree_usage(source)?;
        self.quota.check_each_file(&incoming)?;
        if source_meta.is_file() {
            if resolved.absolute.is_dir() {
                return Err(WorkspaceError::NotAFile {
                    path: resolved.relative,
                });
            }
        }
        let existing: TreeUsage = tree_usage(&resolved.absolute)?;
        self.quota.check(
            &self.layout.user_root(),
            incoming.bytes.saturating_sub(existing.bytes),
        )?;

        let copied = fsops::copy_tree(source, &resolved.absolute)?;
        tracing::info!(
            zone = %self.zone,
            path = %resolved.relative,
            bytes = copied.bytes,
            files = copied.files,
            skipped = copied.skipped.len(),
            "copied in"
        );
        Ok(CopyOutcome {
            path: resolved.relative,
            bytes: copied.bytes,
            files: copied.files,
            skipped: copied.skipped,
        })
    }
}

fn entry_info(name: String, meta: &fs::Metadata) -> EntryInfo {
    let kind = if meta.file_type().is_symlink() {
        EntryKind::Symlink
    } else if meta.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::File
    };
    EntryInfo {
        name,
        kind,
        size: if kind == EntryKind::File { meta.len() } else { 0 },
    }
}
