// fsops.rs — Filesystem primitives shared by the zone store and edit zone.
//
// Every file that replaces user data is written to a temp sibling first and
// renamed into place, so a failed write never leaves a truncated file.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::WorkspaceError;
use crate::zone::GIT_DIR;

fn temp_sibling(target: &Path) -> Result<NamedTempFile, WorkspaceError> {
    let parent = target.parent().unwrap_or(target);
    fs::create_dir_all(parent).map_err(WorkspaceError::io(parent))?;
    NamedTempFile::new_in(parent).map_err(WorkspaceError::io(parent))
}

fn persist(temp: NamedTempFile, target: &Path) -> Result<(), WorkspaceError> {
    temp.persist(target)
        .map(|_| ())
        .map_err(|e| WorkspaceError::IoError {
            path: target.to_path_buf(),
            source: e.error,
        })
}

/// Write `content` to `target` through a temp sibling.
///
/// With `append`, the existing bytes are carried over first.
pub fn write_atomic(target: &Path, content: &[u8], append: bool) -> Result<(), WorkspaceError> {
    let mut temp = temp_sibling(target)?;
    if append {
        match File::open(target) {
            Ok(mut existing) => {
                io::copy(&mut existing, temp.as_file_mut()).map_err(WorkspaceError::io(target))?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(WorkspaceError::IoError {
                    path: target.to_path_buf(),
                    source,
                })
            }
        }
    }
    temp.write_all(content).map_err(WorkspaceError::io(target))?;
    temp.flush().map_err(WorkspaceError::io(target))?;
    persist(temp, target)
}

/// Copy one regular file through a temp sibling of `dst`.
pub fn copy_file_atomic(src: &Path, dst: &Path) -> Result<u64, WorkspaceError> {
    let mut temp = temp_sibling(dst)?;
    let mut input = File::open(src).map_err(WorkspaceError::io(src))?;
    let bytes = io::copy(&mut input, temp.as_file_mut()).map_err(WorkspaceError::io(dst))?;
    persist(temp, dst)?;
    Ok(bytes)
}

/// What [`copy_tree`] copied, and what it left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopiedTree {
    pub bytes: u64,
    pub files: u64,
    /// Paths (relative to the source) of symlinks, special files and `.git`
    /// entries that were not copied.
    pub skipped: Vec<String>,
}

fn is_repository_metadata(name: &std::ffi::OsStr) -> bool {
    name.eq_ignore_ascii_case(GIT_DIR)
}

/// Copy a file or directory tree. Directories merge into an existing `dst`.
///
/// Only directories and regular files are copied. Symlinks are never
/// followed and `.git` entries are never carried over; both are listed in
/// `skipped`.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopiedTree, WorkspaceError> {
    let meta = fs::symlink_metadata(src).map_err(WorkspaceError::io(src))?;
    if meta.is_file() {
        let bytes = copy_file_atomic(src, dst)?;
        return Ok(CopiedTree {
            bytes,
            files: 1,
            skipped: Vec::new(),
        });
    }

    let mut copied = CopiedTree::default();
    let mut walker = WalkDir::new(src).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        let kind = entry.file_type();
        if entry.depth() > 0 && is_repository_metadata(entry.file_name()) {
            if kind.is_dir() {
                walker.skip_current_dir();
            }
            copied.skipped.push(relative.display().to_string());
        } else if kind.is_dir() {
            fs::create_dir_all(&target).map_err(WorkspaceError::io(&target))?;
        } else if kind.is_file() {
            copied.bytes += copy_file_atomic(entry.path(), &target)?;
            copied.files += 1;
        } else {
            copied.skipped.push(relative.display().to_string());
        }
    }
    if !copied.skipped.is_empty() {
        tracing::debug!(
            src = %src.display(),
            skipped = copied.skipped.len(),
            "entries left out of copy"
        );
    }
    Ok(copied)
}

/// Entries under `src` that [`copy_tree`] would skip.
pub fn uncopyable_entries(src: &Path) -> Result<Vec<String>, WorkspaceError> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(src).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let kind = entry.file_type();
        let metadata_dir = entry.depth() > 0 && is_repository_metadata(entry.file_name());
        if metadata_dir || !(kind.is_dir() || kind.is_file()) {
            let relative = match entry.path().strip_prefix(src) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                _ => Path::new(entry.file_name()),
            };
            found.push(relative.display().to_string());
            if metadata_dir && kind.is_dir() {
                walker.skip_current_dir();
            }
        }
    }
    Ok(found)
}

/// Remove a file, symlink or directory tree. Returns false if nothing was there.
pub fn remove_path(path: &Path) -> Result<bool, WorkspaceError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(WorkspaceError::IoError {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(WorkspaceError::IoError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Remove empty directories from `path`'s parent upward, stopping at `stop_at`.
pub fn prune_empty_parents(path: &Path, stop_at: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

pub fn remove_with_empty_parents(path: &Path, stop_at: &Path) -> Result<bool, WorkspaceError> {
    let removed = remove_path(path)?;
    prune_empty_parents(path, stop_at);
    Ok(removed)
}
