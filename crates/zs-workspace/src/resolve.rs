// resolve.rs — Zone-relative path resolution.
//
// A caller path is checked three ways before it is handed out:
//
// 1. Lexically: no absolute markers, no encoded traversal, depth never
//    negative, no reserved component anywhere.
// 2. In kernel order: the raw path is walked component by component,
//    following each symlink as it is met and applying `..` to the physical
//    directory, the way a spawned program will see it. Every step must stay
//    under the canonical zone root.
// 3. Physically: the deepest existing ancestor of the normalized path is
//    canonicalized and must still sit under the root.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::WorkspaceError;

const ENCODED_MARKERS: &[&str] = &["%2e%2e", "%2f", "%5c", "%00"];

/// Separators the lexical check splits on; either may come from a caller.
const LEXICAL_SEPARATORS: [char; 2] = ['/', '\\'];

/// Separators the operating system itself honours.
#[cfg(windows)]
const OS_SEPARATORS: &[char] = &['/', '\\'];
#[cfg(not(windows))]
const OS_SEPARATORS: &[char] = &['/'];

/// A path validated to lie inside its zone root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path under the zone root.
    pub absolute: PathBuf,
    /// Normalized relative form with `/` separators; empty for the root.
    pub relative: String,
}

impl ResolvedPath {
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// The relative form for display; `.` for the root.
    pub fn display(&self) -> &str {
        if self.relative.is_empty() {
            "."
        } else {
            &self.relative
        }
    }
}

/// Lexically normalize a caller path to `a/b/c` form.
///
/// `.` and empty segments are dropped and `..` pops a segment; going above
/// the root is an error. `Err` carries the reason.
pub fn normalize_relative(input: &str) -> Result<String, String> {
    if input.contains('\0') {
        return Err("contains a NUL byte".to_string());
    }
    if input.starts_with('/') || input.starts_with('\\') {
        return Err("absolute paths are not allowed".to_string());
    }
    let bytes = input.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err("drive-qualified paths are not allowed".to_string());
    }
    let lowered = input.to_ascii_lowercase();
    if let Some(marker) = ENCODED_MARKERS.iter().find(|m| lowered.contains(*m)) {
        return Err(format!("contains encoded sequence '{}'", marker));
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in input.split(LEXICAL_SEPARATORS) {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err("traverses above the zone root".to_string());
                }
            }
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

/// Resolves caller paths against one zone root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    reserved: Vec<String>,
}

impl PathResolver {
    /// Create a resolver for an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        let root = fs::canonicalize(root).map_err(WorkspaceError::io(root))?;
        Ok(Self {
            root,
            reserved: Vec::new(),
        })
    }

    /// Refuse any path with a component named `name` (e.g. `.git`), at any
    /// depth and in any letter case.
    pub fn with_reserved(mut self, name: impl Into<String>) -> Self {
        self.reserved.push(name.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, input: &str) -> Result<ResolvedPath, WorkspaceError> {
        let relative =
            normalize_relative(input).map_err(|reason| WorkspaceError::escape(input, reason))?;

        // Raw segments, so `sub/.git/../x` is refused along with `sub/.git`.
        let reserved = input.split(LEXICAL_SEPARATORS).find(|segment| {
            self.reserved
                .iter()
                .any(|name| name.eq_ignore_ascii_case(segment))
        });
        if let Some(segment) = reserved {
            return Err(WorkspaceError::escape(
                input,
                format!("'{}' is reserved", segment),
            ));
        }

        self.check_kernel_order(input)?;

        let absolute = if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&relative)
        };
        self.check_physical(input, &absolute)?;

        tracing::debug!(input, relative = %relative, "path resolved");
        Ok(ResolvedPath { absolute, relative })
    }

    /// Walk the raw path as the kernel would: a symlink is resolved when it
    /// is met, so a later `..` climbs from its target, not from the link.
    fn check_kernel_order(&self, input: &str) -> Result<(), WorkspaceError> {
        let segments: Vec<&str> = input.split(OS_SEPARATORS).collect();
        let mut current = self.root.clone();
        let mut followed_link = false;
        let mut missing = false;

        for (index, segment) in segments.iter().enumerate() {
            match *segment {
                "" | "." => continue,
                ".." => {
                    current.pop();
                }
                name => {
                    current.push(name);
                    if !missing {
                        match fs::symlink_metadata(&current) {
                            Ok(meta) if meta.file_type().is_symlink() => {
                                current = match fs::canonicalize(&current) {
                                    Ok(target) => target,
                                    Err(e) if e.kind() == ErrorKind::NotFound => {
                                        let last = segments[index + 1..]
                                            .iter()
                                            .all(|s| s.is_empty() || *s == ".");
                                        let what = if last { "is" } else { "passes through" };
                                        return Err(WorkspaceError::escape(
                                            input,
                                            format!("{} a dangling symlink", what),
                                        ));
                                    }
                                    Err(e) => {
                                        return Err(WorkspaceError::escape(
                                            input,
                                            format!("symlink cannot be resolved: {}", e),
                                        ))
                                    }
                                };
                                followed_link = true;
                            }
                            Ok(_) => {}
                            Err(e) if e.kind() == ErrorKind::NotFound => missing = true,
                            Err(source) => {
                                return Err(WorkspaceError::IoError {
                                    path: current,
                                    source,
                                })
                            }
                        }
                    }
                }
            }
            if !current.starts_with(&self.root) {
                let reason = if followed_link {
                    "resolves outside the zone through a symlink"
                } else {
                    "traverses above the zone root"
                };
                return Err(WorkspaceError::escape(input, reason));
            }
        }
        Ok(())
    }

    /// Remove every symlink under the root that is dangling or resolves
    /// outside it. Returns the removed links, relative to the root.
    ///
    /// Commands can create links the resolver never sees (archive members,
    /// moved relative links); recursive tools would follow them.
    pub fn remove_escaping_links(&self) -> Result<Vec<String>, WorkspaceError> {
        let mut removed = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => continue,
                Err(e) => return Err(e.into()),
            };
            if !entry.path_is_symlink() {
                continue;
            }
            let inside = fs::canonicalize(entry.path())
                .map(|target| target.starts_with(&self.root))
                .unwrap_or(false);
            if inside {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(WorkspaceError::IoError {
                        path: entry.path().to_path_buf(),
                        source,
                    })
                }
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            removed.push(relative.display().to_string());
        }
        if !removed.is_empty() {
            tracing::warn!(
                root = %self.root.display(),
                links = ?removed,
                "removed symlinks leading out of the zone"
            );
        }
        Ok(removed)
    }

    /// Follow symlinks of the deepest existing ancestor and verify the
    /// physical location is still under the root.
    fn check_physical(&self, input: &str, absolute: &Path) -> Result<(), WorkspaceError> {
        let mut existing = absolute.to_path_buf();
        let mut is_final = true;
        loop {
            match fs::symlink_metadata(&existing) {
                Ok(meta) => {
                    if meta.file_type().is_symlink() {
                        match fs::metadata(&existing) {
                            Ok(_) => {}
                            Err(e) if e.kind() == ErrorKind::NotFound => {
                                let what = if is_final { "is" } else { "passes through" };
                                return Err(WorkspaceError::escape(
                                    input,
                                    format!("{} a dangling symlink", what),
                                ));
                            }
                            Err(source) => {
                                return Err(WorkspaceError::IoError {
                                    path: existing,
                                    source,
                                })
                            }
                        }
                    }
                    break;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if !existing.pop() || !existing.starts_with(&self.root) {
                        return Err(WorkspaceError::escape(input, "zone root is missing"));
                    }
                    is_final = false;
                }
                Err(source) => {
                    return Err(WorkspaceError::IoError {
                        path: existing,
                        source,
                    })
                }
            }
        }

        let physical = fs::canonicalize(&existing).map_err(WorkspaceError::io(&existing))?;
        if !physical.starts_with(&self.root) {
            return Err(WorkspaceError::escape(
                input,
                "resolves outside the zone through a symlink",
            ));
        }
        Ok(())
    }
}

impl zs_policy::PathValidator for PathResolver {
    fn check_argument(&self, argument: &str) -> Result<(), String> {
        match self.resolve(argument) {
            Ok(_) => Ok(()),
            Err(WorkspaceError::PathEscape { reason, .. }) => Err(reason),
            Err(other) => Err(other.to_string()),
        }
    }
}
