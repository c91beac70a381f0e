// git.rs — Internal git plumbing for the Documents repository.
//
// These invocations are trusted: they are built here, never from caller
// argv, and run with hooks and system/global config disabled. The git
// directory lives outside the work tree, so the work tree's contents can
// never reconfigure the repository.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::VersionedError;

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

fn default_name() -> String {
    "User Storage".to_string()
}

fn default_email() -> String {
    "storage@localhost".to_string()
}

/// Author and committer of internal commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIdentity {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_email")]
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: default_name(),
            email: default_email(),
        }
    }
}

/// A git repository whose work tree is a zone's data directory.
#[derive(Debug, Clone)]
pub struct GitRepo {
    work_dir: PathBuf,
    git_dir: PathBuf,
    identity: CommitIdentity,
}

impl GitRepo {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        git_dir: impl Into<PathBuf>,
        identity: CommitIdentity,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            git_dir: git_dir.into(),
            identity,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn identity(&self) -> &CommitIdentity {
        &self.identity
    }

    /// Run git in the working directory and return trimmed stdout.
    fn git_cmd(&self, args: &[&str]) -> Result<String, VersionedError> {
        let mut cmd = Command::new("git");
        cmd.env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_else(|| OsString::from("/usr/bin:/bin")))
            .env("LANG", "C")
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", NULL_DEVICE)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_DIR", &self.git_dir)
            .env("GIT_WORK_TREE", &self.work_dir)
            .args(["-c", &format!("core.hooksPath={}", NULL_DEVICE)])
            .args(["-c", "core.fsmonitor=false"])
            .args(["-c", "commit.gpgsign=false"])
            .args(["-c", &format!("user.name={}", self.identity.name)])
            .args(["-c", &format!("user.email={}", self.identity.email)])
            .args(args)
            .current_dir(&self.work_dir);

        let output = cmd.output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                VersionedError::GitUnavailable(e)
            } else {
                VersionedError::Git {
                    args: args.join(" "),
                    stderr: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VersionedError::Git {
                args: args.join(" "),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn is_initialized(&self) -> bool {
        self.git_dir.join("HEAD").exists()
    }

    /// Create the repository on first use. Returns true if it was created.
    pub fn init_if_missing(&self) -> Result<bool, VersionedError> {
        if self.is_initialized() {
            return Ok(false);
        }
        self.git_cmd(&["init", "-q"])?;
        // Repository-level identity, so commits made through git commands
        // run by the caller are attributed the same way.
        self.git_cmd(&["config", "user.name", &self.identity.name])?;
        self.git_cmd(&["config", "user.email", &self.identity.email])?;
        tracing::info!(
            repo = %self.git_dir.display(),
            work_tree = %self.work_dir.display(),
            "initialized documents repository"
        );
        Ok(true)
    }

    /// Stage additions, modifications and removals under `paths`.
    ///
    /// Paths that neither exist on disk nor are tracked are skipped, so
    /// removing an untracked file is not an error.
    pub fn stage(&self, paths: &[&str]) -> Result<(), VersionedError> {
        let mut specs = Vec::new();
        for path in paths {
            let spec = format!(":(literal){}", path);
            let on_disk = self.work_dir.join(path).symlink_metadata().is_ok();
            if on_disk || !self.git_cmd(&["ls-files", "--", &spec])?.is_empty() {
                specs.push(spec);
            }
        }
        if specs.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "-A", "--"];
        args.extend(specs.iter().map(String::as_str));
        self.git_cmd(&args)?;
        Ok(())
    }

    /// Record one commit, even if nothing changed. Returns the new HEAD.
    pub fn commit(&self, message: &str) -> Result<String, VersionedError> {
        self.git_cmd(&[
            "commit",
            "-q",
            "--no-verify",
            "--allow-empty",
            "--allow-empty-message",
            "-m",
            message,
        ])?;
        let head = self.git_cmd(&["rev-parse", "HEAD"])?;
        tracing::info!(commit = %head, message, "documents commit");
        Ok(head)
    }

    pub fn head(&self) -> Result<Option<String>, VersionedError> {
        match self.git_cmd(&["rev-parse", "--verify", "-q", "HEAD"]) {
            Ok(head) => Ok(Some(head)),
            Err(VersionedError::Git { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn commit_count(&self) -> Result<usize, VersionedError> {
        if self.head()?.is_none() {
            return Ok(0);
        }
        let count = self.git_cmd(&["rev-list", "--count", "HEAD"])?;
        Ok(count.parse().unwrap_or(0))
    }

    /// Subject line of the latest commit.
    pub fn last_message(&self) -> Result<Option<String>, VersionedError> {
        if self.head()?.is_none() {
            return Ok(None);
        }
        self.git_cmd(&["log", "-1", "--format=%s"]).map(Some)
    }

    /// Whether the working tree matches HEAD.
    pub fn is_clean(&self) -> Result<bool, VersionedError> {
        Ok(self.git_cmd(&["status", "--porcelain"])?.is_empty())
    }
}
