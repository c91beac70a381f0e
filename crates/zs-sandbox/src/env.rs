// env.rs — The environment a sandboxed command sees.
//
// The host environment is never inherited. Each command gets a fixed PATH,
// HOME pointing at its working directory, and git settings that disable
// hooks, pagers, editors and credential prompts. git never discovers a
// repository on its own: it is pointed at one explicitly, or at none.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// Overrides applied through `GIT_CONFIG_COUNT`; they beat any repository config.
const GIT_OVERRIDES: &[(&str, &str)] = &[
    ("core.hooksPath", NULL_DEVICE),
    ("core.fsmonitor", "false"),
    ("core.pager", "cat"),
    ("core.editor", "true"),
    ("sequence.editor", "true"),
    ("core.sshCommand", "false"),
    ("core.askPass", "true"),
    ("protocol.allow", "never"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Repository {
    git_dir: PathBuf,
    work_tree: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxEnv {
    path: OsString,
    lang: String,
    extra: BTreeMap<String, String>,
    repository: Option<Repository>,
}

impl Default for SandboxEnv {
    fn default() -> Self {
        Self {
            path: OsString::from(DEFAULT_PATH),
            lang: "C.UTF-8".to_string(),
            extra: BTreeMap::new(),
            repository: None,
        }
    }
}

impl SandboxEnv {
    /// Start from the host's PATH (only PATH), falling back to the default.
    pub fn from_host() -> Self {
        let mut env = Self::default();
        if let Some(path) = std::env::var_os("PATH").filter(|p| !p.is_empty()) {
            env.path = path;
        }
        env
    }

    pub fn with_path(mut self, path: impl Into<OsString>) -> Self {
        self.path = path.into();
        self
    }

    /// Add a fixed variable, e.g. a commit identity for user-run git.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Point git at `git_dir`, checked out at `work_tree`. Without this, git
    /// run by a command finds no repository.
    pub fn with_repository(
        mut self,
        git_dir: impl Into<PathBuf>,
        work_tree: impl Into<PathBuf>,
    ) -> Self {
        self.repository = Some(Repository {
            git_dir: git_dir.into(),
            work_tree: work_tree.into(),
        });
        self
    }

    pub fn search_path(&self) -> &OsString {
        &self.path
    }

    /// Variables for a command running in `cwd`.
    pub fn vars_for(&self, cwd: &Path) -> Vec<(OsString, OsString)> {
        let mut vars: Vec<(OsString, OsString)> = vec![
            ("PATH".into(), self.path.clone()),
            ("HOME".into(), cwd.as_os_str().to_owned()),
            ("LANG".into(), self.lang.clone().into()),
            ("TMPDIR".into(), std::env::temp_dir().into_os_string()),
            ("PAGER".into(), "cat".into()),
            ("GIT_PAGER".into(), "cat".into()),
            ("GIT_EDITOR".into(), "true".into()),
            ("GIT_TERMINAL_PROMPT".into(), "0".into()),
            ("GIT_CONFIG_NOSYSTEM".into(), "1".into()),
            ("GIT_CONFIG_GLOBAL".into(), NULL_DEVICE.into()),
            (
                "GIT_CONFIG_COUNT".into(),
                GIT_OVERRIDES.len().to_string().into(),
            ),
        ];
        if let Some(parent) = cwd.parent() {
            vars.push((
                "GIT_CEILING_DIRECTORIES".into(),
                parent.as_os_str().to_owned(),
            ));
        }
        match &self.repository {
            Some(repo) => {
                vars.push(("GIT_DIR".into(), repo.git_dir.as_os_str().to_owned()));
                vars.push(("GIT_WORK_TREE".into(), repo.work_tree.as_os_str().to_owned()));
            }
            None => vars.push(("GIT_DIR".into(), NULL_DEVICE.into())),
        }
        for (i, (key, value)) in GIT_OVERRIDES.iter().enumerate() {
            vars.push((format!("GIT_CONFIG_KEY_{}", i).into(), (*key).into()));
            vars.push((format!("GIT_CONFIG_VALUE_{}", i).into(), (*value).into()));
        }
        for (key, value) in &self.extra {
            vars.push((key.into(), value.into()));
        }
        vars
    }
}
