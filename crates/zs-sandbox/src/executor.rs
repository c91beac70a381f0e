// executor.rs — Shell-free command execution.
//
// A command is spawned directly from its argv, in its own process group,
// with a rebuilt environment and stdin closed. The wait is sliced so a
// cancellation flag is noticed quickly; on timeout, cancel, or drop the
// whole group is killed before control returns.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use wait_timeout::ChildExt;

use crate::env::SandboxEnv;
use crate::error::SandboxError;
use crate::limits::ExecLimits;

const WAIT_SLICE: Duration = Duration::from_millis(50);
const READ_CHUNK: usize = 8192;

/// One command to run. `args` have already been authorized.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    pub command: &'a str,
    pub args: &'a [String],
    pub cwd: &'a Path,
    /// Requested timeout in seconds; clamped by the executor's limits.
    pub timeout_secs: Option<u64>,
}

/// Result of a command that ran to completion. A non-zero exit is still `Ok`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    limits: ExecLimits,
    env: SandboxEnv,
}

impl CommandExecutor {
    pub fn new(limits: ExecLimits) -> Self {
        Self {
            limits,
            env: SandboxEnv::from_host(),
        }
    }

    pub fn with_env(mut self, env: SandboxEnv) -> Self {
        self.env = env;
        self
    }

    pub fn limits(&self) -> &ExecLimits {
        &self.limits
    }

    pub fn env(&self) -> &SandboxEnv {
        &self.env
    }

    /// Locate `command` on the sandbox PATH.
    pub fn locate(&self, command: &str, cwd: &Path) -> Result<PathBuf, SandboxError> {
        which::which_in(command, Some(self.env.search_path()), cwd).map_err(|_| {
            SandboxError::CommandNotFound {
                command: command.to_string(),
            }
        })
    }

    pub fn run(&self, request: &ExecRequest<'_>) -> Result<ExecOutput, SandboxError> {
        self.run_cancellable(request, &AtomicBool::new(false))
    }

    /// Run until exit, timeout, or `cancel` becomes true.
    pub fn run_cancellable(
        &self,
        request: &ExecRequest<'_>,
        cancel: &AtomicBool,
    ) -> Result<ExecOutput, SandboxError> {
        let command = request.command;
        if !request.cwd.is_dir() {
            return Err(SandboxError::InvalidWorkingDir {
                path: request.cwd.to_path_buf(),
            });
        }
        let timeout_secs = self.limits.timeout_secs(request.timeout_secs);
        let timeout = Duration::from_secs(timeout_secs);
        let program = self.locate(command, request.cwd)?;

        let mut cmd = Command::new(&program);
        cmd.args(request.args)
            .current_dir(request.cwd)
            .env_clear()
            .envs(self.env.vars_for(request.cwd))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let started = Instant::now();
        let child = cmd.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SandboxError::CommandNotFound {
                    command: command.to_string(),
                }
            } else {
                SandboxError::SpawnFailed {
                    command: command.to_string(),
                    source,
                }
            }
        })?;
        let mut guard = GroupGuard::new(child);
        tracing::debug!(command, pid = guard.pid(), timeout_secs, "command spawned");

        let limit = self.limits.max_output_bytes;
        let stdout = guard.child.stdout.take().map(|s| spawn_reader(s, limit));
        let stderr = guard.child.stderr.take().map(|s| spawn_reader(s, limit));

        let status = loop {
            match guard.child.wait_timeout(WAIT_SLICE) {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    return Err(SandboxError::WaitFailed {
                        command: command.to_string(),
                        source,
                    })
                }
            }
            if cancel.load(Ordering::Relaxed) {
                guard.kill();
                tracing::warn!(command, "command cancelled");
                return Err(SandboxError::Cancelled {
                    command: command.to_string(),
                });
            }
            if started.elapsed() >= timeout {
                guard.kill();
                tracing::warn!(command, timeout_secs, "command timed out");
                return Err(SandboxError::Timeout {
                    command: command.to_string(),
                    timeout_secs,
                });
            }
        };
        // Background children left in the group would otherwise outlive us
        // and hold the pipes open.
        guard.finish();

        let (stdout, stdout_truncated) = join_reader(stdout);
        let (stderr, stderr_truncated) = join_reader(stderr);
        let output = ExecOutput {
            exit_code: exit_code(&status),
            success: status.success(),
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        tracing::info!(
            command,
            exit_code = ?output.exit_code,
            duration_ms = output.duration_ms,
            "command finished"
        );
        Ok(output)
    }
}

fn exit_code(status: &ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(|signal| 128 + signal)
    }
    #[cfg(not(unix))]
    {
        None
    }
}

type Reader = JoinHandle<(Vec<u8>, bool)>;

/// Read everything from `source`, keeping at most `limit` bytes.
fn spawn_reader<R: Read + Send + 'static>(mut source: R, limit: usize) -> Reader {
    std::thread::spawn(move || {
        let mut kept = Vec::new();
        let mut truncated = false;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    if n > room {
                        truncated = true;
                    }
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        (kept, truncated)
    })
}

fn join_reader(reader: Option<Reader>) -> (String, bool) {
    let (bytes, truncated) = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    (String::from_utf8_lossy(&bytes).into_owned(), truncated)
}

/// Owns a spawned child; kills its process group unless finished cleanly.
struct GroupGuard {
    child: Child,
    reaped: bool,
}

impl GroupGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn kill_group(&self) {
        #[cfg(unix)]
        {
            if let Ok(pid) = i32::try_from(self.child.id()) {
                // SAFETY: kill(2) with a negative pid signals the process group
                // created by `process_group(0)`; the pid belongs to our child.
                unsafe {
                    libc::kill(-pid, libc::SIGKILL);
                }
            }
        }
    }

    /// Kill the group and reap the leader.
    fn kill(&mut self) {
        self.kill_group();
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }

    /// The leader has exited; clear out anything it left in its group.
    fn finish(&mut self) {
        self.kill_group();
        self.reaped = true;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill();
        }
    }
}
