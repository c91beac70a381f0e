// exec.rs — Command execution in a zone or an edit session.
//
// Both paths share one pipeline: authorize against the zone's capability
// level with the zone's (or session's) resolver validating path arguments,
// then spawn in that directory. In Documents the repository is initialized
// after authorization so read-only git subcommands always find one; git
// anywhere else finds no repository at all.
//
// Symlinks that lead out of the working directory are removed before and
// after every command, so no recursive tool can follow one.

use serde::{Deserialize, Serialize};
use serde_json::json;
use zs_policy::{AuthorizationRequest, AuthorizedCommand, CapabilityLevel, CommandAuthorizer};
use zs_sandbox::{ExecOutput, ExecRequest};
use zs_versioned::GitRepo;
use zs_workspace::{PathResolver, Zone};

use crate::envelope::Envelope;
use crate::error::GatewayError;
use crate::service::{Caller, OpContext, Reply, StorageService};

/// A command invocation: program name, argv (no shell) and optional timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecParams {
    #[serde(alias = "cmd")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds; clamped to the configured maximum.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl ExecParams {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

impl StorageService {
    /// Run a whitelisted command with the zone's data root as working directory.
    pub fn exec(&self, caller: &Caller, zone: Zone, params: &ExecParams) -> Envelope {
        let ctx = OpContext::in_zone(zone, "exec").with_target(params.command.clone());
        let result = self.try_exec(caller, zone, params);
        self.finish(caller, ctx, result)
    }

    fn try_exec(
        &self,
        caller: &Caller,
        zone: Zone,
        params: &ExecParams,
    ) -> Result<Reply<ExecOutput>, GatewayError> {
        let store = self.store(caller, zone)?;
        let authorized = self.authorize(zone.capability(), store.resolver(), params)?;
        let versioned = if zone == Zone::Documents {
            Some(self.versioned_from(store.clone())?)
        } else {
            None
        };
        let repo = versioned.as_ref().map(|v| v.repo());
        self.spawn(&authorized, store.resolver(), repo, params.timeout)
    }

    /// Run a command inside this conversation's edit session for `zone`.
    pub fn edit_exec(&self, caller: &Caller, zone: Zone, params: &ExecParams) -> Envelope {
        let ctx = OpContext::in_zone(zone, "edit_exec").with_target(params.command.clone());
        let result = self.try_edit_exec(caller, zone, params);
        self.finish(caller, ctx, result)
    }

    fn try_edit_exec(
        &self,
        caller: &Caller,
        zone: Zone,
        params: &ExecParams,
    ) -> Result<Reply<ExecOutput>, GatewayError> {
        let editzone = self.editzone(self.store(caller, zone)?)?;
        let resolver = editzone.session_resolver()?;
        let authorized = self.authorize(zone.capability(), &resolver, params)?;
        self.spawn(&authorized, &resolver, None, params.timeout)
    }

    fn authorize(
        &self,
        level: CapabilityLevel,
        resolver: &PathResolver,
        params: &ExecParams,
    ) -> Result<AuthorizedCommand, GatewayError> {
        let request = AuthorizationRequest {
            command: &params.command,
            args: &params.args,
            level,
        };
        Ok(CommandAuthorizer::new(self.policy()).authorize(&request, resolver)?)
    }

    fn spawn(
        &self,
        authorized: &AuthorizedCommand,
        resolver: &PathResolver,
        repo: Option<&GitRepo>,
        timeout: Option<u64>,
    ) -> Result<Reply<ExecOutput>, GatewayError> {
        let mut removed_links = resolver.remove_escaping_links()?;
        let request = ExecRequest {
            command: &authorized.command,
            args: &authorized.args,
            cwd: resolver.root(),
            timeout_secs: timeout,
        };
        let ran = match repo {
            Some(repo) => {
                let env = self
                    .executor()
                    .env()
                    .clone()
                    .with_repository(repo.git_dir(), repo.work_dir());
                self.executor().clone().with_env(env).run(&request)
            }
            None => self.executor().run(&request),
        };
        removed_links.extend(resolver.remove_escaping_links()?);
        let output = ran?;

        let mut message = match output.exit_code {
            Some(code) => format!("{} exited with code {}", authorized.command, code),
            None => format!("{} finished", authorized.command),
        };
        if !removed_links.is_empty() {
            message.push_str(&format!(
                "; removed symlinks leading out of the zone: {}",
                removed_links.join(", ")
            ));
        }
        let mut metadata = json!({
            "args": authorized.args,
            "exit_code": output.exit_code,
            "duration_ms": output.duration_ms,
        });
        if !removed_links.is_empty() {
            metadata["removed_links"] = json!(removed_links);
        }
        Ok(Reply::new(output, message).with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use std::path::Path;
    use tempfile::tempdir;
    use zs_policy::ErrorCode;

    fn service(root: &Path) -> StorageService {
        StorageService::new(StorageConfig::new(root).without_audit()).unwrap()
    }

    #[test]
    fn exec_params_accept_the_short_field_name() {
        let params: ExecParams =
            serde_json::from_str(r#"{"cmd": "ls", "args": ["-la"], "timeout": 5}"#).unwrap();
        assert_eq!(params, ExecParams::new("ls", ["-la"]).with_timeout(5));
    }

    #[test]
    fn refusals_happen_before_anything_runs() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        let caller = Caller::new("alice", "c1");

        let env = service.exec(&caller, Zone::Storage, &ExecParams::new("bash", ["-c", "id"]));
        assert_eq!(env.code(), Some(ErrorCode::CommandForbidden));

        let env = service.exec(&caller, Zone::Uploads, &ExecParams::new("rm", ["a.txt"]));
        assert_eq!(env.code(), Some(ErrorCode::ZoneForbidden));

        let env = service.exec(&caller, Zone::Storage, &ExecParams::new("cat", ["../../etc/passwd"]));
        assert_eq!(env.code(), Some(ErrorCode::PathEscape));

        let env = service.exec(&caller, Zone::Storage, &ExecParams::new("ls", ["a;b"]));
        assert_eq!(env.code(), Some(ErrorCode::ArgumentForbidden));
    }

    #[test]
    fn edit_exec_without_a_session_is_zone_forbidden() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        let env = service.edit_exec(
            &Caller::new("alice", "c1"),
            Zone::Storage,
            &ExecParams::new("ls", Vec::<String>::new()),
        );
        assert_eq!(env.code(), Some(ErrorCode::ZoneForbidden));
    }

    #[test]
    fn exec_reports_non_zero_exit_as_a_result() {
        if which::which("ls").is_err() {
            return;
        }
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        let env = service.exec(
            &Caller::new("alice", "c1"),
            Zone::Storage,
            &ExecParams::new("ls", ["missing-file"]),
        );
        assert!(env.success, "{:?}", env);
        let data = env.data.unwrap();
        assert_eq!(data["success"], false);
        assert_ne!(data["exit_code"], 0);
    }

    #[cfg(unix)]
    #[test]
    fn links_out_of_the_zone_are_removed_around_a_command() {
        if which::which("ls").is_err() {
            return;
        }
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let service = service(dir.path());
        let caller = Caller::new("alice", "c1");
        assert!(service.write(&caller, Zone::Storage, "notes.txt", "n", false, None).success);
        let data = dir.path().join("alice/Storage/data");
        std::os::unix::fs::symlink(outside.path(), data.join("out")).unwrap();
        std::os::unix::fs::symlink("notes.txt", data.join("alias")).unwrap();

        let env = service.exec(&caller, Zone::Storage, &ExecParams::new("ls", Vec::<String>::new()));
        assert!(env.success, "{:?}", env);
        let message = env.message.unwrap();
        assert!(message.ends_with("removed symlinks leading out of the zone: out"), "{}", message);
        assert!(fs_exists_no_follow(&data.join("alias")));
        assert!(!fs_exists_no_follow(&data.join("out")));
        assert!(outside.path().exists());
    }

    fn fs_exists_no_follow(path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok()
    }
}
