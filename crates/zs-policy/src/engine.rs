// engine.rs — Command authorization pipeline.
//
// Every command request passes through `CommandAuthorizer::authorize()`
// before anything is spawned. The checks run in a fixed order and the first
// failure wins:
//
// 1. Shell metacharacters in the name or any argument → ARGUMENT_FORBIDDEN
// 2. Name carries a path, or is blacklisted → COMMAND_FORBIDDEN
// 3. Not whitelisted → COMMAND_NOT_FOUND; read-write command in a read-only
//    zone → ZONE_FORBIDDEN
// 4. git subcommand rule; git itself only runs in the versioned zone
// 5. Per-command guards (in-place edits in read-only zones, embedded exec)
// 6. Wrapped commands (timeout, env, xargs, find -exec) authorized recursively
// 7. Every path-like argument must stay inside the zone → PATH_ESCAPE

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityLevel;
use crate::code::ErrorCode;
use crate::commands::{CommandClass, CommandPolicy, GitRule};
use crate::error::AuthorizationError;
use crate::guards::GuardScope;

/// Wrappers may nest (`timeout 5 env X=1 wc a`), but not without bound.
const MAX_NESTING: usize = 4;

/// Validates path-like command arguments against a zone.
///
/// Implemented by the workspace's path resolver; `Err` carries the reason the
/// argument was rejected.
pub trait PathValidator {
    fn check_argument(&self, argument: &str) -> Result<(), String>;
}

impl<F> PathValidator for F
where
    F: Fn(&str) -> Result<(), String>,
{
    fn check_argument(&self, argument: &str) -> Result<(), String> {
        self(argument)
    }
}

/// A command request, as received from the caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub command: &'a str,
    pub args: &'a [String],
    /// Capability level of the zone the command will run in.
    pub level: CapabilityLevel,
}

/// A request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedCommand {
    pub command: String,
    pub args: Vec<String>,
    pub class: CommandClass,
    /// Arguments that were validated as paths, including those of nested commands.
    pub path_arguments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AuthorizationDecision {
    Allow,
    Deny { code: ErrorCode, reason: String },
}

/// One check performed by the authorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Which check was performed (e.g., "metacharacters", "whitelist").
    pub check: String,
    /// The outcome of this check (e.g., "passed", "failed: blacklisted").
    pub outcome: String,
    /// Whether this step was the terminal decision point.
    pub terminal: bool,
}

/// Decision plus the ordered checks that produced it, for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTrace {
    pub decision: AuthorizationDecision,
    pub steps: Vec<EvaluationStep>,
    pub path_arguments: Vec<String>,
}

/// Applies a [`CommandPolicy`] to command requests.
#[derive(Debug, Clone, Copy)]
pub struct CommandAuthorizer<'p> {
    policy: &'p CommandPolicy,
}

impl<'p> CommandAuthorizer<'p> {
    pub fn new(policy: &'p CommandPolicy) -> Self {
        Self { policy }
    }

    /// Authorize a request; on success the command may be spawned as-is.
    pub fn authorize(
        &self,
        request: &AuthorizationRequest<'_>,
        paths: &dyn PathValidator,
    ) -> Result<AuthorizedCommand, AuthorizationError> {
        let mut steps = Vec::new();
        let result = self.evaluate(request, paths, 0, &mut steps);
        match &result {
            Ok(authorized) => tracing::debug!(
                command = request.command,
                paths = authorized.path_arguments.len(),
                "command authorized"
            ),
            Err(err) => tracing::warn!(
                command = request.command,
                code = %err.code(),
                error = %err,
                "command denied"
            ),
        }
        result
    }

    /// Same checks as `authorize()`, returning every step for auditing.
    pub fn authorize_with_trace(
        &self,
        request: &AuthorizationRequest<'_>,
        paths: &dyn PathValidator,
    ) -> EvaluationTrace {
        let mut steps = Vec::new();
        match self.evaluate(request, paths, 0, &mut steps) {
            Ok(authorized) => EvaluationTrace {
                decision: AuthorizationDecision::Allow,
                steps,
                path_arguments: authorized.path_arguments,
            },
            Err(err) => EvaluationTrace {
                decision: AuthorizationDecision::Deny {
                    code: err.code(),
                    reason: err.to_string(),
                },
                steps,
                path_arguments: Vec::new(),
            },
        }
    }

    fn evaluate(
        &self,
        request: &AuthorizationRequest<'_>,
        paths: &dyn PathValidator,
        depth: usize,
        steps: &mut Vec<EvaluationStep>,
    ) -> Result<AuthorizedCommand, AuthorizationError> {
        let AuthorizationRequest {
            command,
            args,
            level,
        } = *request;

        // Step 1: shell syntax anywhere.
        let tokens = std::iter::once(command).chain(args.iter().map(String::as_str));
        for token in tokens {
            if let Some(found) = self.policy.metacharacter_in(token) {
                return Err(deny(
                    steps,
                    "metacharacters",
                    AuthorizationError::ArgumentForbidden {
                        argument: token.to_string(),
                        reason: format!("contains shell syntax '{}'", found.escape_debug()),
                    },
                ));
            }
        }
        pass(steps, "metacharacters", "passed");

        // Step 2: name shape and blacklist.
        if command.is_empty() {
            return Err(deny(
                steps,
                "command_name",
                AuthorizationError::CommandNotFound {
                    command: String::new(),
                },
            ));
        }
        if command.contains('/') || command.contains('\\') {
            return Err(deny(
                steps,
                "command_name",
                AuthorizationError::CommandForbidden {
                    command: command.to_string(),
                    reason: "command names may not contain a path".to_string(),
                },
            ));
        }
        if self.policy.is_blacklisted(command) {
            return Err(deny(
                steps,
                "blacklist",
                AuthorizationError::CommandForbidden {
                    command: command.to_string(),
                    reason: "blacklisted in every zone".to_string(),
                },
            ));
        }
        pass(steps, "blacklist", "passed");

        // Step 3: whitelist and zone capability.
        let class = match self.policy.classify(command) {
            Some(class) => class,
            None => {
                return Err(deny(
                    steps,
                    "whitelist",
                    AuthorizationError::CommandNotFound {
                        command: command.to_string(),
                    },
                ))
            }
        };
        if class == CommandClass::ReadWrite && !level.can_write() {
            return Err(deny(
                steps,
                "whitelist",
                AuthorizationError::ZoneForbidden {
                    command: command.to_string(),
                    reason: "modifying commands are not allowed in a read-only zone".to_string(),
                },
            ));
        }
        pass(steps, "whitelist", &format!("{:?}", class));

        // Step 4: git subcommands.
        if command == "git" {
            self.check_git(args, level, steps)?;
        }

        // Step 5: guards.
        let classified = self.policy.schema(command).classify(args);
        for guard in self.policy.guards(command) {
            if guard.scope == GuardScope::ReadOnly && level.can_write() {
                continue;
            }
            if let Some(argument) = guard.violation(args, &classified) {
                return Err(deny(
                    steps,
                    "guards",
                    AuthorizationError::ArgumentForbidden {
                        argument,
                        reason: guard.reason.to_string(),
                    },
                ));
            }
        }
        pass(steps, "guards", "passed");

        // Step 6: nested commands.
        let mut path_arguments = Vec::new();
        for nested in &classified.nested {
            if depth >= MAX_NESTING {
                return Err(deny(
                    steps,
                    "nested_command",
                    AuthorizationError::ArgumentForbidden {
                        argument: nested.command.to_string(),
                        reason: "too many nested command wrappers".to_string(),
                    },
                ));
            }
            pass(steps, "nested_command", nested.command);
            let inner = AuthorizationRequest {
                command: nested.command,
                args: nested.args,
                level,
            };
            let authorized = self.evaluate(&inner, paths, depth + 1, steps)?;
            path_arguments.extend(authorized.path_arguments);
        }

        // Step 7: path arguments.
        for argument in &classified.paths {
            if let Err(reason) = paths.check_argument(argument) {
                return Err(deny(
                    steps,
                    "path_arguments",
                    AuthorizationError::PathEscape {
                        argument: argument.to_string(),
                        reason,
                    },
                ));
            }
            path_arguments.push(argument.to_string());
        }
        pass(
            steps,
            "path_arguments",
            &format!("{} checked", classified.paths.len()),
        );

        Ok(AuthorizedCommand {
            command: command.to_string(),
            args: args.to_vec(),
            class,
            path_arguments,
        })
    }

    fn check_git(
        &self,
        args: &[String],
        level: CapabilityLevel,
        steps: &mut Vec<EvaluationStep>,
    ) -> Result<(), AuthorizationError> {
        let sub = match args.first() {
            Some(sub) => sub.as_str(),
            None => {
                return Err(deny(
                    steps,
                    "git_subcommand",
                    AuthorizationError::ArgumentForbidden {
                        argument: "git".to_string(),
                        reason: "a git subcommand is required".to_string(),
                    },
                ))
            }
        };
        let command = format!("git {}", sub);
        let denial = match self.policy.git_rule(sub) {
            GitRule::Read | GitRule::Write if !level.is_versioned() => {
                Some(AuthorizationError::ZoneForbidden {
                    command,
                    reason: "git runs only in the versioned zone".to_string(),
                })
            }
            GitRule::Read => None,
            GitRule::Write if level.can_write() => None,
            GitRule::Write => Some(AuthorizationError::ZoneForbidden {
                command,
                reason: "git write subcommands need a writable zone".to_string(),
            }),
            GitRule::Forbidden => Some(AuthorizationError::CommandForbidden {
                command,
                reason: "remote and maintenance subcommands are never allowed".to_string(),
            }),
            GitRule::Unknown => Some(AuthorizationError::CommandForbidden {
                command,
                reason: "unknown git subcommand".to_string(),
            }),
        };
        match denial {
            Some(err) => Err(deny(steps, "git_subcommand", err)),
            None => {
                pass(steps, "git_subcommand", sub);
                Ok(())
            }
        }
    }
}

fn pass(steps: &mut Vec<EvaluationStep>, check: &str, outcome: &str) {
    steps.push(EvaluationStep {
        check: check.to_string(),
        outcome: outcome.to_string(),
        terminal: false,
    });
}

fn deny(
    steps: &mut Vec<EvaluationStep>,
    check: &str,
    err: AuthorizationError,
) -> AuthorizationError {
    steps.push(EvaluationStep {
        check: check.to_string(),
        outcome: format!("failed: {}", err),
        terminal: true,
    });
    err
}
