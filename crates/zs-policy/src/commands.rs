// commands.rs — Process-wide command tables.
//
// The whitelists, git subcommand sets and blacklist are fixed at compile time.
// `CommandPolicy` bundles them with per-command guards and the metacharacter
// pattern; it is built once at start-up and shared by reference.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::guards::{Guard, GUARDS};
use crate::schema::{schema_for, ArgSchema};

/// Commands allowed in every zone, including read-only ones.
pub const READ_ONLY_COMMANDS: &[&str] = &[
    "cat", "head", "tail", "less", "more", "nl", "wc", "stat", "file", "du", "tac", "ls",
    "tree", "find", "grep", "egrep", "fgrep", "rg", "awk", "sed", "sort", "uniq", "cut",
    "paste", "tr", "fold", "fmt", "column", "rev", "shuf", "expand", "unexpand", "pr", "join",
    "diff", "diff3", "cmp", "comm", "tar", "unzip", "zipinfo", "7z", "zcat", "bzcat", "xzcat",
    "md5sum", "sha1sum", "sha256sum", "sha512sum", "b2sum", "cksum", "base32", "base64",
    "basenc", "strings", "od", "hexdump", "xxd", "jq", "xmllint", "yq", "iconv", "bc", "dc",
    "expr", "factor", "numfmt", "basename", "dirname", "realpath", "echo", "printf", "ffprobe",
    "identify", "exiftool", "sqlite3", "git",
];

/// Commands allowed only in zones that can write, on top of the read-only set.
pub const READ_WRITE_COMMANDS: &[&str] = &[
    "df", "locate", "which", "whereis", "split", "csplit", "sdiff", "patch", "colordiff", "zip",
    "7za", "gzip", "gunzip", "bzip2", "bunzip2", "xz", "unxz", "lz4", "zstd", "sum",
    "uuencode", "uudecode", "touch", "mkdir", "rm", "rmdir", "mv", "cp", "ln", "truncate",
    "mktemp", "install", "shred", "rename", "chmod", "pandoc", "dos2unix", "unix2dos", "recode",
    "seq", "date", "cal", "readlink", "pathchk", "pwd", "uname", "nproc", "printenv", "env",
    "timeout", "sleep", "yes", "tee", "xargs", "envsubst", "gettext", "tsort", "true", "false",
    "ffmpeg", "magick", "convert",
];

/// Commands refused in every zone, whitelisted or not.
pub const BLACKLISTED_COMMANDS: &[&str] = &[
    "bash", "sh", "zsh", "fish", "dash", "csh", "tcsh", "ksh", "python", "python3", "perl",
    "ruby", "node", "php", "lua", "exec", "eval", "source", "nohup", "disown", "setsid",
    "screen", "tmux", "at", "batch", "crontab", "sudo", "su", "doas", "chown", "chgrp", "wget",
    "curl", "fetch", "ssh", "scp", "sftp", "rsync", "nc", "netcat", "ncat", "telnet", "ftp",
    "ping", "traceroute", "dd", "mount", "umount", "kill", "killall", "pkill", "reboot",
    "shutdown", "halt", "poweroff", "systemctl", "service", "mkfs", "fdisk", "parted",
    "iptables", "firewall-cmd",
];

pub const GIT_READ_SUBCOMMANDS: &[&str] = &[
    "status", "log", "show", "diff", "branch", "tag", "blame", "ls-files", "ls-tree",
    "shortlog", "reflog", "describe", "rev-parse", "rev-list", "cat-file",
];

pub const GIT_WRITE_SUBCOMMANDS: &[&str] = &[
    "add", "commit", "reset", "restore", "checkout", "rm", "mv", "revert", "cherry-pick",
    "stash", "clean",
];

/// Remote and maintenance subcommands, denied in every zone.
pub const GIT_FORBIDDEN_SUBCOMMANDS: &[&str] = &[
    "push", "pull", "fetch", "clone", "remote", "gc", "prune", "filter-branch",
];

/// Shell syntax that is never accepted in a command name or argument, even
/// though nothing is ever passed through a shell.
pub const METACHARACTER_PATTERN: &str = r"[;&|`$\n\r]|&&|\|\||>>|<<|>\s|<\s|\$\(|\$\{";

/// Which half of the whitelist a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandClass {
    ReadOnly,
    ReadWrite,
}

/// Classification of a git subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitRule {
    Read,
    Write,
    Forbidden,
    Unknown,
}

/// Immutable command tables plus compiled guards.
#[derive(Debug)]
pub struct CommandPolicy {
    read_only: BTreeSet<&'static str>,
    read_write: BTreeSet<&'static str>,
    blacklist: BTreeSet<&'static str>,
    guards: HashMap<&'static str, Vec<Guard>>,
    metacharacters: Regex,
}

impl CommandPolicy {
    /// Build the standard tables. Fails only if a built-in pattern is malformed.
    pub fn standard() -> Result<Self, PolicyError> {
        let metacharacters =
            Regex::new(METACHARACTER_PATTERN).map_err(|e| PolicyError::InvalidPattern {
                command: "*".to_string(),
                pattern: METACHARACTER_PATTERN.to_string(),
                reason: e.to_string(),
            })?;

        let mut guards: HashMap<&'static str, Vec<Guard>> = HashMap::new();
        for spec in GUARDS {
            guards
                .entry(spec.command)
                .or_default()
                .push(Guard::compile(spec)?);
        }

        Ok(Self {
            read_only: READ_ONLY_COMMANDS.iter().copied().collect(),
            read_write: READ_WRITE_COMMANDS.iter().copied().collect(),
            blacklist: BLACKLISTED_COMMANDS.iter().copied().collect(),
            guards,
            metacharacters,
        })
    }

    pub fn classify(&self, command: &str) -> Option<CommandClass> {
        if self.read_only.contains(command) {
            Some(CommandClass::ReadOnly)
        } else if self.read_write.contains(command) {
            Some(CommandClass::ReadWrite)
        } else {
            None
        }
    }

    pub fn is_blacklisted(&self, command: &str) -> bool {
        self.blacklist.contains(command)
    }

    pub fn git_rule(&self, subcommand: &str) -> GitRule {
        if GIT_FORBIDDEN_SUBCOMMANDS.contains(&subcommand) {
            GitRule::Forbidden
        } else if GIT_READ_SUBCOMMANDS.contains(&subcommand) {
            GitRule::Read
        } else if GIT_WRITE_SUBCOMMANDS.contains(&subcommand) {
            GitRule::Write
        } else {
            GitRule::Unknown
        }
    }

    /// The first metacharacter match in `text`, if any.
    pub fn metacharacter_in<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.metacharacters.find(text).map(|m| m.as_str())
    }

    pub fn schema(&self, command: &str) -> ArgSchema {
        schema_for(command).unwrap_or_default()
    }

    pub fn guards(&self, command: &str) -> &[Guard] {
        self.guards.get(command).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Commands usable in a read-only zone, sorted.
    pub fn read_only_commands(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.read_only.iter().copied()
    }

    /// Commands usable only in a writable zone, sorted.
    pub fn read_write_commands(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.read_write.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_disjoint() {
        let policy = CommandPolicy::standard().unwrap();
        for cmd in BLACKLISTED_COMMANDS {
            assert!(policy.classify(cmd).is_none(), "{cmd} is blacklisted and whitelisted");
        }
        for cmd in READ_WRITE_COMMANDS {
            assert!(!READ_ONLY_COMMANDS.contains(cmd), "{cmd} listed twice");
        }
    }

    #[test]
    fn git_subcommands_classified() {
        let policy = CommandPolicy::standard().unwrap();
        assert_eq!(policy.git_rule("log"), GitRule::Read);
        assert_eq!(policy.git_rule("commit"), GitRule::Write);
        assert_eq!(policy.git_rule("push"), GitRule::Forbidden);
        assert_eq!(policy.git_rule("config"), GitRule::Unknown);
    }

    #[test]
    fn metacharacters_found() {
        let policy = CommandPolicy::standard().unwrap();
        assert_eq!(policy.metacharacter_in("a; rm -rf /"), Some(";"));
        assert_eq!(policy.metacharacter_in("$(id)"), Some("$"));
        assert_eq!(policy.metacharacter_in("a > b"), Some("> "));
        assert_eq!(policy.metacharacter_in("x>5"), None);
        assert_eq!(policy.metacharacter_in("plain-name.txt"), None);
    }
}
