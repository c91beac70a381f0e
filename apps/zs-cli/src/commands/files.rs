// files.rs — Zone file subcommands: exec, write, delete, rename.

use std::io::Read;

use anyhow::Context;
use clap::Args;
use zs_gateway::{ExecParams, Request, Zone};

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Zone to run in (uploads, storage, documents).
    pub zone: Zone,
    /// Timeout in seconds (clamped to the configured maximum).
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Program to run. No shell is involved.
    pub command: String,
    /// Arguments passed to the program as-is.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl ExecArgs {
    pub fn params(&self) -> ExecParams {
        let params = ExecParams::new(self.command.clone(), self.args.iter().cloned());
        match self.timeout {
            Some(seconds) => params.with_timeout(seconds),
            None => params,
        }
    }
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    pub zone: Zone,
    /// Path relative to the zone.
    pub path: String,
    /// Text to write; read from stdin when omitted.
    pub content: Option<String>,
    /// Append instead of replacing.
    #[arg(long)]
    pub append: bool,
    /// Commit message (Documents only).
    #[arg(long, short)]
    pub message: Option<String>,
}

impl WriteArgs {
    pub fn to_request(&self) -> anyhow::Result<Request> {
        Ok(Request::Write {
            zone: self.zone,
            path: self.path.clone(),
            content: content_or_stdin(self.content.as_deref())?,
            append: self.append,
            message: self.message.clone(),
        })
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub zone: Zone,
    pub path: String,
    #[arg(long, short)]
    pub message: Option<String>,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    pub zone: Zone,
    pub from: String,
    pub to: String,
    #[arg(long, short)]
    pub message: Option<String>,
}

/// Use `content` when given, otherwise everything on stdin.
pub fn content_or_stdin(content: Option<&str>) -> anyhow::Result<String> {
    match content {
        Some(text) => Ok(text.to_string()),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read content from stdin")?;
            Ok(buf)
        }
    }
}
