//! # zs-cli
//!
//! Command-line interface for zoned user storage.
//!
//! Every storage subcommand runs one operation for `--user`/`--conversation`
//! and prints its JSON envelope on stdout; the exit status is 1 when the
//! envelope reports an error.
//! - `zs exec <zone> <cmd> [args...]`: run a whitelisted command in a zone
//! - `zs write|delete|rename`: file operations (Documents commits each one)
//! - `zs edit open|exec|write|save|cancel`: the safe-edit protocol
//! - `zs bridge <from> <to> <src> <dest>`: copy or move between zones
//! - `zs import`, `zs stats`, `zs allowed-commands`, `zs unlock`, `zs maintenance`
//! - `zs request '<json>'`: run a raw JSON request
//! - `zs audit verify|tail`: inspect the audit trail

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zs_gateway::{Caller, Request, StorageConfig, StorageService, Zone};

use commands::audit::AuditCommands;
use commands::edit::EditCommands;
use commands::files::{DeleteArgs, ExecArgs, RenameArgs, WriteArgs};
use commands::utility::{BridgeArgs, ImportArgs};

/// Zoned storage CLI: sandboxed files and commands for agents.
#[derive(Parser, Debug)]
#[command(name = "zs", version, about)]
struct Cli {
    /// Config file (defaults to <config dir>/zonestore/config.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the storage root from the config.
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    /// User whose storage is addressed.
    #[arg(long, global = true, default_value = "anonymous")]
    user: String,

    /// Conversation (edit session and Uploads scope).
    #[arg(long, global = true, default_value = "default")]
    conversation: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a whitelisted command in a zone.
    Exec(ExecArgs),
    /// Write text to a file.
    Write(WriteArgs),
    /// Delete a file or directory.
    Delete(DeleteArgs),
    /// Rename or move within a zone.
    Rename(RenameArgs),
    /// Safe editing through a locked working copy.
    Edit {
        #[command(subcommand)]
        command: EditCommands,
    },
    /// Copy (or move, Documents to Storage) between zones.
    Bridge(BridgeArgs),
    /// Import host files into this conversation's Uploads.
    Import(ImportArgs),
    /// Show the usage guide.
    Guide,
    /// Show per-zone usage and the quota.
    Stats,
    /// List whitelisted commands per zone and which are installed.
    AllowedCommands,
    /// Break an edit lock held by any conversation.
    Unlock { zone: Zone, path: String },
    /// Clean up expired locks and orphaned working copies.
    Maintenance,
    /// Run a raw JSON request, e.g. '{"op":"stats"}'.
    Request { json: String },
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
}

impl Commands {
    fn to_request(&self) -> anyhow::Result<Request> {
        let request = match self {
            Commands::Exec(exec) => Request::Exec {
                zone: exec.zone,
                params: exec.params(),
            },
            Commands::Write(write) => write.to_request()?,
            Commands::Delete(delete) => Request::Delete {
                zone: delete.zone,
                path: delete.path.clone(),
                message: delete.message.clone(),
            },
            Commands::Rename(rename) => Request::Rename {
                zone: rename.zone,
                from: rename.from.clone(),
                to: rename.to.clone(),
                message: rename.message.clone(),
            },
            Commands::Edit { command } => command.to_request()?,
            Commands::Bridge(bridge) => bridge.to_request(),
            Commands::Import(import) => import.to_request(),
            Commands::Guide => Request::Help,
            Commands::Stats => Request::Stats,
            Commands::AllowedCommands => Request::AllowedCommands,
            Commands::Unlock { zone, path } => Request::ForceUnlock {
                zone: *zone,
                path: path.clone(),
            },
            Commands::Maintenance => Request::Maintenance,
            Commands::Request { json } => {
                serde_json::from_str(json).context("request is not a valid JSON operation")?
            }
            Commands::Audit { .. } => anyhow::bail!("audit commands do not map to a request"),
        };
        Ok(request)
    }
}

/// Explicit `--config`, else the per-user config file if it exists, else
/// defaults; `--storage-root` wins over either.
fn resolve_config(explicit: Option<&Path>, storage_root: Option<&Path>) -> anyhow::Result<StorageConfig> {
    let mut config = match explicit {
        Some(path) => StorageConfig::load(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => StorageConfig::load(&path)?,
            None => StorageConfig::default(),
        },
    };
    if let Some(root) = storage_root {
        config.storage_root = root.to_path_buf();
    }
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zonestore").join("config.toml"))
}

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout carries only the envelope.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("zs_gateway=info".parse()?)
                .add_directive("zs_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.storage_root.as_deref())?;

    if let Commands::Audit { command } = &cli.command {
        commands::audit::execute(command, &config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let request = cli.command.to_request()?;
    tracing::debug!(root = %config.storage_root.display(), "storage config resolved");
    let service = StorageService::new(config)?;
    let caller = Caller::new(cli.user.as_str(), cli.conversation.as_str());
    let envelope = service.handle(&caller, &request);
    println!("{}", envelope.to_json());

    Ok(if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
