// audit.rs — Audit subcommands: verify, tail.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use zs_audit::{AuditError, AuditLog};
use zs_gateway::StorageConfig;

#[derive(Subcommand, Debug)]
pub enum AuditCommands {
    /// Verify the audit log hash chain.
    Verify {
        /// Path to the audit log (defaults to the configured one).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show recent audit events.
    Tail {
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of events to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &AuditCommands, config: &StorageConfig) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => match locate(log.as_ref(), config) {
            Some(path) => verify(&path),
            None => Ok(()),
        },
        AuditCommands::Tail { log, n } => match locate(log.as_ref(), config) {
            Some(path) => tail(&path, *n),
            None => Ok(()),
        },
    }
}

/// The log to read, or None (after saying why) when there is nothing to read.
fn locate(log: Option<&PathBuf>, config: &StorageConfig) -> Option<PathBuf> {
    let Some(path) = log.cloned().or_else(|| config.audit_log_path()) else {
        println!("Audit logging is disabled in this configuration.");
        return None;
    };
    if !path.exists() {
        println!("No audit log found at {}", path.display());
        return None;
    }
    Some(path)
}

fn verify(path: &Path) -> anyhow::Result<()> {
    match AuditLog::verify_chain(path) {
        Ok(count) => {
            println!("Audit log verified: {} event(s), hash chain intact.", count);
            Ok(())
        }
        Err(AuditError::IntegrityViolation {
            line,
            expected,
            actual,
        }) => {
            println!("INTEGRITY VIOLATION at line {}:", line);
            println!("  Expected previous_hash: {}", expected);
            println!("  Actual previous_hash:   {}", actual);
            anyhow::bail!("audit log integrity check failed")
        }
        Err(e) => Err(e.into()),
    }
}

fn tail(path: &Path, n: usize) -> anyhow::Result<()> {
    let recent = AuditLog::tail(path, n)?;
    if recent.is_empty() {
        println!("No audit events.");
        return Ok(());
    }
    println!(
        "{:<20} {:<12} {:<14} {:<22} {:<18} TARGET",
        "TIMESTAMP", "USER", "CONVERSATION", "OPERATION", "OUTCOME"
    );
    println!("{}", "-".repeat(100));
    for event in recent {
        let outcome = match &event.error_code {
            Some(code) => code.to_string(),
            None => format!("{:?}", event.outcome).to_lowercase(),
        };
        println!(
            "{:<20} {:<12} {:<14} {:<22} {:<18} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.user_id,
            event.conversation_id,
            event.operation,
            outcome,
            event.target.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
