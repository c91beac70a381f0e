// files.rs — Direct file operations: write, delete, rename.
//
// Storage and Uploads go straight to the zone store; Documents goes through
// the versioned store so every successful call is exactly one commit.
// Uploads accepts delete only; write and rename are refused by the store.

use serde::Serialize;
use zs_workspace::{RenameOutcome, WriteOutcome, Zone};

use crate::envelope::Envelope;
use crate::error::GatewayError;
use crate::service::{Caller, OpContext, Reply, StorageService};

/// Commit recorded for a Documents mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub commit: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Written {
    #[serde(flatten)]
    pub outcome: WriteOutcome,
    #[serde(flatten)]
    pub commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub path: String,
    #[serde(flatten)]
    pub commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Renamed {
    #[serde(flatten)]
    pub outcome: RenameOutcome,
    #[serde(flatten)]
    pub commit: Option<CommitInfo>,
}

fn commit_id(info: &Option<CommitInfo>) -> Option<String> {
    info.as_ref().map(|c| c.commit.clone())
}

impl StorageService {
    /// Write (or append) text to a file. `message` is the commit message in
    /// Documents and ignored elsewhere.
    pub fn write(
        &self,
        caller: &Caller,
        zone: Zone,
        path: &str,
        content: &str,
        append: bool,
        message: Option<&str>,
    ) -> Envelope {
        let ctx = OpContext::in_zone(zone, "write").with_target(path);
        let result = self
            .try_write(caller, zone, path, content, append, message)
            .map(|written| {
                let commit = commit_id(&written.commit);
                let text = format!("Written: {}", written.outcome.path);
                Reply::new(written, text)
                    .with_commit(commit)
                    .with_content(content.as_bytes())
            });
        self.finish(caller, ctx, result)
    }

    fn try_write(
        &self,
        caller: &Caller,
        zone: Zone,
        path: &str,
        content: &str,
        append: bool,
        message: Option<&str>,
    ) -> Result<Written, GatewayError> {
        if zone == Zone::Documents {
            let committed = self
                .versioned(caller)?
                .write(path, content.as_bytes(), append, message)?;
            return Ok(Written {
                outcome: committed.outcome,
                commit: Some(CommitInfo {
                    commit: committed.commit,
                    message: committed.message,
                }),
            });
        }
        let outcome = self.store(caller, zone)?.write(path, content.as_bytes(), append)?;
        Ok(Written {
            outcome,
            commit: None,
        })
    }

    /// Delete a file or directory tree. Allowed in every zone.
    pub fn delete(&self, caller: &Caller, zone: Zone, path: &str, message: Option<&str>) -> Envelope {
        let ctx = OpContext::in_zone(zone, "delete").with_target(path);
        let result = self.try_delete(caller, zone, path, message).map(|deleted| {
            let commit = commit_id(&deleted.commit);
            let text = format!("Deleted: {}", deleted.path);
            Reply::new(deleted, text).with_commit(commit)
        });
        self.finish(caller, ctx, result)
    }

    fn try_delete(
        &self,
        caller: &Caller,
        zone: Zone,
        path: &str,
        message: Option<&str>,
    ) -> Result<Deleted, GatewayError> {
        if zone == Zone::Documents {
            let committed = self.versioned(caller)?.delete(path, message)?;
            return Ok(Deleted {
                path: committed.outcome,
                commit: Some(CommitInfo {
                    commit: committed.commit,
                    message: committed.message,
                }),
            });
        }
        let path = self.store(caller, zone)?.delete(path)?;
        Ok(Deleted { path, commit: None })
    }

    /// Move or rename within one zone.
    pub fn rename(
        &self,
        caller: &Caller,
        zone: Zone,
        from: &str,
        to: &str,
        message: Option<&str>,
    ) -> Envelope {
        let ctx = OpContext::in_zone(zone, "rename").with_target(format!("{} -> {}", from, to));
        let result = self.try_rename(caller, zone, from, to, message).map(|renamed| {
            let commit = commit_id(&renamed.commit);
            let text = format!("Renamed: {} -> {}", renamed.outcome.from, renamed.outcome.to);
            Reply::new(renamed, text).with_commit(commit)
        });
        self.finish(caller, ctx, result)
    }

    fn try_rename(
        &self,
        caller: &Caller,
        zone: Zone,
        from: &str,
        to: &str,
        message: Option<&str>,
    ) -> Result<Renamed, GatewayError> {
        if zone == Zone::Documents {
            let committed = self.versioned(caller)?.rename(from, to, message)?;
            return Ok(Renamed {
                outcome: committed.outcome,
                commit: Some(CommitInfo {
                    commit: committed.commit,
                    message: committed.message,
                }),
            });
        }
        let outcome = self.store(caller, zone)?.rename(from, to)?;
        Ok(Renamed {
            outcome,
            commit: None,
        })
    }
}
