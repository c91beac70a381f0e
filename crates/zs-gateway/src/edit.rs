// edit.rs — The safe-edit protocol as caller-facing operations.
//
// open → (exec | write)* → save | cancel, per conversation. The session id is
// the caller's conversation id. Saving in Documents adds one commit.

use serde::Serialize;
use zs_versioned::messages;
use zs_workspace::{EditZone, Zone};

use crate::envelope::Envelope;
use crate::error::GatewayError;
use crate::files::CommitInfo;
use crate::service::{Caller, OpContext, Reply, StorageService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opened {
    pub path: String,
    pub existed: bool,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reclaimed_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Saved {
    pub path: String,
    pub replaced: bool,
    #[serde(flatten)]
    pub commit: Option<CommitInfo>,
}

impl StorageService {
    fn edit_session(&self, caller: &Caller, zone: Zone) -> Result<EditZone, GatewayError> {
        let store = self.store(caller, zone)?;
        let store = if zone == Zone::Documents {
            self.versioned_from(store)?.store().clone()
        } else {
            store
        };
        self.editzone(store)
    }

    /// Lock `path` and copy it into this conversation's working area.
    pub fn edit_open(&self, caller: &Caller, zone: Zone, path: &str) -> Envelope {
        let ctx = OpContext::in_zone(zone, "edit_open").with_target(path);
        let result = self
            .edit_session(caller, zone)
            .and_then(|session| session.open(path).map_err(GatewayError::from))
            .map(|opened| {
                let text = format!("Opened for editing: {}", opened.path);
                let data = Opened {
                    path: opened.path,
                    existed: opened.existed,
                    is_dir: opened.is_dir,
                    reclaimed_from: opened.reclaimed_from,
                };
                Reply::new(data, text)
            });
        self.finish(caller, ctx, result)
    }

    /// Write into the working copy of an open session.
    pub fn edit_write(
        &self,
        caller: &Caller,
        zone: Zone,
        path: &str,
        content: &str,
        append: bool,
    ) -> Envelope {
        let ctx = OpContext::in_zone(zone, "edit_write").with_target(path);
        let result = self
            .edit_session(caller, zone)
            .and_then(|session| {
                session
                    .write(path, content.as_bytes(), append)
                    .map_err(GatewayError::from)
            })
            .map(|outcome| {
                let text = format!("Written to working copy: {}", outcome.path);
                Reply::new(outcome, text).with_content(content.as_bytes())
            });
        self.finish(caller, ctx, result)
    }

    /// Replace the original with the working copy and end the session.
    pub fn edit_save(
        &self,
        caller: &Caller,
        zone: Zone,
        path: &str,
        message: Option<&str>,
    ) -> Envelope {
        let ctx = OpContext::in_zone(zone, "edit_save").with_target(path);
        let result = self.try_edit_save(caller, zone, path, message).map(|saved| {
            let commit = saved.commit.as_ref().map(|c| c.commit.clone());
            let text = format!("Saved: {}", saved.path);
            Reply::new(saved, text).with_commit(commit)
        });
        self.finish(caller, ctx, result)
    }

    fn try_edit_save(
        &self,
        caller: &Caller,
        zone: Zone,
        path: &str,
        message: Option<&str>,
    ) -> Result<Saved, GatewayError> {
        if zone != Zone::Documents {
            let saved = self.edit_session(caller, zone)?.save(path)?;
            return Ok(Saved {
                path: saved.path,
                replaced: saved.replaced,
                commit: None,
            });
        }

        let versioned = self.versioned(caller)?;
        let saved = self.editzone(versioned.store().clone())?.save(path)?;
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| messages::edited(&saved.path));
        let commit = versioned.commit_paths(&[&saved.path], &message)?;
        Ok(Saved {
            path: saved.path,
            replaced: saved.replaced,
            commit: Some(CommitInfo { commit, message }),
        })
    }

    /// Discard the working copy and release the lock.
    pub fn edit_cancel(&self, caller: &Caller, zone: Zone, path: &str) -> Envelope {
        let ctx = OpContext::in_zone(zone, "edit_cancel").with_target(path);
        let result = self
            .edit_session(caller, zone)
            .and_then(|session| session.cancel(path).map_err(GatewayError::from))
            .map(|path| {
                let text = format!("Edit cancelled: {}", path);
                Reply::new(serde_json::json!({ "path": path }), text)
            });
        self.finish(caller, ctx, result)
    }
}
