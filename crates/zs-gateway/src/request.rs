// request.rs — Serializable operation requests and dispatch.
//
// A Request names one operation and carries its payload. Hosts that speak
// JSON deserialize one of these and hand it to `StorageService::handle()`.

use serde::{Deserialize, Serialize};
use zs_workspace::Zone;

use crate::admin::ImportRequest;
use crate::envelope::Envelope;
use crate::exec::ExecParams;
use crate::service::{Caller, StorageService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Exec {
        zone: Zone,
        #[serde(flatten)]
        params: ExecParams,
    },
    Write {
        zone: Zone,
        path: String,
        content: String,
        #[serde(default)]
        append: bool,
        #[serde(default)]
        message: Option<String>,
    },
    Delete {
        zone: Zone,
        path: String,
        #[serde(default)]
        message: Option<String>,
    },
    Rename {
        zone: Zone,
        #[serde(alias = "old_path")]
        from: String,
        #[serde(alias = "new_path")]
        to: String,
        #[serde(default)]
        message: Option<String>,
    },
    EditOpen {
        zone: Zone,
        path: String,
    },
    EditExec {
        zone: Zone,
        #[serde(flatten)]
        params: ExecParams,
    },
    EditWrite {
        zone: Zone,
        path: String,
        content: String,
        #[serde(default)]
        append: bool,
    },
    EditSave {
        zone: Zone,
        path: String,
        #[serde(default)]
        message: Option<String>,
    },
    EditCancel {
        zone: Zone,
        path: String,
    },
    Bridge {
        from: Zone,
        to: Zone,
        src: String,
        dest: String,
        #[serde(default)]
        message: Option<String>,
    },
    Import(ImportRequest),
    Help,
    Stats,
    AllowedCommands,
    ForceUnlock {
        zone: Zone,
        path: String,
    },
    Maintenance,
}

impl Request {
    /// Operation name as recorded in the audit log, e.g. `documents_write`.
    pub fn operation(&self) -> String {
        let in_zone = |zone: &Zone, action: &str| format!("{}_{}", zone.as_str(), action);
        match self {
            Request::Exec { zone, .. } => in_zone(zone, "exec"),
            Request::Write { zone, .. } => in_zone(zone, "write"),
            Request::Delete { zone, .. } => in_zone(zone, "delete"),
            Request::Rename { zone, .. } => in_zone(zone, "rename"),
            Request::EditOpen { zone, .. } => in_zone(zone, "edit_open"),
            Request::EditExec { zone, .. } => in_zone(zone, "edit_exec"),
            Request::EditWrite { zone, .. } => in_zone(zone, "edit_write"),
            Request::EditSave { zone, .. } => in_zone(zone, "edit_save"),
            Request::EditCancel { zone, .. } => in_zone(zone, "edit_cancel"),
            Request::ForceUnlock { zone, .. } => in_zone(zone, "force_unlock"),
            Request::Bridge { from, to, .. } => format!("{}_to_{}", from.as_str(), to.as_str()),
            Request::Import(_) => "import".to_string(),
            Request::Help => "help".to_string(),
            Request::Stats => "stats".to_string(),
            Request::AllowedCommands => "allowed_commands".to_string(),
            Request::Maintenance => "maintenance".to_string(),
        }
    }
}

impl StorageService {
    /// Run one request for `caller`.
    pub fn handle(&self, caller: &Caller, request: &Request) -> Envelope {
        tracing::debug!(
            user = %caller.user_id,
            conversation = %caller.conversation_id,
            operation = %request.operation(),
            "handling request"
        );
        match request {
            Request::Exec { zone, params } => self.exec(caller, *zone, params),
            Request::Write {
                zone,
                path,
                content,
                append,
                message,
            } => self.write(caller, *zone, path, content, *append, message.as_deref()),
            Request::Delete {
                zone,
                path,
                message,
            } => self.delete(caller, *zone, path, message.as_deref()),
            Request::Rename {
                zone,
                from,
                to,
                message,
            } => self.rename(caller, *zone, from, to, message.as_deref()),
            Request::EditOpen { zone, path } => self.edit_open(caller, *zone, path),
            Request::EditExec { zone, params } => self.edit_exec(caller, *zone, params),
            Request::EditWrite {
                zone,
                path,
                content,
                append,
            } => self.edit_write(caller, *zone, path, content, *append),
            Request::EditSave {
                zone,
                path,
                message,
            } => self.edit_save(caller, *zone, path, message.as_deref()),
            Request::EditCancel { zone, path } => self.edit_cancel(caller, *zone, path),
            Request::Bridge {
                from,
                to,
                src,
                dest,
                message,
            } => self.bridge(caller, *from, *to, src, dest, message.as_deref()),
            Request::Import(import) => self.import(caller, import),
            Request::Help => self.help(caller),
            Request::Stats => self.stats(caller),
            Request::AllowedCommands => self.allowed_commands(caller),
            Request::ForceUnlock { zone, path } => self.force_unlock(caller, *zone, path),
            Request::Maintenance => self.maintenance(caller),
        }
    }
}
