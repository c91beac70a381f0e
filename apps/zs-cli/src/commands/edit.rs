// edit.rs — Safe-edit subcommands. Each maps to one edit_* request.

use clap::Subcommand;
use zs_gateway::{Request, Zone};

use super::files::{content_or_stdin, ExecArgs};

#[derive(Subcommand, Debug)]
pub enum EditCommands {
    /// Lock a file and create this conversation's working copy.
    Open { zone: Zone, path: String },
    /// Run a command inside the working-copy directory.
    Exec(ExecArgs),
    /// Write to the working copy (stdin when no content is given).
    Write {
        zone: Zone,
        path: String,
        content: Option<String>,
        #[arg(long)]
        append: bool,
    },
    /// Replace the original with the working copy and release the lock.
    Save {
        zone: Zone,
        path: String,
        /// Commit message (Documents only).
        #[arg(long, short)]
        message: Option<String>,
    },
    /// Discard the working copy and release the lock.
    Cancel { zone: Zone, path: String },
}

impl EditCommands {
    pub fn to_request(&self) -> anyhow::Result<Request> {
        let request = match self {
            EditCommands::Open { zone, path } => Request::EditOpen {
                zone: *zone,
                path: path.clone(),
            },
            EditCommands::Exec(exec) => Request::EditExec {
                zone: exec.zone,
                params: exec.params(),
            },
            EditCommands::Write {
                zone,
                path,
                content,
                append,
            } => Request::EditWrite {
                zone: *zone,
                path: path.clone(),
                content: content_or_stdin(content.as_deref())?,
                append: *append,
            },
            EditCommands::Save {
                zone,
                path,
                message,
            } => Request::EditSave {
                zone: *zone,
                path: path.clone(),
                message: message.clone(),
            },
            EditCommands::Cancel { zone, path } => Request::EditCancel {
                zone: *zone,
                path: path.clone(),
            },
        };
        Ok(request)
    }
}
