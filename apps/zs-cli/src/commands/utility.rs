// utility.rs — Bridge and import arguments.

use std::path::PathBuf;

use clap::Args;
use zs_gateway::{ImportRequest, Request, UploadedFile, Zone};

#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Source zone.
    pub from: Zone,
    /// Destination zone.
    pub to: Zone,
    /// Source path in the source zone.
    pub src: String,
    /// Destination path in the destination zone.
    pub dest: String,
    /// Commit message when Documents is involved.
    #[arg(long, short)]
    pub message: Option<String>,
}

impl BridgeArgs {
    pub fn to_request(&self) -> Request {
        Request::Bridge {
            from: self.from,
            to: self.to,
            src: self.src.clone(),
            dest: self.dest.clone(),
            message: self.message.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Host files attached to the conversation.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Import only names matching this glob.
    #[arg(long)]
    pub filename: Option<String>,
    /// Import every file when no filter is given.
    #[arg(long)]
    pub all: bool,
    /// Subdirectory of Uploads to import into.
    #[arg(long)]
    pub dest: Option<String>,
}

impl ImportArgs {
    pub fn to_request(&self) -> Request {
        Request::Import(ImportRequest {
            files: self.files.iter().map(UploadedFile::new).collect(),
            filename: self.filename.clone(),
            import_all: self.all,
            dest_subdir: self.dest.clone(),
        })
    }
}
