//! # zs-workspace
//!
//! The on-disk side of zoned user storage: where each zone lives, how caller
//! paths are resolved inside it, how bytes are accounted, and how files are
//! edited safely under a lock.
//!
//! ## Key components
//!
//! - [`PathResolver`]: turns a caller path into a [`ResolvedPath`] or refuses.
//! - [`ZoneLayout`] / [`ZoneStore`]: per-user, per-conversation directories
//!   and the plain read/list/write/delete/rename operations.
//! - [`QuotaTracker`]: per-user quota and per-file ceiling, derived from disk.
//! - [`LockManager`]: JSON lock records with age-based expiry and a
//!   [`Clock`] seam.
//! - [`EditZone`]: the open → write → save/cancel protocol on working copies.
//!
//! ## Key invariants
//!
//! - A [`ResolvedPath`] always lies under its zone root, physically as well as
//!   lexically.
//! - Nothing is persisted before the quota and size checks pass, and every
//!   replacement goes through a temp file and a rename.
//! - At most one live lock covers any path in a zone.

pub mod editzone;
pub mod error;
pub mod fsops;
pub mod lock;
pub mod quota;
pub mod resolve;
pub mod zone;

pub use editzone::{EditOpened, EditSaved, EditZone, ForceUnlocked, MaintenanceReport};
pub use error::WorkspaceError;
pub use lock::{Acquired, Clock, LockManager, LockRecord, LockState, ManualClock, SystemClock};
pub use quota::{tree_usage, QuotaTracker, TreeUsage};
pub use resolve::{normalize_relative, PathResolver, ResolvedPath};
pub use zone::{
    validate_identifier, CopyOutcome, EntryInfo, EntryKind, RenameOutcome, WriteOutcome, Zone,
    ZoneLayout, ZoneStore, GIT_DIR,
};
