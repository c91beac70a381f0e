// capability.rs — Zone capability levels.
//
// A zone's capability level decides which half of the command whitelist
// applies and whether git write subcommands are permitted. The level is a
// property of the zone, never of the caller.

use serde::{Deserialize, Serialize};

/// What a zone permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityLevel {
    /// Files can be read, listed and deleted, never created or modified.
    ReadDelete,
    /// Full read/write access.
    ReadWrite,
    /// Full read/write access; every mutation becomes a commit.
    VersionedReadWrite,
}

impl CapabilityLevel {
    /// Whether read-write commands and git write subcommands are allowed.
    pub fn can_write(&self) -> bool {
        !matches!(self, CapabilityLevel::ReadDelete)
    }

    pub fn is_versioned(&self) -> bool {
        matches!(self, CapabilityLevel::VersionedReadWrite)
    }
}
