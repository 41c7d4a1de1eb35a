//! Archive index records
//!
//! One record per (archive, resource hash) pair. The same hash appearing in
//! two different archives produces two records; that is what the
//! archive-entry detector looks for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{GameId, ModId, RelativePath, ResourceHash};

/// A persisted resource-hash → archive → owning-mod fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIndexRecord {
    pub game_id: GameId,
    /// `None` for archives no installed mod claims
    pub installed_mod_id: Option<ModId>,
    pub archive_filename: String,
    pub archive_relative_path: RelativePath,
    pub resource_hash: ResourceHash,
    /// Lowercase hex of the 20-byte digest
    pub digest: String,
    pub indexed_at: DateTime<Utc>,
}

impl ArchiveIndexRecord {
    /// Whether this record is attributed to a mod
    pub fn is_owned(&self) -> bool {
        self.installed_mod_id.is_some()
    }
}

/// Aggregate counts over a game's index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_entries: u64,
    pub archives: u64,
    pub unattributed_archives: u64,
}
