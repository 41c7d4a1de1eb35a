//! Archive index storage port
//!
//! The indexer is the only writer of these rows. Both write paths must be
//! applied as a single transaction so readers never observe a half-built
//! index.

use std::collections::HashSet;

use crate::domain::{ArchiveIndexRecord, GameId, IndexStats, ModId, RelativePath};

#[async_trait::async_trait]
pub trait IArchiveIndexRepository: Send + Sync {
    /// Relative paths of every archive already present in the index
    async fn indexed_archive_paths(&self, game: &GameId) -> anyhow::Result<HashSet<RelativePath>>;

    /// Inserts records, ignoring ones whose (archive, hash) pair already
    /// exists. Returns the number of rows actually inserted.
    async fn insert_records(&self, records: &[ArchiveIndexRecord]) -> anyhow::Result<u64>;

    /// Deletes every record for the game and inserts `records` in the same
    /// transaction. Returns the number of rows inserted.
    async fn replace_records(
        &self,
        game: &GameId,
        records: &[ArchiveIndexRecord],
    ) -> anyhow::Result<u64>;

    /// All records for a game, ordered by hash then archive path
    async fn records_for_game(&self, game: &GameId) -> anyhow::Result<Vec<ArchiveIndexRecord>>;

    /// Removes records attributed to one mod; returns rows deleted
    async fn delete_for_mod(&self, game: &GameId, mod_id: ModId) -> anyhow::Result<u64>;

    async fn stats(&self, game: &GameId) -> anyhow::Result<IndexStats>;
}
