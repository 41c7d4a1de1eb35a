//! Load-order preference storage port

use crate::domain::{GameId, LoadOrderPreference, ModId};

#[async_trait::async_trait]
pub trait IPreferenceRepository: Send + Sync {
    /// Stores `winner → loser`. An existing identical edge is left untouched
    /// and the reverse edge, if present, is removed in the same transaction.
    /// Returns `true` when a new edge was written.
    async fn add_preference(
        &self,
        game: &GameId,
        winner: ModId,
        loser: ModId,
    ) -> anyhow::Result<bool>;

    /// Returns `true` when an edge was deleted
    async fn remove_preference(
        &self,
        game: &GameId,
        winner: ModId,
        loser: ModId,
    ) -> anyhow::Result<bool>;

    /// All edges for a game, oldest first
    async fn list_preferences(&self, game: &GameId) -> anyhow::Result<Vec<LoadOrderPreference>>;
}
