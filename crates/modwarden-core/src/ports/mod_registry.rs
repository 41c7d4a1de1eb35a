//! Installed-mod registry port (driven/secondary port)
//!
//! The registry and its CRUD surface belong to the hosting application.
//! This core only reads it, and it reads mods together with their file
//! lists in one call so detectors see a consistent snapshot.

use crate::domain::{GameId, InstalledMod, ModId};

/// Read-only access to installed mods
#[async_trait::async_trait]
pub trait IModRegistry: Send + Sync {
    /// All installed mods for a game, enabled and disabled, with their files.
    /// Ordered by installation time, then id.
    async fn list_installed_mods(&self, game: &GameId) -> anyhow::Result<Vec<InstalledMod>>;

    /// One installed mod, or `None` if the id is unknown for this game
    async fn get_installed_mod(
        &self,
        game: &GameId,
        id: ModId,
    ) -> anyhow::Result<Option<InstalledMod>>;
}
