//! Load-order and preference resolver
//!
//! Computes the effective order of a game's enabled mods, manages explicit
//! winner → loser preferences and emits the `modlist.txt` artifact.
//!
//! ## Ordering
//!
//! 1. Group the archives found directly in the modlist directory by owning
//!    mod (unmanaged archives stand alone).
//! 2. Order groups by an existing `modlist.txt` when one is present,
//!    otherwise by each group's lowest filename.
//! 3. Apply preference edges oldest first, moving a winner to just after
//!    its loser. No cycle detection: the most recent edge prevails.
//! 4. Enabled mods without archives follow in registry order.
//!
//! The last mod in the resulting order wins a conflict unless an explicit
//! edge between the pair says otherwise.

use std::sync::Arc;

use modwarden_core::config::GameConfig;
use modwarden_core::domain::{EffectiveOrder, GameId, InstalledMod, LoadOrderPreference, ModId};
use modwarden_core::ports::{IModRegistry, IPreferenceRepository};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::ConflictError;
use crate::modlist::{self, OrderGroup};

/// Groups, their archive lines and the resulting mod order
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedOrder {
    pub groups: Vec<OrderGroup>,
    pub sequence: Vec<ModId>,
    #[serde(skip)]
    pub order: EffectiveOrder,
}

impl ResolvedOrder {
    pub fn lines(&self) -> Vec<String> {
        modlist::render(&self.groups)
    }
}

/// Result of writing the artifact
#[derive(Debug, Clone, Serialize)]
pub struct ModlistWrite {
    pub path: std::path::PathBuf,
    pub entries: usize,
}

pub struct LoadOrderResolver {
    registry: Arc<dyn IModRegistry>,
    preferences: Arc<dyn IPreferenceRepository>,
}

impl LoadOrderResolver {
    pub fn new(
        registry: Arc<dyn IModRegistry>,
        preferences: Arc<dyn IPreferenceRepository>,
    ) -> Self {
        Self {
            registry,
            preferences,
        }
    }

    /// Resolves the order for an already loaded mod snapshot
    pub async fn resolve(
        &self,
        game: &GameConfig,
        mods: &[InstalledMod],
    ) -> Result<ResolvedOrder, ConflictError> {
        let preferences = self.preferences.list_preferences(&game.id).await?;

        let dir = game.install_path.join(&game.modlist_dir);
        let on_disk = modlist::scan_archive_names(&dir, &game.archive_extension)?;
        let existing = modlist::read_modlist(&game.modlist_path())?;
        let owners = modlist::archive_owners(game, mods);
        let disabled_archives: Vec<String> = mods
            .iter()
            .filter(|m| m.is_disabled())
            .flat_map(|m| m.files_with_extension(&game.archive_extension))
            .map(|f| f.file_name().to_lowercase())
            .filter(|name| !owners.contains_key(name))
            .collect();

        let groups = modlist::build_groups(&on_disk, &owners, &disabled_archives, existing.as_deref());
        let groups = modlist::apply_preferences(groups, &preferences);

        let mut sequence: Vec<ModId> = groups.iter().filter_map(|g| g.owner).collect();
        for m in mods.iter().filter(|m| m.is_enabled()) {
            if !sequence.contains(&m.id()) {
                sequence.push(m.id());
            }
        }
        debug!(
            game = %game.id,
            groups = groups.len(),
            mods = sequence.len(),
            preferences = preferences.len(),
            from_artifact = existing.is_some(),
            "Resolved load order"
        );

        Ok(ResolvedOrder {
            order: EffectiveOrder::new(sequence.clone(), &preferences),
            groups,
            sequence,
        })
    }

    /// Effective order for the game's current registry state
    pub async fn effective_order(&self, game: &GameConfig) -> Result<EffectiveOrder, ConflictError> {
        let mods = self.registry.list_installed_mods(&game.id).await?;
        Ok(self.resolve(game, &mods).await?.order)
    }

    async fn require_enabled(&self, game: &GameId, id: ModId) -> Result<InstalledMod, ConflictError> {
        let m = self
            .registry
            .get_installed_mod(game, id)
            .await?
            .ok_or_else(|| ConflictError::NotFound(format!("mod {id} in game {game}")))?;
        if m.is_disabled() {
            return Err(ConflictError::Validation(format!(
                "mod {id} ({}) is disabled",
                m.name()
            )));
        }
        Ok(m)
    }

    /// Records `winner` beating each of `losers`, then regenerates the
    /// artifact. Existing edges are no-ops; a reverse edge is replaced.
    /// Validation happens for every loser before anything is written.
    #[instrument(skip(self, game), fields(game = %game.id))]
    pub async fn add_preferences(
        &self,
        game: &GameConfig,
        winner: ModId,
        losers: &[ModId],
    ) -> Result<usize, ConflictError> {
        if losers.is_empty() {
            return Err(ConflictError::Validation("no losing mods given".into()));
        }
        if losers.contains(&winner) {
            return Err(ConflictError::Validation(format!(
                "mod {winner} cannot be preferred over itself"
            )));
        }
        self.require_enabled(&game.id, winner).await?;
        for loser in losers {
            self.require_enabled(&game.id, *loser).await?;
        }

        let mut added = 0;
        for loser in losers {
            if self.preferences.add_preference(&game.id, winner, *loser).await? {
                added += 1;
            }
        }
        let written = self.write_modlist(game).await?;
        info!(added, entries = written.entries, "Added load order preferences");
        Ok(added)
    }

    /// Deletes one edge; the artifact is regenerated when something changed
    #[instrument(skip(self, game), fields(game = %game.id))]
    pub async fn remove_preference(
        &self,
        game: &GameConfig,
        winner: ModId,
        loser: ModId,
    ) -> Result<bool, ConflictError> {
        let removed = self
            .preferences
            .remove_preference(&game.id, winner, loser)
            .await?;
        if removed {
            self.write_modlist(game).await?;
        }
        Ok(removed)
    }

    pub async fn list_preferences(
        &self,
        game: &GameId,
    ) -> Result<Vec<LoadOrderPreference>, ConflictError> {
        Ok(self.preferences.list_preferences(game).await?)
    }

    /// Artifact lines without touching disk
    pub async fn generate_modlist(&self, game: &GameConfig) -> Result<Vec<String>, ConflictError> {
        let mods = self.registry.list_installed_mods(&game.id).await?;
        Ok(self.resolve(game, &mods).await?.lines())
    }

    /// Regenerates and writes `modlist.txt`; removes it when empty
    pub async fn write_modlist(&self, game: &GameConfig) -> Result<ModlistWrite, ConflictError> {
        let lines = self.generate_modlist(game).await?;
        let path = game.modlist_path();
        let entries = modlist::write_atomic(&path, &lines)?;
        info!(game = %game.id, path = %path.display(), entries, "Wrote modlist");
        Ok(ModlistWrite { path, entries })
    }
}
