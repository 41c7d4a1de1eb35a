//! Detector capability and the per-run scan context
//!
//! Every detector sees the same immutable [`ScanContext`] and shares no
//! mutable state with its siblings, so the engine is free to run them
//! concurrently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use modwarden_core::config::GameConfig;
use modwarden_core::domain::{
    ArchiveIndexRecord, ConflictEvidence, ConflictKind, EffectiveOrder, GameId, InstalledMod,
    ModId, RelativePath,
};
use tracing::debug;

use crate::error::ConflictError;

/// One conflict detection strategy
#[async_trait::async_trait]
pub trait ConflictDetector: Send + Sync {
    /// The evidence kind this detector produces
    fn kind(&self) -> ConflictKind;

    /// Derives evidence from the snapshot
    ///
    /// Must not touch persisted evidence; the engine owns that.
    async fn detect(&self, ctx: Arc<ScanContext>) -> Result<Vec<ConflictEvidence>, ConflictError>;
}

/// Immutable snapshot of one game's state, built once per engine run
#[derive(Debug)]
pub struct ScanContext {
    pub game: GameConfig,
    pub mods: Vec<InstalledMod>,
    pub index_records: Vec<ArchiveIndexRecord>,
    pub order: EffectiveOrder,
    pub started_at: DateTime<Utc>,
    by_id: HashMap<ModId, usize>,
}

impl ScanContext {
    pub fn new(
        game: GameConfig,
        mods: Vec<InstalledMod>,
        index_records: Vec<ArchiveIndexRecord>,
        order: EffectiveOrder,
    ) -> Self {
        let by_id = mods.iter().enumerate().map(|(i, m)| (m.id(), i)).collect();
        Self {
            game,
            mods,
            index_records,
            order,
            started_at: Utc::now(),
            by_id,
        }
    }

    pub fn game_id(&self) -> &GameId {
        &self.game.id
    }

    pub fn installed_mod(&self, id: ModId) -> Option<&InstalledMod> {
        self.by_id.get(&id).map(|&i| &self.mods[i])
    }

    /// Mods missing from the registry count as disabled
    pub fn is_enabled(&self, id: ModId) -> bool {
        self.installed_mod(id).is_some_and(InstalledMod::is_enabled)
    }

    pub fn enabled_mods(&self) -> impl Iterator<Item = &InstalledMod> {
        self.mods.iter().filter(|m| m.is_enabled())
    }

    /// Orders participants by effective load order
    pub fn sort_participants(&self, ids: &mut [ModId]) {
        ids.sort_by_key(|id| self.order.sort_key(*id));
    }

    /// Resolves the winner among the enabled participants only.
    /// Disabled mods can be named as participants but never win.
    pub fn winner_among(&self, participants: &[ModId]) -> Option<ModId> {
        let candidates: Vec<ModId> = participants
            .iter()
            .copied()
            .filter(|id| self.is_enabled(*id))
            .collect();
        self.order.winner_among(&candidates)
    }

    /// Absolute path of a mod file, provided it stays inside the install root
    /// once symlinks are resolved
    pub fn resolve_file(&self, rel: &RelativePath) -> Option<PathBuf> {
        let root = self.game.install_path.canonicalize().ok()?;
        let path = root.join(rel.as_str()).canonicalize().ok()?;
        if path.starts_with(&root) {
            Some(path)
        } else {
            debug!(path = %rel, "File resolves outside the install root, ignoring");
            None
        }
    }

    /// Reads a mod file as text, replacing invalid UTF-8
    pub fn read_text(&self, rel: &RelativePath) -> Option<String> {
        let path = self.resolve_file(rel)?;
        match std::fs::read(&path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Unreadable mod file");
                None
            }
        }
    }

    /// Enabled mods' files under any of `roots` that carry one of `extensions`
    pub fn files_under<'a>(
        &'a self,
        roots: &'a [String],
        extensions: &'a [&'a str],
    ) -> impl Iterator<Item = (ModId, &'a RelativePath)> + 'a {
        self.enabled_mods().flat_map(move |m| {
            m.files()
                .iter()
                .filter(move |f| {
                    roots.iter().any(|r| f.is_under(r))
                        && extensions.iter().any(|ext| f.has_extension(ext))
                })
                .map(move |f| (m.id(), f))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(mods: Vec<InstalledMod>, sequence: Vec<ModId>) -> ScanContext {
        let game = GameConfig::new(GameId::new("g").unwrap(), PathBuf::from("/nonexistent"));
        ScanContext::new(game, mods, Vec::new(), EffectiveOrder::new(sequence, &[]))
    }

    #[test]
    fn test_winner_skips_disabled_mods() {
        let a = InstalledMod::new(ModId::new(1), "A");
        let b = InstalledMod::new(ModId::new(2), "B").with_disabled(true);
        let c = ctx(vec![a, b], vec![ModId::new(1), ModId::new(2)]);

        assert_eq!(
            c.winner_among(&[ModId::new(1), ModId::new(2)]),
            Some(ModId::new(1))
        );
        assert!(!c.is_enabled(ModId::new(2)));
        assert!(!c.is_enabled(ModId::new(99)));
    }

    #[test]
    fn test_no_enabled_participant_means_no_winner() {
        let b = InstalledMod::new(ModId::new(2), "B").with_disabled(true);
        let c = ctx(vec![b], vec![]);
        assert_eq!(c.winner_among(&[ModId::new(2), ModId::new(3)]), None);
    }

    #[test]
    fn test_sort_participants_follows_load_order() {
        let c = ctx(vec![], vec![ModId::new(5), ModId::new(1)]);
        let mut ids = vec![ModId::new(1), ModId::new(9), ModId::new(5)];
        c.sort_participants(&mut ids);
        assert_eq!(ids, vec![ModId::new(9), ModId::new(5), ModId::new(1)]);
    }

    #[test]
    fn test_files_under_filters_root_and_extension() {
        let a = InstalledMod::new(ModId::new(1), "A").with_files(vec![
            RelativePath::new("r6/scripts/a.reds").unwrap(),
            RelativePath::new("r6/scripts/readme.md").unwrap(),
            RelativePath::new("r6/tweaks/a.yaml").unwrap(),
        ]);
        let b = InstalledMod::new(ModId::new(2), "B")
            .with_disabled(true)
            .with_files(vec![RelativePath::new("r6/scripts/b.reds").unwrap()]);
        let c = ctx(vec![a, b], vec![]);

        let roots = vec!["r6/scripts".to_string()];
        let found: Vec<_> = c.files_under(&roots, &["reds"]).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.as_str(), "r6/scripts/a.reds");
    }

    #[test]
    fn test_read_text_rejects_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "x").unwrap();
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("inside.txt"), "hello").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), root.path().join("link.txt"))
            .unwrap();

        let game = GameConfig::new(GameId::new("g").unwrap(), root.path().to_path_buf());
        let c = ScanContext::new(game, vec![], vec![], EffectiveOrder::default());

        assert_eq!(
            c.read_text(&RelativePath::new("inside.txt").unwrap()).as_deref(),
            Some("hello")
        );
        assert!(c.read_text(&RelativePath::new("missing.txt").unwrap()).is_none());
        #[cfg(unix)]
        assert!(c.read_text(&RelativePath::new("link.txt").unwrap()).is_none());
    }
}
