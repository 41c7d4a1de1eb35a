//! Per-game scan serialization
//!
//! Index rebuilds and evidence rebuilds for the same game must not overlap.
//! `GameScanLocks` hands out one async mutex per game; the owning service
//! object shares it between the indexer and the engine, so two different
//! games still scan concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::domain::GameId;

/// Registry of per-game locks
#[derive(Debug, Clone, Default)]
pub struct GameScanLocks {
    locks: Arc<Mutex<HashMap<GameId, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Held for the duration of one scan
#[derive(Debug)]
pub struct ScanGuard {
    _guard: OwnedMutexGuard<()>,
}

impl GameScanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, game: &GameId) -> Arc<tokio::sync::Mutex<()>> {
        // A poisoned map only means another thread panicked while inserting;
        // the map itself is still usable.
        let mut map = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(map.entry(game.clone()).or_default())
    }

    /// Waits until no other scan of `game` is running
    pub async fn acquire(&self, game: &GameId) -> ScanGuard {
        let lock = self.lock_for(game);
        if lock.try_lock().is_err() {
            debug!(game = %game, "Waiting for running scan to finish");
        }
        ScanGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Returns `None` when a scan of `game` is already running
    pub fn try_acquire(&self, game: &GameId) -> Option<ScanGuard> {
        self.lock_for(game)
            .try_lock_owned()
            .ok()
            .map(|guard| ScanGuard { _guard: guard })
    }
}
