//! Archive entry indexer
//!
//! Builds the resource-hash → archive → owning-mod index for one game.
//!
//! ## Modes
//!
//! - **Incremental** (`force_reindex = false`): archives whose relative path
//!   is already indexed are skipped without re-parsing. Replacing an archive
//!   in place under the same path is therefore not picked up.
//! - **Full** (`force_reindex = true`): every archive is parsed and the
//!   game's rows are swapped out in a single transaction.
//!
//! A parse failure only skips that archive; it is recorded as a failed
//! [`UnitOutcome`] and the run continues.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use modwarden_core::config::GameConfig;
use modwarden_core::domain::{
    ArchiveIndexRecord, GameId, IndexStats, ModId, RelativePath, ResourceHash, UnitOutcome,
    UnitStatus,
};
use modwarden_core::ports::progress::percent_of;
use modwarden_core::ports::{IArchiveIndexRepository, IModRegistry, ProgressSink};
use modwarden_core::scan_lock::GameScanLocks;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::discovery::{discover_archives, DiscoveredArchive};
use crate::format::{parse_toc_with_limit, MAX_HASH_TABLE_BYTES};
use crate::ArchiveError;

/// Progress phase name used by the indexer
pub const PROGRESS_PHASE: &str = "archive-index";

/// Summary of one indexing run
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub game_id: GameId,
    pub force_reindex: bool,
    /// Rows actually written
    pub new_entries: u64,
    pub archives_found: usize,
    pub archives_indexed: usize,
    pub archives_skipped: usize,
    pub archives_failed: usize,
    /// One outcome per discovered archive, in discovery order
    pub outcomes: Vec<UnitOutcome>,
    pub duration_ms: u64,
}

/// Everything the blocking parse pass needs, owned so it can cross threads
struct ParsePass {
    game_id: GameId,
    archives: Vec<DiscoveredArchive>,
    owners: HashMap<String, ModId>,
    already_indexed: HashSet<String>,
    max_table_bytes: u64,
    indexed_at: DateTime<Utc>,
    progress: ProgressSink,
}

struct ParseResult {
    records: Vec<ArchiveIndexRecord>,
    outcomes: Vec<UnitOutcome>,
}

impl ParsePass {
    fn run(self) -> ParseResult {
        let total = self.archives.len();
        let mut records = Vec::new();
        let mut outcomes = Vec::with_capacity(total);

        for (i, archive) in self.archives.iter().enumerate() {
            let name = archive.file_name().to_string();
            let pct = percent_of(i + 1, total);
            let key = archive.relative.lookup_key();

            if self.already_indexed.contains(&key) {
                debug!(archive = %archive.relative, "Already indexed, skipping");
                self.progress
                    .emit(PROGRESS_PHASE, format!("Skipped (cached): {name}"), pct);
                outcomes.push(UnitOutcome::skipped(
                    archive.relative.as_str(),
                    "already indexed",
                ));
                continue;
            }

            match parse_toc_with_limit(&archive.absolute, self.max_table_bytes) {
                Ok(toc) => {
                    let owner = self.owners.get(&key).copied();
                    let mut seen = HashSet::new();
                    let before = records.len();
                    for entry in &toc.hash_entries {
                        // One record per (archive, hash); duplicates inside an
                        // archive keep the first occurrence.
                        if !seen.insert(entry.hash) {
                            continue;
                        }
                        records.push(ArchiveIndexRecord {
                            game_id: self.game_id.clone(),
                            installed_mod_id: owner,
                            archive_filename: name.clone(),
                            archive_relative_path: archive.relative.clone(),
                            resource_hash: ResourceHash::new(entry.hash),
                            digest: entry.digest_hex(),
                            indexed_at: self.indexed_at,
                        });
                    }
                    let produced = records.len() - before;
                    debug!(
                        archive = %archive.relative,
                        entries = produced,
                        owner = ?owner.map(|m| m.as_i64()),
                        "Parsed archive"
                    );
                    self.progress.emit(
                        PROGRESS_PHASE,
                        format!("Indexed: {name} ({produced} entries)"),
                        pct,
                    );
                    outcomes.push(UnitOutcome::succeeded(archive.relative.as_str(), produced));
                }
                Err(e) => {
                    warn!(archive = %archive.absolute.display(), error = %e, "Failed to parse archive");
                    self.progress
                        .emit(PROGRESS_PHASE, format!("Failed: {name}"), pct);
                    outcomes.push(UnitOutcome::failed(archive.relative.as_str(), e.to_string()));
                }
            }
        }

        ParseResult { records, outcomes }
    }
}

/// Indexes archive TOCs into [`IArchiveIndexRepository`]
pub struct ArchiveIndexer {
    index: Arc<dyn IArchiveIndexRepository>,
    registry: Arc<dyn IModRegistry>,
    locks: GameScanLocks,
    max_table_bytes: u64,
}

impl ArchiveIndexer {
    pub fn new(
        index: Arc<dyn IArchiveIndexRepository>,
        registry: Arc<dyn IModRegistry>,
        locks: GameScanLocks,
    ) -> Self {
        Self {
            index,
            registry,
            locks,
            max_table_bytes: MAX_HASH_TABLE_BYTES,
        }
    }

    /// Overrides the per-archive hash table ceiling
    pub fn with_max_hash_table_bytes(mut self, bytes: u64) -> Self {
        self.max_table_bytes = bytes;
        self
    }

    /// Builds the lookup key → owning mod map from the registry
    async fn archive_owners(
        &self,
        game: &GameConfig,
    ) -> Result<HashMap<String, ModId>, ArchiveError> {
        let mods = self.registry.list_installed_mods(&game.id).await?;
        let mut owners = HashMap::new();
        for m in &mods {
            for file in m.files_with_extension(&game.archive_extension) {
                // Later installs claim a shared path
                owners.insert(file.lookup_key(), m.id());
            }
        }
        debug!(game = %game.id, mods = mods.len(), archives = owners.len(), "Loaded archive owners");
        Ok(owners)
    }

    /// Indexes every archive under the game's mod paths
    ///
    /// Returns a report whose `new_entries` is the number of rows written.
    /// Holds the game's scan lock for the whole run.
    pub async fn index(
        &self,
        game: &GameConfig,
        force_reindex: bool,
        progress: &ProgressSink,
    ) -> Result<IndexReport, ArchiveError> {
        let _guard = self.locks.acquire(&game.id).await;
        let started = Instant::now();
        info!(game = %game.id, force_reindex, "Starting archive index");

        let owners = self.archive_owners(game).await?;
        let already_indexed: HashSet<String> = if force_reindex {
            HashSet::new()
        } else {
            self.index
                .indexed_archive_paths(&game.id)
                .await?
                .iter()
                .map(RelativePath::lookup_key)
                .collect()
        };

        let install_root: PathBuf = game.install_path.clone();
        let mod_paths = game.mod_paths.clone();
        let extension = game.archive_extension.clone();
        let game_id = game.id.clone();
        let max_table_bytes = self.max_table_bytes;
        let pass_progress = progress.clone();

        let parsed = tokio::task::spawn_blocking(move || {
            let archives = discover_archives(&install_root, &mod_paths, &extension);
            debug!(game = %game_id, found = archives.len(), "Discovered archives");
            ParsePass {
                game_id,
                archives,
                owners,
                already_indexed,
                max_table_bytes,
                indexed_at: Utc::now(),
                progress: pass_progress,
            }
            .run()
        })
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?;

        let new_entries = if force_reindex {
            self.index.replace_records(&game.id, &parsed.records).await?
        } else {
            self.index.insert_records(&parsed.records).await?
        };

        let archives_found = parsed.outcomes.len();
        let mut archives_indexed = 0;
        let mut archives_skipped = 0;
        let mut archives_failed = 0;
        for outcome in &parsed.outcomes {
            match outcome.status {
                UnitStatus::Succeeded { .. } => archives_indexed += 1,
                UnitStatus::Skipped { .. } => archives_skipped += 1,
                UnitStatus::Failed { .. } => archives_failed += 1,
            }
        }

        progress.emit(
            PROGRESS_PHASE,
            format!("Indexed {new_entries} entries from {archives_found} archives"),
            100,
        );

        let report = IndexReport {
            game_id: game.id.clone(),
            force_reindex,
            new_entries,
            archives_found,
            archives_indexed,
            archives_skipped,
            archives_failed,
            outcomes: parsed.outcomes,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            game = %game.id,
            new_entries,
            archives_found,
            archives_indexed,
            archives_skipped,
            archives_failed,
            duration_ms = report.duration_ms,
            "Archive index complete"
        );

        Ok(report)
    }

    /// Drops the index rows attributed to one mod, e.g. after uninstalling it
    pub async fn remove_index_for_mod(
        &self,
        game: &GameId,
        mod_id: ModId,
    ) -> Result<u64, ArchiveError> {
        let _guard = self.locks.acquire(game).await;
        let deleted = self.index.delete_for_mod(game, mod_id).await?;
        info!(game = %game, mod_id = mod_id.as_i64(), deleted, "Removed mod from archive index");
        Ok(deleted)
    }

    pub async fn index_stats(&self, game: &GameId) -> Result<IndexStats, ArchiveError> {
        Ok(self.index.stats(game).await?)
    }
}
