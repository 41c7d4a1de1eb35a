//! Caller-facing use cases
//!
//! These compose the indexer, the engine and the registry into the
//! operations exposed to the CLI.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use modwarden_archive::{ArchiveIndexer, IndexReport};
use modwarden_core::config::GameConfig;
use modwarden_core::domain::{
    ConflictEvidence, ConflictKind, EvidenceId, GameId, ModId, Severity, UnitOutcome,
};
use modwarden_core::ports::{
    EvidenceFilter, IArchiveIndexRepository, IEvidenceRepository, IModRegistry, ProgressSink,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::archive_summary::{summarize_archives, ArchiveConflictSummary};
use crate::engine::ConflictEngine;
use crate::error::ConflictError;
use crate::load_order::LoadOrderResolver;

/// Summary returned by a full reindex
#[derive(Debug, Clone, Serialize)]
pub struct ReindexSummary {
    pub game_id: GameId,
    pub conflicts_found: usize,
    pub by_kind: BTreeMap<ConflictKind, u64>,
    pub duration_ms: u64,
    /// Share of detectors that completed, 0.0 – 1.0
    pub coverage: f64,
    pub detector_outcomes: Vec<UnitOutcome>,
    pub index: IndexReport,
}

/// Forced archive index rebuild followed by a conflict scan
pub struct ReindexUseCase {
    indexer: Arc<ArchiveIndexer>,
    engine: Arc<ConflictEngine>,
}

impl ReindexUseCase {
    pub fn new(indexer: Arc<ArchiveIndexer>, engine: Arc<ConflictEngine>) -> Self {
        Self { indexer, engine }
    }

    pub async fn run(
        &self,
        game: &GameConfig,
        progress: &ProgressSink,
    ) -> Result<ReindexSummary, ConflictError> {
        let started = Instant::now();
        let index = self.indexer.index(game, true, progress).await?;
        let report = self.engine.run(game, progress).await?;

        let summary = ReindexSummary {
            game_id: game.id.clone(),
            conflicts_found: report.evidence.len(),
            by_kind: report.count_by_kind(),
            duration_ms: started.elapsed().as_millis() as u64,
            coverage: report.coverage(),
            detector_outcomes: report.outcomes,
            index,
        };
        info!(
            game = %game.id,
            conflicts = summary.conflicts_found,
            duration_ms = summary.duration_ms,
            "Reindex complete"
        );
        Ok(summary)
    }
}

/// A participant with its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedMod {
    pub id: ModId,
    pub name: String,
}

/// Evidence with mod ids resolved to names
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceView {
    pub id: EvidenceId,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub key: String,
    pub mods: Vec<NamedMod>,
    pub winner: Option<NamedMod>,
    pub detail: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Read side of the evidence store and the archive index
pub struct EvidenceQuery {
    evidence: Arc<dyn IEvidenceRepository>,
    registry: Arc<dyn IModRegistry>,
    index: Arc<dyn IArchiveIndexRepository>,
    resolver: Arc<LoadOrderResolver>,
}

impl EvidenceQuery {
    pub fn new(
        evidence: Arc<dyn IEvidenceRepository>,
        registry: Arc<dyn IModRegistry>,
        index: Arc<dyn IArchiveIndexRepository>,
        resolver: Arc<LoadOrderResolver>,
    ) -> Self {
        Self {
            evidence,
            registry,
            index,
            resolver,
        }
    }

    pub async fn list(
        &self,
        game: &GameId,
        kind: Option<ConflictKind>,
        severity: Option<Severity>,
    ) -> Result<Vec<EvidenceView>, ConflictError> {
        let filter = EvidenceFilter {
            kind,
            severity,
            mod_id: None,
        };
        self.list_filtered(game, &filter).await
    }

    pub async fn list_filtered(
        &self,
        game: &GameId,
        filter: &EvidenceFilter,
    ) -> Result<Vec<EvidenceView>, ConflictError> {
        let rows = self.evidence.query_evidence(game, filter).await?;
        let names: HashMap<ModId, String> = self
            .registry
            .list_installed_mods(game)
            .await?
            .into_iter()
            .map(|m| (m.id(), m.name().to_string()))
            .collect();

        Ok(rows.iter().map(|ev| view(ev, &names)).collect())
    }

    pub async fn counts(&self, game: &GameId) -> Result<BTreeMap<ConflictKind, u64>, ConflictError> {
        Ok(self.evidence.count_by_kind(game).await?)
    }

    /// Wins and losses of each archive in resource-hash collisions,
    /// computed from the current index and load order
    pub async fn archive_summary(
        &self,
        game: &GameConfig,
    ) -> Result<Vec<ArchiveConflictSummary>, ConflictError> {
        let mods = self.registry.list_installed_mods(&game.id).await?;
        let order = self.resolver.resolve(game, &mods).await?.order;
        let records = self.index.records_for_game(&game.id).await?;

        let summaries = summarize_archives(&records, &mods, &order);
        debug!(
            game = %game.id,
            records = records.len(),
            archives = summaries.len(),
            "Summarized archive collisions"
        );
        Ok(summaries)
    }
}

fn named(id: ModId, names: &HashMap<ModId, String>) -> NamedMod {
    NamedMod {
        id,
        name: names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown (ID {id})")),
    }
}

fn view(ev: &ConflictEvidence, names: &HashMap<ModId, String>) -> EvidenceView {
    EvidenceView {
        id: ev.id(),
        kind: ev.kind(),
        severity: ev.severity(),
        key: ev.key().to_string(),
        mods: ev.mod_ids().iter().map(|id| named(*id, names)).collect(),
        winner: ev.winner_mod_id().map(|id| named(id, names)),
        detail: ev.detail().clone(),
        created_at: ev.created_at(),
    }
}
