//! Conflict engine
//!
//! Runs every registered detector over one immutable snapshot of a game and
//! swaps the game's persisted evidence for the new aggregate in a single
//! transaction. A failing or panicking detector only degrades coverage; the
//! run still completes and its outcome is reported per detector.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use modwarden_core::config::GameConfig;
use modwarden_core::domain::{ConflictEvidence, ConflictKind, GameId, UnitOutcome};
use modwarden_core::ports::progress::percent_of;
use modwarden_core::ports::{
    IArchiveIndexRepository, IEvidenceRepository, IModRegistry, ProgressSink,
};
use modwarden_core::scan_lock::GameScanLocks;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::detector::{ConflictDetector, ScanContext};
use crate::error::ConflictError;
use crate::load_order::LoadOrderResolver;

/// Progress phase name used by the engine
pub const PROGRESS_PHASE: &str = "conflicts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Running,
    Complete,
}

/// Output of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct EngineReport {
    pub game_id: GameId,
    pub state: EngineState,
    pub evidence: Vec<ConflictEvidence>,
    /// One outcome per detector, in registration order
    pub outcomes: Vec<UnitOutcome>,
    pub duration_ms: u64,
}

impl EngineReport {
    pub fn count_by_kind(&self) -> BTreeMap<ConflictKind, u64> {
        let mut counts = BTreeMap::new();
        for ev in &self.evidence {
            *counts.entry(ev.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Share of detectors that ran to completion, 0.0 – 1.0
    pub fn coverage(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let ok = self.outcomes.iter().filter(|o| !o.is_failed()).count();
        ok as f64 / self.outcomes.len() as f64
    }
}

pub struct ConflictEngine {
    registry: Arc<dyn IModRegistry>,
    index: Arc<dyn IArchiveIndexRepository>,
    evidence: Arc<dyn IEvidenceRepository>,
    resolver: Arc<LoadOrderResolver>,
    detectors: Vec<Arc<dyn ConflictDetector>>,
    locks: GameScanLocks,
    parallel: bool,
    states: Mutex<HashMap<GameId, EngineState>>,
}

impl ConflictEngine {
    pub fn new(
        registry: Arc<dyn IModRegistry>,
        index: Arc<dyn IArchiveIndexRepository>,
        evidence: Arc<dyn IEvidenceRepository>,
        resolver: Arc<LoadOrderResolver>,
        detectors: Vec<Arc<dyn ConflictDetector>>,
        locks: GameScanLocks,
    ) -> Self {
        Self {
            registry,
            index,
            evidence,
            resolver,
            detectors,
            locks,
            parallel: true,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Runs detectors one after another instead of concurrently
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn detector_kinds(&self) -> Vec<ConflictKind> {
        self.detectors.iter().map(|d| d.kind()).collect()
    }

    pub fn state(&self, game: &GameId) -> EngineState {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(game)
            .copied()
            .unwrap_or(EngineState::Idle)
    }

    fn set_state(&self, game: &GameId, state: EngineState) {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(game.clone(), state);
    }

    async fn run_detectors(
        &self,
        ctx: &Arc<ScanContext>,
        progress: &ProgressSink,
    ) -> Vec<(UnitOutcome, Vec<ConflictEvidence>)> {
        let total = self.detectors.len();
        let mut results = Vec::with_capacity(total);

        if self.parallel {
            let handles: Vec<_> = self
                .detectors
                .iter()
                .map(|d| {
                    let detector = Arc::clone(d);
                    let ctx = Arc::clone(ctx);
                    tokio::spawn(async move { detector.detect(ctx).await })
                })
                .collect();
            // Joined in registration order so output never depends on timing
            for (i, (detector, handle)) in self.detectors.iter().zip(handles).enumerate() {
                let joined = handle.await.map_err(|e| ConflictError::Detector {
                    detector: detector.kind().to_string(),
                    reason: if e.is_panic() {
                        "detector panicked".to_string()
                    } else {
                        e.to_string()
                    },
                });
                results.push(settle(detector.kind(), joined.and_then(|r| r)));
                progress.emit(
                    PROGRESS_PHASE,
                    format!("{} complete", detector.kind()),
                    percent_of(i + 1, total),
                );
            }
        } else {
            for (i, detector) in self.detectors.iter().enumerate() {
                let result = detector.detect(Arc::clone(ctx)).await;
                results.push(settle(detector.kind(), result));
                progress.emit(
                    PROGRESS_PHASE,
                    format!("{} complete", detector.kind()),
                    percent_of(i + 1, total),
                );
            }
        }
        results
    }

    /// Rebuilds the game's evidence from scratch
    ///
    /// Holds the game's scan lock for the whole run. Errors loading the
    /// snapshot or persisting the result are returned; detector errors are not.
    pub async fn run(
        &self,
        game: &GameConfig,
        progress: &ProgressSink,
    ) -> Result<EngineReport, ConflictError> {
        let _guard = self.locks.acquire(&game.id).await;
        self.set_state(&game.id, EngineState::Running);
        let started = Instant::now();
        info!(game = %game.id, detectors = self.detectors.len(), parallel = self.parallel, "Starting conflict scan");

        let result = self.scan(game, progress).await;
        match result {
            Ok((evidence, outcomes)) => {
                self.set_state(&game.id, EngineState::Complete);
                let report = EngineReport {
                    game_id: game.id.clone(),
                    state: EngineState::Complete,
                    evidence,
                    outcomes,
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                info!(
                    game = %game.id,
                    conflicts = report.evidence.len(),
                    coverage = report.coverage(),
                    duration_ms = report.duration_ms,
                    "Conflict scan complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(&game.id, EngineState::Idle);
                error!(game = %game.id, error = %e, "Conflict scan aborted");
                Err(e)
            }
        }
    }

    async fn scan(
        &self,
        game: &GameConfig,
        progress: &ProgressSink,
    ) -> Result<(Vec<ConflictEvidence>, Vec<UnitOutcome>), ConflictError> {
        let mods = self.registry.list_installed_mods(&game.id).await?;
        let records = if self.detector_kinds().contains(&ConflictKind::ArchiveEntry) {
            self.index.records_for_game(&game.id).await?
        } else {
            Vec::new()
        };
        let resolved = self.resolver.resolve(game, &mods).await?;
        debug!(game = %game.id, mods = mods.len(), records = records.len(), "Loaded scan snapshot");

        let ctx = Arc::new(ScanContext::new(game.clone(), mods, records, resolved.order));
        let mut evidence = Vec::new();
        let mut outcomes = Vec::with_capacity(self.detectors.len());
        for (outcome, found) in self.run_detectors(&ctx, progress).await {
            outcomes.push(outcome);
            evidence.extend(found);
        }

        self.evidence.replace_evidence(&game.id, &evidence).await?;
        Ok((evidence, outcomes))
    }
}

fn settle(
    kind: ConflictKind,
    result: Result<Vec<ConflictEvidence>, ConflictError>,
) -> (UnitOutcome, Vec<ConflictEvidence>) {
    match result {
        Ok(found) => {
            info!(detector = %kind, conflicts = found.len(), "Detector finished");
            (UnitOutcome::succeeded(kind.as_str(), found.len()), found)
        }
        Err(e) => {
            warn!(detector = %kind, error = %e, "Detector failed");
            (UnitOutcome::failed(kind.as_str(), e.to_string()), Vec::new())
        }
    }
}
