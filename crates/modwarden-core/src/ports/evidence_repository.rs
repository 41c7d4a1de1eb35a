//! Conflict evidence storage port
//!
//! The engine is the only writer. Evidence for a game is replaced as a
//! whole, never patched.

use std::collections::BTreeMap;

use crate::domain::{ConflictEvidence, ConflictKind, GameId, ModId, Severity};

/// Filter for evidence queries; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceFilter {
    pub kind: Option<ConflictKind>,
    pub severity: Option<Severity>,
    pub mod_id: Option<ModId>,
}

impl EvidenceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: ConflictKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_mod(mut self, mod_id: ModId) -> Self {
        self.mod_id = Some(mod_id);
        self
    }
}

#[async_trait::async_trait]
pub trait IEvidenceRepository: Send + Sync {
    /// Deletes all evidence for `game` and stores `evidence` in one transaction
    async fn replace_evidence(
        &self,
        game: &GameId,
        evidence: &[ConflictEvidence],
    ) -> anyhow::Result<()>;

    /// Evidence for a game, highest severity first, then by kind and key
    async fn query_evidence(
        &self,
        game: &GameId,
        filter: &EvidenceFilter,
    ) -> anyhow::Result<Vec<ConflictEvidence>>;

    async fn count_by_kind(&self, game: &GameId) -> anyhow::Result<BTreeMap<ConflictKind, u64>>;
}
