//! Conflict evidence
//!
//! Evidence is the only output of the conflict engine. A game's evidence set
//! is always rebuilt as a whole, so `created_at` is the time of the latest
//! engine run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{EvidenceId, GameId, ModId};

/// Which detector produced a piece of evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Two mods ship the same file path or the same packed resource hash
    ArchiveEntry,
    /// Two mods override the same script function
    ScriptOverride,
    /// Two mods touch the same tweak key
    TweakKey,
}

impl ConflictKind {
    /// Every kind, in reporting order
    pub const ALL: [ConflictKind; 3] = [
        ConflictKind::ArchiveEntry,
        ConflictKind::ScriptOverride,
        ConflictKind::TweakKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::ArchiveEntry => "archive_entry",
            ConflictKind::ScriptOverride => "script_override",
            ConflictKind::TweakKey => "tweak_key",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive_entry" => Ok(ConflictKind::ArchiveEntry),
            "script_override" => Ok(ConflictKind::ScriptOverride),
            "tweak_key" => Ok(ConflictKind::TweakKey),
            other => Err(DomainError::InvalidValue {
                field: "conflict kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Qualitative risk of a conflict; ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(DomainError::InvalidValue {
                field: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// One detected conflict between two or more installed mods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEvidence {
    id: EvidenceId,
    game_id: GameId,
    kind: ConflictKind,
    severity: Severity,
    key: String,
    mod_ids: Vec<ModId>,
    winner_mod_id: Option<ModId>,
    detail: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ConflictEvidence {
    /// Creates new evidence
    ///
    /// `mod_ids` is deduplicated preserving first occurrence. Fewer than two
    /// distinct participants, or a winner that is not a participant, is
    /// rejected.
    pub fn new(
        game_id: GameId,
        kind: ConflictKind,
        severity: Severity,
        key: impl Into<String>,
        mod_ids: Vec<ModId>,
    ) -> Result<Self, DomainError> {
        let mut participants: Vec<ModId> = Vec::with_capacity(mod_ids.len());
        for id in mod_ids {
            if !participants.contains(&id) {
                participants.push(id);
            }
        }
        if participants.len() < 2 {
            return Err(DomainError::ValidationFailed(format!(
                "conflict evidence needs at least two participants, got {}",
                participants.len()
            )));
        }

        Ok(Self {
            id: EvidenceId::new(),
            game_id,
            kind,
            severity,
            key: key.into(),
            mod_ids: participants,
            winner_mod_id: None,
            detail: serde_json::Value::Null,
            created_at: Utc::now(),
        })
    }

    pub fn with_winner(mut self, winner: Option<ModId>) -> Result<Self, DomainError> {
        if let Some(w) = winner {
            if !self.mod_ids.contains(&w) {
                return Err(DomainError::ValidationFailed(format!(
                    "winner {w} is not a participant of conflict '{}'",
                    self.key
                )));
            }
        }
        self.winner_mod_id = winner;
        Ok(self)
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Rebuilds evidence read back from storage without re-validating
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: EvidenceId,
        game_id: GameId,
        kind: ConflictKind,
        severity: Severity,
        key: String,
        mod_ids: Vec<ModId>,
        winner_mod_id: Option<ModId>,
        detail: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            game_id,
            kind,
            severity,
            key,
            mod_ids,
            winner_mod_id,
            detail,
            created_at,
        }
    }

    pub fn id(&self) -> EvidenceId {
        self.id
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn kind(&self) -> ConflictKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn mod_ids(&self) -> &[ModId] {
        &self.mod_ids
    }

    pub fn winner_mod_id(&self) -> Option<ModId> {
        self.winner_mod_id
    }

    pub fn detail(&self) -> &serde_json::Value {
        &self.detail
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn involves(&self, id: ModId) -> bool {
        self.mod_ids.contains(&id)
    }
}
