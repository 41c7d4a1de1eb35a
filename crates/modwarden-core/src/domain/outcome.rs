//! Per-unit outcomes
//!
//! Both the indexer (one unit per archive) and the conflict engine (one unit
//! per detector) report what happened to every unit of work, so callers can
//! see coverage instead of relying on logs.

use serde::{Deserialize, Serialize};

/// Result of processing one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    /// Processed; `produced` items came out of it
    Succeeded { produced: usize },
    /// Deliberately not processed
    Skipped { reason: String },
    /// Processing failed; the rest of the run continued
    Failed { reason: String },
}

/// A named unit and what happened to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub unit: String,
    #[serde(flatten)]
    pub status: UnitStatus,
}

impl UnitOutcome {
    pub fn succeeded(unit: impl Into<String>, produced: usize) -> Self {
        Self {
            unit: unit.into(),
            status: UnitStatus::Succeeded { produced },
        }
    }

    pub fn skipped(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            status: UnitStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn failed(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            status: UnitStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, UnitStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, UnitStatus::Skipped { .. })
    }
}
