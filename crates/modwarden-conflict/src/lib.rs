//! ModWarden Conflict - conflict detection and load-order resolution
//!
//! Provides:
//! - The [`ConflictDetector`] capability and three built-in detectors
//!   (archive entries, script overrides, tweak keys)
//! - The [`ConflictEngine`] that rebuilds a game's evidence atomically
//! - The [`LoadOrderResolver`] for preferences and `modlist.txt`
//! - Caller-facing use cases: full reindex, evidence queries and the
//!   per-archive collision summary

pub mod archive_summary;
pub mod detector;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod load_order;
pub mod modlist;
pub mod parsers;
pub mod use_cases;

pub use archive_summary::{summarize_archives, ArchiveConflictSummary, ArchiveImpact};
pub use detector::{ConflictDetector, ScanContext};
pub use detectors::{
    builtin_set, ArchiveEntryDetector, CompatibleWrap, ScriptAnalysis, ScriptOverrideDetector,
    TweakKeyDetector,
};
pub use engine::{ConflictEngine, EngineReport, EngineState};
pub use error::ConflictError;
pub use load_order::{LoadOrderResolver, ModlistWrite, ResolvedOrder};
pub use modlist::OrderGroup;
pub use use_cases::{EvidenceQuery, EvidenceView, NamedMod, ReindexSummary, ReindexUseCase};
