//! Built-in conflict detectors

pub mod archive_entry;
pub mod script_override;
pub mod tweak_key;

use std::sync::Arc;

use modwarden_core::domain::ConflictKind;

pub use archive_entry::ArchiveEntryDetector;
pub use script_override::{CompatibleWrap, ScriptAnalysis, ScriptOverrideDetector};
pub use tweak_key::TweakKeyDetector;

use crate::detector::ConflictDetector;

/// Instantiates the built-in detector for `kind`
pub fn builtin(kind: ConflictKind) -> Arc<dyn ConflictDetector> {
    match kind {
        ConflictKind::ArchiveEntry => Arc::new(ArchiveEntryDetector::new()),
        ConflictKind::ScriptOverride => Arc::new(ScriptOverrideDetector::new()),
        ConflictKind::TweakKey => Arc::new(TweakKeyDetector::new()),
    }
}

/// Built-in detectors for the given kinds, in the order given
pub fn builtin_set(kinds: &[ConflictKind]) -> Vec<Arc<dyn ConflictDetector>> {
    kinds.iter().map(|k| builtin(*k)).collect()
}
