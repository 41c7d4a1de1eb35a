//! Domain entities
//!
//! - Newtypes for identifiers, hashes and normalized paths
//! - Installed-mod snapshot types read from the external registry
//! - Archive index records produced by the indexer
//! - Conflict evidence produced by the engine
//! - Load-order preferences and the effective order derived from them
//! - Per-unit outcomes used as coverage indicators

pub mod archive_index;
pub mod errors;
pub mod evidence;
pub mod installed_mod;
pub mod load_order;
pub mod newtypes;
pub mod outcome;

pub use archive_index::{ArchiveIndexRecord, IndexStats};
pub use errors::DomainError;
pub use evidence::{ConflictEvidence, ConflictKind, Severity};
pub use installed_mod::InstalledMod;
pub use load_order::{EffectiveOrder, LoadOrderPreference};
pub use newtypes::*;
pub use outcome::{UnitOutcome, UnitStatus};
