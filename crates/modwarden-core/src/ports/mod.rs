//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the workflow crates depend on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IModRegistry`] - Read-only view of the external installed-mod registry
//! - [`IArchiveIndexRepository`] - Storage for archive index records
//! - [`IEvidenceRepository`] - Storage for conflict evidence
//! - [`IPreferenceRepository`] - Storage for load-order preference edges
//! - [`ProgressSink`] - Fire-and-forget progress side channel

pub mod archive_index_repository;
pub mod evidence_repository;
pub mod mod_registry;
pub mod preference_repository;
pub mod progress;

pub use archive_index_repository::IArchiveIndexRepository;
pub use evidence_repository::{EvidenceFilter, IEvidenceRepository};
pub use mod_registry::IModRegistry;
pub use preference_repository::IPreferenceRepository;
pub use progress::{ProgressEvent, ProgressSink};
