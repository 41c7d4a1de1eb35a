//! ModWarden Core - Domain types and boundaries for conflict detection
//!
//! This crate contains the hexagonal core shared by every other crate:
//! - **Domain entities** - `InstalledMod`, `ArchiveIndexRecord`, `ConflictEvidence`,
//!   `LoadOrderPreference`, `EffectiveOrder`
//! - **Port definitions** - `IModRegistry`, `IArchiveIndexRepository`,
//!   `IEvidenceRepository`, `IPreferenceRepository`
//! - **Run coordination** - progress side channel and per-game scan locks
//! - **Configuration** - YAML game and tool configuration
//!
//! # Architecture
//!
//! The domain module holds plain data with no I/O. Ports define the trait
//! interfaces implemented by adapter crates (`modwarden-cache`), and the
//! workflow crates (`modwarden-archive`, `modwarden-conflict`) only talk to
//! storage and the mod registry through them.

pub mod config;
pub mod domain;
pub mod ports;
pub mod scan_lock;
