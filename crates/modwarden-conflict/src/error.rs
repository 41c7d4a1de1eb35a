//! Error types for conflict detection and load-order resolution

use modwarden_archive::ArchiveError;
use modwarden_core::domain::DomainError;
use thiserror::Error;

/// Errors that can occur while detecting conflicts or resolving load order
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Game, mod or file does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Request rejected before touching storage (self edge, disabled mod)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Detector failed on its own inputs
    #[error("detector {detector} failed: {reason}")]
    Detector { detector: String, reason: String },

    /// Indexing step of a reindex failed
    #[error("archive index error: {0}")]
    Archive(#[from] ArchiveError),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DomainError> for ConflictError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound(what) => ConflictError::NotFound(what),
            other => ConflictError::Validation(other.to_string()),
        }
    }
}
