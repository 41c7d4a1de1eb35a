//! ModWarden Cache - SQLite persistence
//!
//! SQLite-backed storage for:
//! - The archive entry index
//! - Conflict evidence
//! - Load-order preferences
//! - A read-only view of the installed-mod registry tables
//!
//! ## Architecture
//!
//! This crate implements the storage ports from `modwarden-core`. It is a
//! driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteCacheRepository`] - Index, evidence and preference ports
//! - [`SqliteModRegistry`] - `IModRegistry` over the registry tables
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use modwarden_cache::{DatabasePool, SqliteCacheRepository, SqliteModRegistry};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/modwarden/modwarden.db")).await?;
//! let repo = SqliteCacheRepository::new(pool.pool().clone());
//! let registry = SqliteModRegistry::new(pool.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod registry;
pub mod repository;

pub use pool::DatabasePool;
pub use registry::SqliteModRegistry;
pub use repository::SqliteCacheRepository;

use modwarden_core::domain::DomainError;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

impl From<DomainError> for CacheError {
    fn from(e: DomainError) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}
