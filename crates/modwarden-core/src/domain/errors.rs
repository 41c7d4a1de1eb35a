//! Domain error types
//!
//! Validation failures raised while constructing domain values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid relative path (absolute, empty, or escaping the install root)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid hash literal
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Unknown enum value read from storage or user input
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// Which field was being parsed
        field: &'static str,
        /// The rejected value
        value: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Lookup of a game or mod that does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}
