//! ModWarden Archive - packed-resource archive parsing and indexing
//!
//! Provides:
//! - A read-only decoder for the RDAR header and table of contents
//! - Discovery of archive files under a game's mod directories
//! - The archive entry indexer that persists resource-hash facts
//!
//! ## Modules
//!
//! - [`format`] - Header / TOC decoding, never touches payload bytes
//! - [`discovery`] - Filesystem enumeration of candidate archives
//! - [`indexer`] - Incremental and full index rebuilds

pub mod discovery;
pub mod format;
pub mod indexer;

use thiserror::Error;

pub use discovery::{discover_archives, DiscoveredArchive};
pub use format::{parse_header, parse_toc, ArchiveHeader, HashEntry, TableOfContents};
pub use indexer::{ArchiveIndexer, IndexReport};

/// Errors that can occur while reading or indexing archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Bad signature or inconsistent header / preamble
    #[error("Invalid archive format: {0}")]
    Format(String),

    /// A declared structure extends past the available bytes
    #[error("Archive truncated: {0}")]
    Truncated(String),

    /// Declared hash table exceeds the sanity ceiling
    #[error("Hash table of {declared} bytes exceeds limit of {limit} bytes")]
    SizeLimit {
        /// Bytes the preamble asked for
        declared: u64,
        /// Configured ceiling
        limit: u64,
    },

    /// An I/O error occurred while reading the archive
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry or index storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// The blocking indexing task panicked or was cancelled
    #[error("Indexing task failed: {0}")]
    Task(String),
}
