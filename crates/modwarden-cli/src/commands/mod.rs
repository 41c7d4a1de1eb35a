//! CLI subcommands and the wiring they share

pub mod completions;
pub mod config;
pub mod conflicts;
pub mod index;
pub mod modlist;
pub mod prefer;
pub mod stats;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use modwarden_archive::ArchiveIndexer;
use modwarden_cache::{DatabasePool, SqliteCacheRepository, SqliteModRegistry};
use modwarden_conflict::{builtin_set, ConflictEngine, EvidenceQuery, LoadOrderResolver};
use modwarden_core::config::{Config, GameConfig};
use modwarden_core::domain::GameId;
use modwarden_core::ports::{ProgressEvent, ProgressSink};
use modwarden_core::scan_lock::GameScanLocks;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::output::{OutputFormat, OutputFormatter};

/// Settings resolved from global flags and the config file
pub struct CliContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub quiet: bool,
}

impl CliContext {
    pub fn load(config_path: Option<&str>, quiet: bool) -> Self {
        let config_path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_path);
        let config = Config::load_or_default(&config_path);
        Self {
            config,
            config_path,
            quiet,
        }
    }

    pub fn game(&self, id: &str) -> Result<&GameConfig> {
        let id = GameId::new(id).context("Invalid game id")?;
        Ok(self.config.game(&id)?)
    }

    /// Opens the library database; `None` after reporting when it is missing
    pub async fn open_services(&self, formatter: &dyn OutputFormatter) -> Result<Option<Services>> {
        let db_path = &self.config.library.database;
        if !db_path.exists() {
            formatter.error(&format!(
                "No library database found at {}. Check 'library.database' in {}.",
                db_path.display(),
                self.config_path.display()
            ));
            return Ok(None);
        }

        let db = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;
        let repo = Arc::new(SqliteCacheRepository::new(db.pool().clone()));
        let registry = Arc::new(SqliteModRegistry::new(db.pool().clone()));
        Ok(Some(Services {
            _db: db,
            repo,
            registry,
            locks: GameScanLocks::new(),
        }))
    }

    /// Progress sink plus a task echoing events, unless output must stay clean
    pub fn progress(&self, format: OutputFormat) -> (ProgressSink, Option<JoinHandle<()>>) {
        if self.quiet || format.is_json() {
            return (ProgressSink::none(), None);
        }
        let (sink, rx) = ProgressSink::channel(self.config.indexer.progress_buffer);
        (sink, Some(tokio::spawn(print_progress(rx))))
    }
}

async fn print_progress(mut rx: mpsc::Receiver<ProgressEvent>) {
    while let Some(event) = rx.recv().await {
        println!("  [{:>3}%] {}", event.percent, event.message);
    }
}

/// Drops the sink so the printer drains and exits
pub async fn finish_progress(sink: ProgressSink, printer: Option<JoinHandle<()>>) {
    drop(sink);
    if let Some(handle) = printer {
        let _ = handle.await;
    }
}

/// Repositories and services over one open database
pub struct Services {
    _db: DatabasePool,
    pub repo: Arc<SqliteCacheRepository>,
    pub registry: Arc<SqliteModRegistry>,
    pub locks: GameScanLocks,
}

impl Services {
    pub fn indexer(&self, config: &Config) -> ArchiveIndexer {
        ArchiveIndexer::new(self.repo.clone(), self.registry.clone(), self.locks.clone())
            .with_max_hash_table_bytes(config.indexer.max_hash_table_bytes())
    }

    pub fn resolver(&self) -> Arc<LoadOrderResolver> {
        Arc::new(LoadOrderResolver::new(
            self.registry.clone(),
            self.repo.clone(),
        ))
    }

    pub fn engine(&self, config: &Config) -> ConflictEngine {
        ConflictEngine::new(
            self.registry.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.resolver(),
            builtin_set(&config.conflicts.enabled_kinds()),
            self.locks.clone(),
        )
        .with_parallel(config.conflicts.parallel)
    }

    pub fn evidence_query(&self) -> EvidenceQuery {
        EvidenceQuery::new(
            self.repo.clone(),
            self.registry.clone(),
            self.repo.clone(),
            self.resolver(),
        )
    }
}
