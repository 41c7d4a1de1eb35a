//! Configuration module for ModWarden.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{ConflictKind, DomainError, GameId, RelativePath};

/// Default ceiling for a single archive's hash table, in MiB.
pub const DEFAULT_MAX_HASH_TABLE_MB: u64 = 512;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for ModWarden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub games: Vec<GameConfig>,
    pub indexer: IndexerConfig,
    pub conflicts: ConflictsConfig,
    pub logging: LoggingConfig,
}

/// Where ModWarden keeps its own state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// SQLite database holding the index, evidence and preferences.
    pub database: PathBuf,
}

/// One moddable game installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub id: GameId,
    #[serde(default)]
    pub name: String,
    /// Install root; every relative path is resolved against it.
    pub install_path: PathBuf,
    /// Directories (relative to the install root) searched for archives.
    #[serde(default = "default_mod_paths")]
    pub mod_paths: Vec<String>,
    /// Archive file extension without the dot.
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
    /// Directory (relative to the install root) holding `modlist.txt`.
    #[serde(default = "default_modlist_dir")]
    pub modlist_dir: String,
    /// Directories scanned for script overrides.
    #[serde(default = "default_script_roots")]
    pub script_roots: Vec<String>,
    /// Directories scanned for tweak definitions.
    #[serde(default = "default_tweak_roots")]
    pub tweak_roots: Vec<String>,
}

/// Archive indexer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Upper bound on one archive's declared hash table (MiB).
    pub max_hash_table_mb: u64,
    /// Capacity of the progress channel; extra events are dropped.
    pub progress_buffer: usize,
}

/// Conflict engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Detector kinds the engine runs, e.g. `archive_entry`.
    pub detectors: Vec<String>,
    /// Run detectors concurrently.
    pub parallel: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum log level: trace, debug, info, warn, error.
    pub level: String,
    /// Emit JSON log lines instead of the human format.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/modwarden/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("modwarden")
            .join("config.yaml")
    }

    /// Look up a configured game.
    pub fn game(&self, id: &GameId) -> Result<&GameConfig, DomainError> {
        self.games
            .iter()
            .find(|g| &g.id == id)
            .ok_or_else(|| DomainError::NotFound(format!("game '{id}' is not configured")))
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_mod_paths() -> Vec<String> {
    vec!["archive/pc/mod".to_string()]
}

fn default_archive_extension() -> String {
    "archive".to_string()
}

fn default_modlist_dir() -> String {
    "archive/pc/mod".to_string()
}

fn default_script_roots() -> Vec<String> {
    vec!["r6/scripts".to_string()]
}

fn default_tweak_roots() -> Vec<String> {
    vec!["r6/tweaks".to_string()]
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("modwarden")
                .join("modwarden.db"),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_hash_table_mb: DEFAULT_MAX_HASH_TABLE_MB,
            progress_buffer: 64,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            detectors: ConflictKind::ALL
                .iter()
                .map(|k| k.as_str().to_string())
                .collect(),
            parallel: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl GameConfig {
    /// A game with the default directory layout.
    pub fn new(id: GameId, install_path: impl Into<PathBuf>) -> Self {
        Self {
            name: id.to_string(),
            id,
            install_path: install_path.into(),
            mod_paths: default_mod_paths(),
            archive_extension: default_archive_extension(),
            modlist_dir: default_modlist_dir(),
            script_roots: default_script_roots(),
            tweak_roots: default_tweak_roots(),
        }
    }

    /// Absolute location of the generated load-order artifact.
    pub fn modlist_path(&self) -> PathBuf {
        self.install_path.join(&self.modlist_dir).join("modlist.txt")
    }
}

impl IndexerConfig {
    pub fn max_hash_table_bytes(&self) -> u64 {
        self.max_hash_table_mb.saturating_mul(1024 * 1024)
    }
}

impl ConflictsConfig {
    /// Detector kinds that parse; unknown names are reported by `validate`.
    pub fn enabled_kinds(&self) -> Vec<ConflictKind> {
        let mut kinds: Vec<ConflictKind> = self
            .detectors
            .iter()
            .filter_map(|d| d.parse().ok())
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"indexer.max_hash_table_mb"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest accepted `indexer.max_hash_table_mb`.
const MAX_HASH_TABLE_CEILING_MB: u64 = 4096;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: String| {
            errors.push(ValidationError { field, message });
        };

        // --- library ---
        if self.library.database.as_os_str().is_empty() {
            push("library.database".into(), "must not be empty".into());
        }

        // --- games ---
        let mut seen = HashSet::new();
        for (i, game) in self.games.iter().enumerate() {
            let prefix = format!("games[{i}]");
            if !seen.insert(game.id.clone()) {
                push(
                    format!("{prefix}.id"),
                    format!("duplicate game id '{}'", game.id),
                );
            }

            // Tilde paths are expanded by the caller, so only check the rest.
            let install = game.install_path.to_string_lossy();
            if install.is_empty() {
                push(format!("{prefix}.install_path"), "must not be empty".into());
            } else if !install.starts_with('~') && !game.install_path.is_dir() {
                push(
                    format!("{prefix}.install_path"),
                    format!("directory does not exist: {}", game.install_path.display()),
                );
            }

            if game.mod_paths.is_empty() {
                push(
                    format!("{prefix}.mod_paths"),
                    "at least one mod path is required".into(),
                );
            }
            let dir_lists = [
                ("mod_paths", &game.mod_paths),
                ("script_roots", &game.script_roots),
                ("tweak_roots", &game.tweak_roots),
            ];
            for (name, list) in dir_lists {
                for dir in list {
                    if let Err(e) = RelativePath::new(dir) {
                        push(format!("{prefix}.{name}"), e.to_string());
                    }
                }
            }
            if let Err(e) = RelativePath::new(&game.modlist_dir) {
                push(format!("{prefix}.modlist_dir"), e.to_string());
            }

            if game.archive_extension.is_empty() || game.archive_extension.contains('.') {
                push(
                    format!("{prefix}.archive_extension"),
                    "must be a non-empty extension without a dot".into(),
                );
            }
        }

        // --- indexer ---
        if self.indexer.max_hash_table_mb == 0 {
            push(
                "indexer.max_hash_table_mb".into(),
                "must be greater than 0".into(),
            );
        } else if self.indexer.max_hash_table_mb > MAX_HASH_TABLE_CEILING_MB {
            push(
                "indexer.max_hash_table_mb".into(),
                format!("must be at most {MAX_HASH_TABLE_CEILING_MB}"),
            );
        }
        if self.indexer.progress_buffer == 0 {
            push(
                "indexer.progress_buffer".into(),
                "must be greater than 0".into(),
            );
        }

        // --- conflicts ---
        for name in &self.conflicts.detectors {
            if name.parse::<ConflictKind>().is_err() {
                push(
                    "conflicts.detectors".into(),
                    format!("unknown detector '{name}'"),
                );
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level".into(),
                format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn library_database(mut self, path: PathBuf) -> Self {
        self.config.library.database = path;
        self
    }

    pub fn game(mut self, game: GameConfig) -> Self {
        self.config.games.push(game);
        self
    }

    pub fn indexer_max_hash_table_mb(mut self, mb: u64) -> Self {
        self.config.indexer.max_hash_table_mb = mb;
        self
    }

    pub fn indexer_progress_buffer(mut self, n: usize) -> Self {
        self.config.indexer.progress_buffer = n;
        self
    }

    pub fn conflicts_detectors(mut self, kinds: &[ConflictKind]) -> Self {
        self.config.conflicts.detectors = kinds.iter().map(|k| k.as_str().to_string()).collect();
        self
    }

    pub fn conflicts_parallel(mut self, parallel: bool) -> Self {
        self.config.conflicts.parallel = parallel;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
