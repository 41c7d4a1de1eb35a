//! Config command - View and manage ModWarden configuration
//!
//! Provides the `modwarden config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual scalar values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file path

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use modwarden_core::config::Config;
use modwarden_core::domain::ConflictKind;
use tracing::info;

use super::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "indexer.max_hash_table_mb")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx, format),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value, format),
            ConfigCommand::Validate => self.execute_validate(ctx, format),
            ConfigCommand::Path => {
                let formatter = get_formatter(format.is_json());
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "config_path": ctx.config_path,
                        "exists": ctx.config_path.exists(),
                    }));
                } else {
                    println!("{}", ctx.config_path.display());
                }
                Ok(())
            }
        }
    }

    fn execute_show(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if format.is_json() {
            let json = serde_json::to_value(&ctx.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");
            let yaml = serde_yaml::to_string(&ctx.config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_set(&self, ctx: &CliContext, key: &str, value: &str, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let mut config = ctx.config.clone();
        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for line in SUPPORTED_KEYS {
                    formatter.info(&format!("  {line}"));
                }
            }
            return Ok(());
        }

        // Game install paths may not exist yet; only reject errors in the edited section
        let section = key.split('.').next().unwrap_or(key);
        let errors: Vec<String> = config
            .validate()
            .into_iter()
            .filter(|e| e.field.starts_with(section))
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
            }
            return Ok(());
        }

        if let Some(parent) = ctx.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(&ctx.config_path, yaml).context("Failed to write configuration file")?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": ctx.config_path,
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", ctx.config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let path = &ctx.config_path;

        let config = match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if path.exists() {
                    format!("Failed to parse configuration: {}", e)
                } else {
                    "Configuration file not found. Using defaults.".to_string()
                };
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": path,
                        "errors": [message],
                    }));
                } else {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %path.display(), "Validating configuration");
        let errors = config.validate();

        if format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": path,
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
        Ok(())
    }
}

const SUPPORTED_KEYS: &[&str] = &[
    "library.database              - SQLite database path",
    "indexer.max_hash_table_mb     - Per-archive hash table ceiling (MiB)",
    "indexer.progress_buffer       - Progress channel capacity",
    "conflicts.detectors           - Comma-separated detector kinds",
    "conflicts.parallel            - true|false",
    "logging.level                 - trace|debug|info|warn|error",
    "logging.json                  - true|false",
];

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "library.database" => {
            config.library.database = PathBuf::from(value);
        }
        "indexer.max_hash_table_mb" => {
            config.indexer.max_hash_table_mb = value
                .parse::<u64>()
                .context("Expected a positive integer for indexer.max_hash_table_mb")?;
        }
        "indexer.progress_buffer" => {
            config.indexer.progress_buffer = value
                .parse::<usize>()
                .context("Expected a positive integer for indexer.progress_buffer")?;
        }
        "conflicts.detectors" => {
            let kinds = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<ConflictKind>().map(|k| k.as_str().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            config.conflicts.detectors = kinds;
        }
        "conflicts.parallel" => {
            config.conflicts.parallel = value
                .parse::<bool>()
                .context("Expected true or false for conflicts.parallel")?;
        }
        "logging.level" => {
            config.logging.level = value.to_string();
        }
        "logging.json" => {
            config.logging.json = value
                .parse::<bool>()
                .context("Expected true or false for logging.json")?;
        }
        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_library_database() {
        let mut config = Config::default();
        apply_config_value(&mut config, "library.database", "/tmp/mw.db").unwrap();
        assert_eq!(config.library.database, PathBuf::from("/tmp/mw.db"));
    }

    #[test]
    fn test_apply_max_hash_table() {
        let mut config = Config::default();
        apply_config_value(&mut config, "indexer.max_hash_table_mb", "64").unwrap();
        assert_eq!(config.indexer.max_hash_table_bytes(), 64 * 1024 * 1024);
    }

    #[test]
    fn test_apply_progress_buffer() {
        let mut config = Config::default();
        apply_config_value(&mut config, "indexer.progress_buffer", "8").unwrap();
        assert_eq!(config.indexer.progress_buffer, 8);
    }

    #[test]
    fn test_apply_detectors() {
        let mut config = Config::default();
        apply_config_value(&mut config, "conflicts.detectors", "tweak_key, archive_entry").unwrap();
        assert_eq!(
            config.conflicts.enabled_kinds(),
            vec![ConflictKind::ArchiveEntry, ConflictKind::TweakKey]
        );
    }

    #[test]
    fn test_apply_unknown_detector_fails() {
        let mut config = Config::default();
        let before = config.conflicts.detectors.clone();
        assert!(apply_config_value(&mut config, "conflicts.detectors", "archive_entry,bogus").is_err());
        assert_eq!(config.conflicts.detectors, before);
    }

    #[test]
    fn test_apply_parallel() {
        let mut config = Config::default();
        apply_config_value(&mut config, "conflicts.parallel", "false").unwrap();
        assert!(!config.conflicts.parallel);
        assert!(apply_config_value(&mut config, "conflicts.parallel", "nope").is_err());
    }

    #[test]
    fn test_apply_logging() {
        let mut config = Config::default();
        apply_config_value(&mut config, "logging.level", "debug").unwrap();
        apply_config_value(&mut config, "logging.json", "true").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_apply_unknown_key_fails() {
        let mut config = Config::default();
        assert!(apply_config_value(&mut config, "unknown.key", "value").is_err());
    }

    #[test]
    fn test_apply_negative_number_fails() {
        let mut config = Config::default();
        assert!(apply_config_value(&mut config, "indexer.max_hash_table_mb", "-5").is_err());
    }
}
