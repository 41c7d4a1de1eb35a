//! Index command - Build the archive entry index for a game
//!
//! `modwarden index <game>` parses newly added archives only;
//! `--force` rebuilds the game's whole index.

use anyhow::{Context, Result};
use clap::Args;
use modwarden_core::domain::UnitStatus;
use tracing::info;

use super::{finish_progress, CliContext};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct IndexCommand {
    /// Game id as configured under `games`
    pub game: String,
    /// Re-parse every archive and replace the game's index
    #[arg(long)]
    pub force: bool,
}

impl IndexCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let game = ctx.game(&self.game)?;
        let services = match ctx.open_services(&*formatter).await? {
            Some(s) => s,
            None => return Ok(()),
        };

        info!(game = %game.id, force = self.force, "Indexing archives");
        let (sink, printer) = ctx.progress(format);
        let result = services
            .indexer(&ctx.config)
            .index(game, self.force, &sink)
            .await;
        finish_progress(sink, printer).await;
        let report = result.context("Archive indexing failed")?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&report)?);
            return Ok(());
        }

        formatter.success(&format!(
            "Indexed {} new entries from {} ({} skipped, {} failed) in {} ms",
            report.new_entries,
            plural(report.archives_found, "archive"),
            report.archives_skipped,
            report.archives_failed,
            report.duration_ms
        ));
        for outcome in &report.outcomes {
            if let UnitStatus::Failed { reason } = &outcome.status {
                formatter.warn(&format!("{}: {}", outcome.unit, reason));
            }
        }
        Ok(())
    }
}
