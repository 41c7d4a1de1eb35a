//! Stats command - Index and evidence totals for a game

use anyhow::{Context, Result};
use clap::Args;

use super::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Game id
    pub game: String,
}

impl StatsCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let game = ctx.game(&self.game)?;
        let services = match ctx.open_services(&*formatter).await? {
            Some(s) => s,
            None => return Ok(()),
        };

        let index = services
            .indexer(&ctx.config)
            .index_stats(&game.id)
            .await
            .context("Failed to read index stats")?;
        let conflicts = services
            .evidence_query()
            .counts(&game.id)
            .await
            .context("Failed to count conflicts")?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "game_id": game.id,
                "index": index,
                "conflicts": conflicts,
            }));
            return Ok(());
        }

        formatter.success(&format!("{} ({})", game.name, game.id));
        let rows = [
            ("Indexed entries", index.total_entries),
            ("Indexed archives", index.archives),
            ("Unattributed archives", index.unattributed_archives),
        ];
        for (label, value) in rows {
            formatter.info(&format!("{:<22} {}", format!("{label}:"), value));
        }
        for (kind, count) in &conflicts {
            formatter.info(&format!("{:<22} {}", format!("{}:", kind.as_str()), count));
        }
        Ok(())
    }
}
