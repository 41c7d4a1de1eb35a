//! Prefer command - Manage explicit load-order preferences
//!
//! Adding or removing an edge regenerates the game's modlist.txt.

use anyhow::{Context, Result};
use clap::Subcommand;
use modwarden_core::domain::ModId;
use tracing::info;

use super::CliContext;
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum PreferCommand {
    /// Make one mod win its conflicts against others
    Add {
        /// Game id
        game: String,
        /// Winning mod id
        winner: i64,
        /// Losing mod ids
        #[arg(required = true)]
        losers: Vec<i64>,
    },
    /// Delete a preference edge
    Remove {
        /// Game id
        game: String,
        /// Winning mod id
        winner: i64,
        /// Losing mod id
        loser: i64,
    },
    /// List preference edges, oldest first
    List {
        /// Game id
        game: String,
    },
}

impl PreferCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let game_id = match self {
            PreferCommand::Add { game, .. }
            | PreferCommand::Remove { game, .. }
            | PreferCommand::List { game } => game,
        };
        let game = ctx.game(game_id)?;
        let services = match ctx.open_services(&*formatter).await? {
            Some(s) => s,
            None => return Ok(()),
        };
        let resolver = services.resolver();

        match self {
            PreferCommand::Add { winner, losers, .. } => {
                let winner = ModId::new(*winner);
                let losers: Vec<ModId> = losers.iter().map(|id| ModId::new(*id)).collect();
                info!(game = %game.id, winner = %winner, losers = losers.len(), "Adding preferences");
                let added = match resolver.add_preferences(game, winner, &losers).await {
                    Ok(added) => added,
                    Err(e) => {
                        formatter.error(&e.to_string());
                        return Ok(());
                    }
                };
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "winner": winner,
                        "losers": losers,
                        "added": added,
                    }));
                } else {
                    formatter.success(&format!(
                        "Mod {winner} now wins against {} ({} new)",
                        plural(losers.len(), "mod"),
                        added
                    ));
                }
            }
            PreferCommand::Remove { winner, loser, .. } => {
                let (winner, loser) = (ModId::new(*winner), ModId::new(*loser));
                let removed = resolver
                    .remove_preference(game, winner, loser)
                    .await
                    .context("Failed to remove preference")?;
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "winner": winner,
                        "loser": loser,
                        "removed": removed,
                    }));
                } else if removed {
                    formatter.success(&format!("Removed preference {winner} > {loser}"));
                } else {
                    formatter.warn(&format!("No preference {winner} > {loser}"));
                }
            }
            PreferCommand::List { .. } => {
                let prefs = resolver
                    .list_preferences(&game.id)
                    .await
                    .context("Failed to list preferences")?;
                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&prefs)?);
                } else if prefs.is_empty() {
                    formatter.success("No preferences");
                } else {
                    formatter.success(&plural(prefs.len(), "preference"));
                    for p in &prefs {
                        formatter.info(&format!(
                            "{} > {}  (added {})",
                            p.winner_mod_id,
                            p.loser_mod_id,
                            p.created_at.format("%Y-%m-%d %H:%M:%S")
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
