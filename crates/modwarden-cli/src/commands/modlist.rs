//! Modlist command - Regenerate the game's load-order artifact

use anyhow::{Context, Result};
use clap::Args;

use super::CliContext;
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct ModlistCommand {
    /// Game id
    pub game: String,
    /// Print the order without writing modlist.txt
    #[arg(long)]
    pub dry_run: bool,
}

impl ModlistCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let game = ctx.game(&self.game)?;
        let services = match ctx.open_services(&*formatter).await? {
            Some(s) => s,
            None => return Ok(()),
        };
        let resolver = services.resolver();

        if self.dry_run {
            let lines = resolver
                .generate_modlist(game)
                .await
                .context("Failed to generate modlist")?;
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "path": game.modlist_path(),
                    "written": false,
                    "lines": lines,
                }));
            } else {
                formatter.success(&format!("{} (not written)", plural(lines.len(), "archive")));
                for line in &lines {
                    formatter.info(line);
                }
            }
            return Ok(());
        }

        let written = resolver
            .write_modlist(game)
            .await
            .context("Failed to write modlist")?;
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "path": written.path,
                "written": true,
                "entries": written.entries,
            }));
        } else if written.entries == 0 {
            formatter.success(&format!(
                "Nothing to order; removed {}",
                written.path.display()
            ));
        } else {
            formatter.success(&format!(
                "Wrote {} to {}",
                plural(written.entries, "archive"),
                written.path.display()
            ));
        }
        Ok(())
    }
}
