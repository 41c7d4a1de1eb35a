//! Conflicts command - Rebuild and inspect conflict evidence
//!
//! Provides the `modwarden conflicts` CLI command which:
//! 1. Rebuilds a game's archive index and evidence from scratch
//! 2. Lists stored evidence, filtered by kind, severity or mod
//! 3. Summarizes, per archive, the resource hashes it wins and loses

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use modwarden_conflict::{ArchiveConflictSummary, ArchiveImpact, EvidenceView, ReindexUseCase};
use modwarden_core::domain::{ConflictKind, ModId, Severity, UnitStatus};
use modwarden_core::ports::EvidenceFilter;
use tracing::info;

use super::{finish_progress, CliContext};
use crate::output::{get_formatter, plural, severity_label, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum ConflictsCommand {
    /// Rebuild the archive index and all conflict evidence for a game
    Reindex {
        /// Game id
        game: String,
    },
    /// List stored conflicts
    List {
        /// Game id
        game: String,
        /// archive_entry, script_override or tweak_key
        #[arg(long)]
        kind: Option<ConflictKind>,
        /// low, medium or high
        #[arg(long)]
        severity: Option<Severity>,
        /// Only conflicts involving this mod id
        #[arg(long = "mod")]
        mod_id: Option<i64>,
    },
    /// Per-archive wins and losses in resource hash collisions
    Archives {
        /// Game id
        game: String,
    },
}

impl ConflictsCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        match self {
            ConflictsCommand::Reindex { game } => self.execute_reindex(ctx, game, format).await,
            ConflictsCommand::List {
                game,
                kind,
                severity,
                mod_id,
            } => {
                let mut filter = EvidenceFilter::new();
                filter.kind = *kind;
                filter.severity = *severity;
                filter.mod_id = mod_id.map(ModId::new);
                self.execute_list(ctx, game, &filter, format).await
            }
            ConflictsCommand::Archives { game } => self.execute_archives(ctx, game, format).await,
        }
    }

    async fn execute_reindex(&self, ctx: &CliContext, game: &str, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let game = ctx.game(game)?;
        let services = match ctx.open_services(&*formatter).await? {
            Some(s) => s,
            None => return Ok(()),
        };

        let use_case = ReindexUseCase::new(
            Arc::new(services.indexer(&ctx.config)),
            Arc::new(services.engine(&ctx.config)),
        );
        let (sink, printer) = ctx.progress(format);
        let result = use_case.run(game, &sink).await;
        finish_progress(sink, printer).await;
        let summary = result.context("Reindex failed")?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&summary)?);
            return Ok(());
        }

        formatter.success(&format!(
            "Found {} in {} ms",
            plural(summary.conflicts_found, "conflict"),
            summary.duration_ms
        ));
        for (kind, count) in &summary.by_kind {
            formatter.info(&format!("{:<16} {}", kind.as_str(), count));
        }
        if summary.coverage < 1.0 {
            formatter.warn(&format!(
                "Detector coverage {:.0}%; results are incomplete",
                summary.coverage * 100.0
            ));
        }
        for outcome in summary
            .index
            .outcomes
            .iter()
            .chain(summary.detector_outcomes.iter())
        {
            if let UnitStatus::Failed { reason } = &outcome.status {
                formatter.warn(&format!("{}: {}", outcome.unit, reason));
            }
        }
        Ok(())
    }

    async fn execute_list(
        &self,
        ctx: &CliContext,
        game: &str,
        filter: &EvidenceFilter,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let game = ctx.game(game)?;
        let services = match ctx.open_services(&*formatter).await? {
            Some(s) => s,
            None => return Ok(()),
        };

        let views = services
            .evidence_query()
            .list_filtered(&game.id, filter)
            .await
            .context("Failed to query conflicts")?;
        info!(game = %game.id, count = views.len(), "Retrieved conflicts");

        if format.is_json() {
            let json = serde_json::json!({
                "game_id": game.id,
                "count": views.len(),
                "conflicts": views,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if views.is_empty() {
            formatter.success("No conflicts");
            return Ok(());
        }
        formatter.success(&plural(views.len(), "conflict"));
        formatter.info("");
        for view in &views {
            print_view(&*formatter, view);
        }
        Ok(())
    }

    async fn execute_archives(&self, ctx: &CliContext, game: &str, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let game = ctx.game(game)?;
        let services = match ctx.open_services(&*formatter).await? {
            Some(s) => s,
            None => return Ok(()),
        };

        let summaries = services
            .evidence_query()
            .archive_summary(game)
            .await
            .context("Failed to summarize archive conflicts")?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "game_id": game.id,
                "count": summaries.len(),
                "archives": summaries,
            }));
            return Ok(());
        }

        if summaries.is_empty() {
            formatter.success("No archive collisions");
            return Ok(());
        }
        let dead = summaries
            .iter()
            .filter(|s| s.impact == ArchiveImpact::Critical)
            .count();
        formatter.success(&plural(summaries.len(), "conflicting archive"));
        if dead > 0 {
            formatter.warn(&format!(
                "{} fully overridden and will have no effect",
                plural(dead, "archive")
            ));
        }
        formatter.info("");
        for summary in &summaries {
            print_archive(&*formatter, summary);
        }
        Ok(())
    }
}

fn impact_label(impact: ArchiveImpact) -> &'static str {
    match impact {
        ArchiveImpact::Critical => "CRITICAL",
        ArchiveImpact::High => "HIGH    ",
        ArchiveImpact::Moderate => "MODERATE",
        ArchiveImpact::Info => "info    ",
    }
}

fn print_archive(formatter: &dyn OutputFormatter, summary: &ArchiveConflictSummary) {
    let owner = summary
        .installed_mod_id
        .map_or_else(|| "unmanaged".to_string(), |id| format!("mod #{id}"));
    formatter.info(&format!(
        "{} {} ({}): loses {}/{}, wins {}",
        impact_label(summary.impact),
        summary.archive_filename,
        owner,
        summary.losing_entries,
        summary.total_entries,
        summary.winning_entries
    ));
    formatter.info(&format!(
        "         against: {}",
        summary.conflicting_archives.join(", ")
    ));
}

fn print_view(formatter: &dyn OutputFormatter, view: &EvidenceView) {
    formatter.info(&format!(
        "{} {:<16} {}",
        severity_label(view.severity),
        view.kind.as_str(),
        view.key
    ));
    let mods: Vec<String> = view
        .mods
        .iter()
        .map(|m| format!("{} (#{})", m.name, m.id))
        .collect();
    formatter.info(&format!("       mods:   {}", mods.join(", ")));
    if let Some(winner) = &view.winner {
        formatter.info(&format!("       winner: {}", winner.name));
    }
}
