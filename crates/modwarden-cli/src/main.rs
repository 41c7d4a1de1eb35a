//! ModWarden CLI - Command-line interface for ModWarden
//!
//! Provides commands for:
//! - Indexing archive contents per game
//! - Rebuilding and listing conflict evidence
//! - Managing load-order preferences and the modlist artifact
//! - Viewing and validating configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, conflicts::ConflictsCommand,
    index::IndexCommand, modlist::ModlistCommand, prefer::PreferCommand, stats::StatsCommand,
    CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "modwarden", version, about = "Mod conflict detection and load-order management")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index archive entries for a game
    Index(IndexCommand),
    /// Rebuild and list conflicts
    #[command(subcommand)]
    Conflicts(ConflictsCommand),
    /// Manage load-order preferences
    #[command(subcommand)]
    Prefer(PreferCommand),
    /// Regenerate modlist.txt
    Modlist(ModlistCommand),
    /// Show index and conflict totals
    Stats(StatsCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Level used when `RUST_LOG` is unset
fn filter_directive(verbose: u8, quiet: bool, configured: &str) -> String {
    match (quiet, verbose) {
        (true, _) => "warn".to_string(),
        (false, 0) => configured.to_string(),
        (false, 1) => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = CliContext::load(cli.config.as_deref(), cli.quiet);

    let filter = filter_directive(cli.verbose, cli.quiet, &ctx.config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if ctx.config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Index(cmd) => cmd.execute(&ctx, format).await,
        Commands::Conflicts(cmd) => cmd.execute(&ctx, format).await,
        Commands::Prefer(cmd) => cmd.execute(&ctx, format).await,
        Commands::Modlist(cmd) => cmd.execute(&ctx, format).await,
        Commands::Stats(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}
