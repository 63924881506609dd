//! Tessera - workflow execution service for federated genomics pipelines
//!
//! Main entry point for the Tessera CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, definitions, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Tessera - workflow execution service for federated genomics pipelines
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file merged over the discovered layers
    #[arg(long, global = true, env = "TESSERA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Tessera server
    Start(start::StartArgs),

    /// List workflow definitions available to run
    Definitions(definitions::DefinitionsArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = tessera_config::load_config_with_options(None, None, cli.config.as_deref())?;

    // Console (human-readable) + daily-rolling JSON file
    let filter = if cli.verbose {
        "tessera=debug,tessera_server=debug,tessera_pipeline=debug,tessera_auth=debug,tessera_store=debug,tessera_config=debug,info"
    } else {
        "tessera=info,tessera_server=info,tessera_pipeline=info,tessera_auth=info,warn"
    };

    let log_dir = loaded.config.log_dir();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tessera.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "tessera=trace,tessera_server=trace,tessera_pipeline=trace,tessera_auth=trace,tessera_store=trace,tessera_config=trace,info",
                )),
        )
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        loaded,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Definitions(args) => definitions::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
