//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Check that every field needed to serve requests is set
    Validate,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Validate => cmd_validate(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("# Tessera Configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Paths:");
    println!("  logs:        {}", config.log_dir().display());
    println!("  database:    {}", config.database_path().display());
    println!("  runs:        {}", config.workflow_dir().display());
    println!("  definitions: {}", config.workflow_definition_dir().display());
    println!();

    let pipeline = config.pipeline();
    println!("Pipeline:");
    println!("  binary:   {}", pipeline.binary);
    println!("  executor: {}", pipeline.executor);
    println!("  jobs:     {}", pipeline.jobs);
    println!("  slots:    {}", pipeline.max_concurrent_runs);
    println!();

    println!("Backend: {}", config.tes_url());
    for entry in &config.datasets {
        println!("  {} <- {}", entry.execution_url, entry.datasets.join(", "));
    }
    println!();

    if !ctx.loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &ctx.loaded.warnings {
            println!("  ! {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        if let Ok(toml_str) = config.to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");

    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    Ok(())
}

fn cmd_validate(ctx: &Context) -> Result<()> {
    ctx.loaded.config.validate()?;
    println!("Configuration is complete");
    Ok(())
}
