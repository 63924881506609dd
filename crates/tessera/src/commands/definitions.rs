//! Definitions command - lists workflow definitions on disk.

use anyhow::Result;
use clap::Args;

use tessera_pipeline::{DefinitionResolver, DirectoryDefinitionResolver};

use super::Context;

/// Arguments for the definitions command.
#[derive(Args, Debug)]
pub struct DefinitionsArgs {
    /// Print each definition's entry file source
    #[arg(long)]
    pub source: bool,
}

/// Run the definitions command.
pub async fn run(args: DefinitionsArgs, ctx: &Context) -> Result<()> {
    let dir = ctx.loaded.config.workflow_definition_dir();
    let resolver = DirectoryDefinitionResolver::new(&dir);

    if ctx.json_output {
        let items = resolver.list_items()?;
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let definitions = resolver.definitions()?;
    if definitions.is_empty() {
        println!("No workflow definitions in {}", dir.display());
        return Ok(());
    }

    for def in &definitions {
        let access = if def.allowed_entitlements.is_empty() {
            "visa only".to_string()
        } else {
            format!("{} entitlement rule(s)", def.allowed_entitlements.len())
        };
        println!("{}  {:<24} {}", def.id, def.name, access);

        if ctx.verbose {
            for (key, pattern) in &def.input_mapping {
                println!("    {key} = {pattern}");
            }
        }
        if args.source {
            match std::fs::read_to_string(def.entry_path()) {
                Ok(source) => println!("{source}"),
                Err(e) => eprintln!("warning: cannot read {}: {}", def.entry_path().display(), e),
            }
        }
    }

    Ok(())
}
