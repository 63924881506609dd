//! Start command - launches the Tessera server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;

use tessera_auth::{AuthorizationEngine, OidcClient};
use tessera_pipeline::OrchestratorContext;
use tessera_server::{AppState, Server, ServerConfig};
use tessera_store::SqliteWorkflowStore;

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Address to bind to, e.g. 0.0.0.0:8000 (overrides config)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Disable per-request logging
    #[arg(long)]
    pub quiet_requests: bool,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    // ── Load configuration ──────────────────────────────────────────────

    let config = &ctx.loaded.config;
    config.validate().context("configuration is incomplete")?;

    if ctx.verbose {
        let sources = ctx.loaded.loaded_from();
        if sources.is_empty() {
            println!("No config files found, using defaults + CLI args");
        } else {
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
        }
    }

    // ── Identity provider ───────────────────────────────────────────────

    let oidc = config.oidc();
    let client = OidcClient::discover(&oidc.url, oidc.client_id, oidc.client_secret)
        .await
        .context("OIDC discovery failed")?;
    let auth = AuthorizationEngine::new(Arc::new(client), oidc.clock_skew_secs);

    // ── Workflow engine ─────────────────────────────────────────────────

    let database = config.database_path();
    let repo = SqliteWorkflowStore::open(&database)
        .with_context(|| format!("cannot open workflow database {}", database.display()))?;
    let workflows = OrchestratorContext::from_config(config, Arc::new(repo));

    tracing::info!(
        database = %database.display(),
        definitions = %config.workflow_definition_dir().display(),
        workflow_dir = %config.workflow_dir().display(),
        backend = %config.tes_url(),
        "Workflow engine ready"
    );

    // ── Server settings ─────────────────────────────────────────────────

    let mut server_config = ServerConfig::from_section(&config.server())?;
    if let Some(bind) = args.bind {
        server_config = server_config.with_bind_address(bind);
    }
    if args.quiet_requests {
        server_config = server_config.with_request_logging(false);
    }

    let server = Server::from_state(AppState::new(auth, workflows, server_config));
    println!("Tessera listening on http://{}", server.bind_address());
    server.run().await?;

    Ok(())
}
