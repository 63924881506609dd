//! Application state shared across handlers.

use std::sync::Arc;

use tessera_auth::AuthorizationEngine;
use tessera_pipeline::OrchestratorContext;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Token validation and per-definition authorization.
    pub auth: AuthorizationEngine,

    /// Workflow lifecycle collaborators.
    pub workflows: Arc<OrchestratorContext>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(auth: AuthorizationEngine, workflows: OrchestratorContext, config: ServerConfig) -> Self {
        Self {
            auth,
            workflows: Arc::new(workflows),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
