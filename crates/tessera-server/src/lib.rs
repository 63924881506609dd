//! HTTP API for the Tessera workflow engine.
//!
//! Exposes run, list, detail and cancel operations on workflows plus the
//! catalogue of workflow definitions. Caller identity comes from headers set
//! by an authenticating reverse proxy; see [`auth`].
//!
//! # Routes
//!
//! ```text
//! GET    /health                    liveness
//! GET    /health/ready              store + definitions readable
//! POST   /api/run                   start a run        → {workflow_id}
//! GET    /api/workflow              caller's workflows
//! GET    /api/workflow/{id}         detail + sub-jobs
//! DELETE /api/workflow/{id}         cancel
//! GET    /api/workflow_definition   definitions
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use auth::{ACCESS_TOKEN_HEADER, Caller, USERNAME_HEADER, require_token, require_user};
pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use routes::{RunRequest, RunResponse};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Tessera HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .nest("/api", self.api_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// API routes. Every route requires a forwarded username and a valid token.
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route("/run", post(routes::run_handler))
            .route("/workflow", get(routes::list_workflows_handler))
            .route(
                "/workflow/{id}",
                get(routes::get_workflow_handler).delete(routes::cancel_workflow_handler),
            )
            .route("/workflow_definition", get(routes::list_definitions_handler))
            // Token check (inner layer, runs second)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::require_token,
            ))
            // Username check (outer layer, runs first)
            .layer(middleware::from_fn(auth::require_user))
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address.
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
