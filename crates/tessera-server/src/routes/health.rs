//! Liveness and readiness checks. Neither requires caller credentials.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tessera_store::WorkflowFilter;
use uuid::Uuid;

use crate::state::AppState;

/// Liveness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness response; `store` and `definitions` hold "ok" or the failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub store: String,
    pub definitions: String,
}

/// GET /health - The process is up.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /health/ready - The workflow store answers and definitions are readable.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let store = match state
        .workflows
        .repository()
        .get_one(&WorkflowFilter::by_id(Uuid::nil()))
    {
        Ok(_) => "ok".to_string(),
        Err(e) => e.to_string(),
    };
    let definitions = match state.workflows.list_definitions() {
        Ok(_) => "ok".to_string(),
        Err(e) => e.to_string(),
    };

    let ready = store == "ok" && definitions == "ok";
    if !ready {
        tracing::warn!(%store, %definitions, "Readiness check failed");
    }
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready,
            store,
            definitions,
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}
