//! Request logging middleware.
//!
//! Emits one event per API request after the response is produced. The
//! forwarded username is attached when the proxy supplied one, so rejected
//! requests can still be traced to a caller. Health checks are not logged.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::USERNAME_HEADER;
use crate::state::AppState;

pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging || request.uri().path().starts_with("/health") {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let username = request
        .headers()
        .get(USERNAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;
    match status {
        500.. => tracing::error!(%method, %path, %username, status, duration_ms, "Request failed"),
        400..=499 => tracing::warn!(%method, %path, %username, status, duration_ms, "Request rejected"),
        _ => tracing::info!(%method, %path, %username, status, duration_ms, "Request completed"),
    }

    response
}
