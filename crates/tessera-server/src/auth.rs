//! Caller identification middleware.
//!
//! The server sits behind an authenticating reverse proxy that forwards the
//! caller's name and access token as headers. Two middleware layers run in
//! order on every API request:
//!
//! 1. [`require_user`]: the username header must be present.
//! 2. [`require_token`]: the access token must be present, unexpired and
//!    active according to the identity provider.
//!
//! Handlers read the resulting [`Caller`] from request extensions.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tessera_auth::AccessToken;

use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Header carrying the caller's preferred username.
pub const USERNAME_HEADER: &str = "X-Forwarded-Preferred-Username";

/// Header carrying the caller's OIDC access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Forwarded-Access-Token";

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Username forwarded by the proxy, before the token is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedUser {
    pub username: String,
}

/// Fully authenticated caller.
#[derive(Clone)]
pub struct Caller {
    pub username: String,
    pub token: Arc<AccessToken>,
}

impl Caller {
    /// Token subject, falling back to the username for opaque tokens.
    pub fn subject(&self) -> &str {
        self.token.subject().unwrap_or(&self.username)
    }
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn header_value(request: &Request<Body>, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Reject requests without a forwarded username.
pub async fn require_user(mut request: Request<Body>, next: Next) -> Result<Response, ServerError> {
    let username = header_value(&request, USERNAME_HEADER)
        .ok_or_else(|| ServerError::Unauthorized(format!("missing {USERNAME_HEADER} header")))?;

    request.extensions_mut().insert(ForwardedUser { username });
    Ok(next.run(request).await)
}

/// Reject requests whose access token is missing, expired or inactive.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let user = request
        .extensions()
        .get::<ForwardedUser>()
        .cloned()
        .ok_or_else(|| ServerError::Unauthorized("caller identity missing".to_string()))?;

    let raw = header_value(&request, ACCESS_TOKEN_HEADER).ok_or_else(|| {
        ServerError::Unauthorized(format!("missing {ACCESS_TOKEN_HEADER} header"))
    })?;

    let token = state.auth.token(raw);
    if let Err(e) = state.auth.validate(&token).await {
        tracing::warn!(username = %user.username, error = %e, "Rejected access token");
        return Err(ServerError::Unauthorized(e.to_string()));
    }

    request.extensions_mut().insert(Caller {
        username: user.username,
        token: Arc::new(token),
    });
    Ok(next.run(request).await)
}
