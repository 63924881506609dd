//! Error types for the authorization engine.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while checking a caller's credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The access token's expiry has passed (or cannot be read).
    #[error("Access token expired")]
    Expired,

    /// The access token is not active according to introspection.
    #[error("Access token invalid: {0}")]
    Invalid(String),

    /// A visa assertion is missing required claims or is not a JWT.
    #[error("Malformed access grant: {0}")]
    MalformedGrant(String),

    /// The introspection endpoint answered with a non-success status.
    #[error("Introspection unavailable: {0}")]
    IntrospectionUnavailable(String),

    /// Network or protocol failure talking to the identity provider.
    #[error("Identity provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An entitlement rule does not compile to a valid pattern.
    #[error("Invalid entitlement rule '{pattern}': {reason}")]
    InvalidEntitlementRule { pattern: String, reason: String },

    /// OIDC discovery document could not be used.
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::UpstreamUnavailable(e.to_string())
    }
}
