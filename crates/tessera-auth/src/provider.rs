//! Identity provider abstraction.
//!
//! ```text
//! IdentityProvider (trait)        - introspection + userinfo
//!     └── OidcClient              - OIDC discovery-backed HTTP implementation
//!     └── StaticIdentityProvider  - In-memory provider for testing
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Identity information returned by the userinfo endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    /// Raw visa JWTs.
    #[serde(default)]
    pub ga4gh_passport_v1: Vec<String>,
    #[serde(default)]
    pub eduperson_entitlement: Vec<String>,
}

/// Operations the authorization engine needs from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Whether the provider still considers `token` active.
    ///
    /// Non-success responses yield `IntrospectionUnavailable`.
    async fn introspect(&self, token: &str) -> Result<bool>;

    /// Identity information for the bearer of `token`.
    async fn userinfo(&self, token: &str) -> Result<UserInfo>;
}

/// In-memory identity provider keyed by raw token value.
///
/// Tokens that were never registered introspect as inactive and have no
/// userinfo.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    users: Mutex<HashMap<String, (bool, UserInfo)>>,
    unreachable: Mutex<bool>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` with its activity flag and identity.
    pub fn insert(&self, token: impl Into<String>, active: bool, info: UserInfo) {
        self.users.lock().insert(token.into(), (active, info));
    }

    /// Make every call fail as if the provider were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock() = unreachable;
    }

    fn check_reachable(&self) -> Result<()> {
        if *self.unreachable.lock() {
            return Err(AuthError::UpstreamUnavailable(
                "identity provider unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn introspect(&self, token: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self
            .users
            .lock()
            .get(token)
            .map(|(active, _)| *active)
            .unwrap_or(false))
    }

    async fn userinfo(&self, token: &str) -> Result<UserInfo> {
        self.check_reachable()?;
        self.users
            .lock()
            .get(token)
            .map(|(_, info)| info.clone())
            .ok_or_else(|| AuthError::Invalid("unknown token".to_string()))
    }
}
