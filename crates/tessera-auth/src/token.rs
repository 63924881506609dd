//! Per-request bearer credential.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::claims::{TokenClaims, decode_payload};
use crate::error::Result;
use crate::provider::{IdentityProvider, UserInfo};
use crate::visa::{AccessGrant, decode_visa};

/// A raw bearer credential plus lazily fetched claims and identity info.
///
/// Owned by the request that created it. Userinfo is fetched at most once
/// per token; a failed fetch is not cached.
pub struct AccessToken {
    raw: String,
    provider: Arc<dyn IdentityProvider>,
    claims: std::sync::OnceLock<Option<TokenClaims>>,
    userinfo: OnceCell<UserInfo>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("claims", &self.claims())
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    pub fn new(raw: impl Into<String>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            raw: raw.into(),
            provider,
            claims: std::sync::OnceLock::new(),
            userinfo: OnceCell::new(),
        }
    }

    /// The raw credential, for forwarding to downstream services.
    pub fn value(&self) -> &str {
        &self.raw
    }

    /// Decoded claims, or `None` if the token is not a readable JWT.
    pub fn claims(&self) -> Option<&TokenClaims> {
        self.claims
            .get_or_init(|| decode_payload(&self.raw).ok())
            .as_ref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims().and_then(|c| c.sub.as_deref())
    }

    /// True if `exp` is absent/unparseable or `exp - allowance_secs < now`.
    pub fn is_expired(&self, allowance_secs: i64) -> bool {
        self.is_expired_at(allowance_secs, chrono::Utc::now().timestamp())
    }

    pub(crate) fn is_expired_at(&self, allowance_secs: i64, now: i64) -> bool {
        match self.claims().and_then(|c| c.exp) {
            Some(exp) => exp - allowance_secs < now,
            None => true,
        }
    }

    /// Introspect the token with the identity provider.
    pub async fn is_active(&self) -> Result<bool> {
        self.provider.introspect(&self.raw).await
    }

    /// Identity info, fetched on first use.
    pub async fn userinfo(&self) -> Result<&UserInfo> {
        self.userinfo
            .get_or_try_init(|| self.provider.userinfo(&self.raw))
            .await
    }

    pub async fn entitlements(&self) -> Result<&[String]> {
        Ok(&self.userinfo().await?.eduperson_entitlement)
    }

    /// Decoded visas. Malformed ones are logged and skipped.
    pub async fn visas(&self) -> Result<Vec<AccessGrant>> {
        let info = self.userinfo().await?;
        Ok(info
            .ga4gh_passport_v1
            .iter()
            .filter_map(|raw| match decode_visa(raw) {
                Ok(grant) => Some(grant),
                Err(e) => {
                    tracing::warn!(sub = %info.sub, error = %e, "Ignoring malformed visa");
                    None
                }
            })
            .collect())
    }

    pub async fn has_visa(&self, grant_type: &str, value: &str) -> Result<bool> {
        Ok(self
            .visas()
            .await?
            .iter()
            .any(|v| v.grant_type == grant_type && v.value == value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::encode_jwt;
    use crate::provider::StaticIdentityProvider;
    use serde_json::json;

    fn token_with(claims: serde_json::Value, provider: Arc<StaticIdentityProvider>) -> AccessToken {
        AccessToken::new(encode_jwt(&claims), provider)
    }

    #[test]
    fn test_expiry_with_allowance() {
        let provider = Arc::new(StaticIdentityProvider::new());
        let token = token_with(json!({"exp": 1000}), provider);
        assert!(!token.is_expired_at(0, 999));
        assert!(!token.is_expired_at(0, 1000));
        assert!(token.is_expired_at(0, 1001));
        // allowance pulls expiry earlier
        assert!(token.is_expired_at(10, 995));
    }

    #[test]
    fn test_missing_exp_is_expired() {
        let provider = Arc::new(StaticIdentityProvider::new());
        let token = token_with(json!({"sub": "alice"}), provider.clone());
        assert!(token.is_expired(0));
        let opaque = AccessToken::new("opaque-token", provider);
        assert!(opaque.is_expired(0));
        assert!(opaque.subject().is_none());
    }

    #[tokio::test]
    async fn test_malformed_visa_skipped() {
        let provider = Arc::new(StaticIdentityProvider::new());
        let good = encode_jwt(&json!({"ga4gh_visa_v1": {
            "type": "ControlledAccessGrants", "value": "x", "source": "s", "by": "b"
        }}));
        provider.insert(
            "tok",
            true,
            UserInfo {
                sub: "alice".to_string(),
                ga4gh_passport_v1: vec!["garbage".to_string(), good],
                eduperson_entitlement: vec![],
            },
        );
        let token = AccessToken::new("tok", provider);
        let visas = token.visas().await.unwrap();
        assert_eq!(visas.len(), 1);
        assert!(token.has_visa("ControlledAccessGrants", "x").await.unwrap());
        assert!(!token.has_visa("ControlledAccessGrants", "y").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_active_delegates() {
        let provider = Arc::new(StaticIdentityProvider::new());
        provider.insert("live", true, UserInfo::default());
        provider.insert("dead", false, UserInfo::default());
        assert!(AccessToken::new("live", provider.clone()).is_active().await.unwrap());
        assert!(!AccessToken::new("dead", provider).is_active().await.unwrap());
    }
}
