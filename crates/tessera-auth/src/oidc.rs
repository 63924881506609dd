//! OIDC discovery, token introspection and userinfo over HTTP.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::provider::{IdentityProvider, UserInfo};

/// Path of the discovery document relative to the issuer URL.
const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Endpoints taken from the provider's discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OidcEndpoints {
    pub introspection_endpoint: String,
    pub userinfo_endpoint: String,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: bool,
}

/// HTTP client for a single OIDC provider.
#[derive(Debug, Clone)]
pub struct OidcClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    endpoints: OidcEndpoints,
}

impl OidcClient {
    /// Build a client from already-known endpoints.
    pub fn new(
        endpoints: OidcEndpoints,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            endpoints,
        }
    }

    /// Fetch `{issuer_url}/.well-known/openid-configuration` and build a client.
    pub async fn discover(
        issuer_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let url = format!("{}{}", issuer_url.trim_end_matches('/'), DISCOVERY_PATH);
        let http = reqwest::Client::new();
        let response = http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Discovery(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Discovery(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        let endpoints: OidcEndpoints = response
            .json()
            .await
            .map_err(|e| AuthError::Discovery(format!("invalid discovery document: {e}")))?;

        tracing::info!(
            introspection = %endpoints.introspection_endpoint,
            userinfo = %endpoints.userinfo_endpoint,
            "OIDC endpoints discovered"
        );

        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &OidcEndpoints {
        &self.endpoints
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    async fn introspect(&self, token: &str) -> Result<bool> {
        let response = self
            .http
            .post(&self.endpoints.introspection_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("token", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::IntrospectionUnavailable(format!(
                "status {status}: {body}"
            )));
        }

        let info: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(format!("bad introspection body: {e}")))?;
        Ok(info.active)
    }

    async fn userinfo(&self, token: &str) -> Result<UserInfo> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_endpoint)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::Invalid("userinfo rejected the token".to_string()));
        }
        if !status.is_success() {
            return Err(AuthError::UpstreamUnavailable(format!(
                "userinfo returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(format!("bad userinfo body: {e}")))
    }
}
