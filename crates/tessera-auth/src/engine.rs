//! Authorization decisions for workflow definitions.

use std::sync::Arc;

use tessera_types::WorkflowDefinition;

use crate::entitlement::is_entitlement_satisfied;
use crate::error::{AuthError, Result};
use crate::provider::IdentityProvider;
use crate::token::AccessToken;
use crate::visa::CONTROLLED_ACCESS_GRANTS;

/// Evaluates whether a caller's credential grants access to a definition.
#[derive(Clone)]
pub struct AuthorizationEngine {
    provider: Arc<dyn IdentityProvider>,
    clock_skew_secs: i64,
}

impl AuthorizationEngine {
    pub fn new(provider: Arc<dyn IdentityProvider>, clock_skew_secs: i64) -> Self {
        Self {
            provider,
            clock_skew_secs,
        }
    }

    /// Wrap a raw bearer credential for one request.
    pub fn token(&self, raw: impl Into<String>) -> AccessToken {
        AccessToken::new(raw, Arc::clone(&self.provider))
    }

    /// Reject expired or inactive tokens.
    ///
    /// Expiry is checked locally first so a stale token never costs an
    /// introspection round-trip.
    pub async fn validate(&self, token: &AccessToken) -> Result<()> {
        if token.is_expired(self.clock_skew_secs) {
            return Err(AuthError::Expired);
        }
        match token.is_active().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::Invalid("token is not active".to_string())),
            Err(e) => Err(e),
        }
    }

    /// True iff the token carries a `ControlledAccessGrants` visa for this
    /// definition's id, or one of its entitlements satisfies the definition's rules.
    ///
    /// Identity-provider failures propagate; callers must treat them as "not authorized".
    pub async fn is_authorized_for_workflow(
        &self,
        token: &AccessToken,
        definition: &WorkflowDefinition,
    ) -> Result<bool> {
        let definition_id = definition.id.to_string();
        if token
            .has_visa(CONTROLLED_ACCESS_GRANTS, &definition_id)
            .await?
        {
            tracing::debug!(definition_id = %definition.id, "Authorized by visa");
            return Ok(true);
        }

        let entitlements = token.entitlements().await?;
        let satisfied = is_entitlement_satisfied(definition, entitlements);
        if satisfied {
            tracing::debug!(definition_id = %definition.id, "Authorized by entitlement");
        }
        Ok(satisfied)
    }
}
