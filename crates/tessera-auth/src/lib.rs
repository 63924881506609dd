//! Authorization engine for Tessera.
//!
//! Decides whether a caller may launch a workflow definition. Access is
//! granted by either a GA4GH `ControlledAccessGrants` visa naming the
//! definition, or an `eduperson_entitlement` matching one of the
//! definition's entitlement rules.
//!
//! # Components
//!
//! - [`entitlement`]: rule-to-pattern compilation and matching
//! - [`visa`]: unverified visa decoding
//! - [`token`]: per-request credential with lazy claims and userinfo
//! - [`oidc`]: discovery, introspection and userinfo over HTTP
//! - [`engine`]: the authorization decision itself

mod claims;
pub mod engine;
pub mod entitlement;
pub mod error;
pub mod oidc;
pub mod provider;
pub mod token;
pub mod visa;

pub use claims::TokenClaims;
pub use engine::AuthorizationEngine;
pub use entitlement::{
    EntitlementPattern, build_entitlement_pattern, is_entitlement_satisfied, render_pattern,
};
pub use error::{AuthError, Result};
pub use oidc::{OidcClient, OidcEndpoints};
pub use provider::{IdentityProvider, StaticIdentityProvider, UserInfo};
pub use token::AccessToken;
pub use visa::{AccessGrant, CONTROLLED_ACCESS_GRANTS, decode_visa};
