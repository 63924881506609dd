//! GA4GH passport visas.

use serde::Deserialize;

use crate::claims::decode_payload;
use crate::error::{AuthError, Result};

/// Visa type granting access to a specific workflow definition.
pub const CONTROLLED_ACCESS_GRANTS: &str = "ControlledAccessGrants";

/// A dataset-level access grant carried by a visa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub grant_type: String,
    pub value: String,
    pub asserted_at: Option<i64>,
    pub source: String,
    pub issued_by: String,
}

#[derive(Deserialize)]
struct VisaClaims {
    ga4gh_visa_v1: Option<RawVisa>,
}

#[derive(Deserialize)]
struct RawVisa {
    #[serde(rename = "type")]
    grant_type: Option<String>,
    value: Option<String>,
    asserted: Option<serde_json::Value>,
    source: Option<String>,
    by: Option<String>,
}

/// Parse a visa assertion without verifying its signature.
pub fn decode_visa(raw: &str) -> Result<AccessGrant> {
    let claims: VisaClaims =
        decode_payload(raw).map_err(|e| AuthError::MalformedGrant(e.to_string()))?;
    let visa = claims
        .ga4gh_visa_v1
        .ok_or_else(|| AuthError::MalformedGrant("missing ga4gh_visa_v1 claim".to_string()))?;

    Ok(AccessGrant {
        grant_type: required(visa.grant_type, "type")?,
        value: required(visa.value, "value")?,
        asserted_at: visa.asserted.as_ref().and_then(parse_timestamp),
        source: required(visa.source, "source")?,
        issued_by: required(visa.by, "by")?,
    })
}

fn required(field: Option<String>, name: &str) -> Result<String> {
    field.ok_or_else(|| AuthError::MalformedGrant(format!("visa is missing '{name}'")))
}

// Issuers send `asserted` both as a number and as a numeric string.
fn parse_timestamp(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
