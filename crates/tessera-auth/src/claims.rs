//! Unverified JWT payload decoding.
//!
//! Tokens reach us over a trusted channel (the reverse proxy or the identity
//! provider's userinfo response) and validity is established through
//! introspection, so only the claim set is read here.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Why a payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    NotAJwt,
    Base64(String),
    Json(String),
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAJwt => f.write_str("expected three dot-separated segments"),
            Self::Base64(e) => write!(f, "payload is not base64url: {e}"),
            Self::Json(e) => write!(f, "payload is not a JSON claim set: {e}"),
        }
    }
}

/// Decode the payload segment of a compact JWT into `T`.
pub fn decode_payload<T: DeserializeOwned>(token: &str) -> Result<T, PayloadError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(PayloadError::NotAJwt);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| PayloadError::Base64(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| PayloadError::Json(e.to_string()))
}

/// Registered claims read from a bearer access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
}

#[cfg(test)]
pub(crate) fn encode_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_registered_claims() {
        let token = encode_jwt(&json!({"sub": "alice@example.org", "exp": 1_900_000_000}));
        let claims: TokenClaims = decode_payload(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("alice@example.org"));
        assert_eq!(claims.exp, Some(1_900_000_000));
    }

    #[test]
    fn test_rejects_wrong_segment_count() {
        assert_eq!(
            decode_payload::<TokenClaims>("abc.def").unwrap_err(),
            PayloadError::NotAJwt
        );
        assert_eq!(
            decode_payload::<TokenClaims>("a.b.c.d").unwrap_err(),
            PayloadError::NotAJwt
        );
    }

    #[test]
    fn test_rejects_non_json_payload() {
        let token = format!("x.{}.y", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(
            decode_payload::<TokenClaims>(&token),
            Err(PayloadError::Json(_))
        ));
    }

    #[test]
    fn test_tolerates_padded_payload() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":5}"#);
        let token = format!("h.{payload}.s");
        let claims: TokenClaims = decode_payload(&token).unwrap();
        assert_eq!(claims.exp, Some(5));
    }
}
