use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::models::{Credential, IdentityClaims};

#[derive(Debug, Default, Deserialize)]
struct Payload {
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
    exp: Option<i64>,
}

/// Reads the payload segment without verifying the signature. The token is
/// only forwarded to our own backend, which verifies it.
fn decode_payload(jwt: &str) -> Payload {
    let Some(segment) = jwt.split('.').nth(1) else {
        return Payload::default();
    };
    let segment = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(segment)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

pub fn decode_claims(jwt: &str) -> (IdentityClaims, Option<i64>) {
    let payload = decode_payload(jwt);
    let claims = IdentityClaims {
        sub: payload.sub,
        email: payload.email,
        name: payload.name,
        picture: payload.picture,
    };
    (claims, payload.exp)
}

/// Builds an identity credential; without `exp` it expires `fallback_secs` from now.
pub fn identity_credential(jwt: String, fallback_secs: i64) -> Credential {
    let (claims, exp) = decode_claims(&jwt);
    let expires_at = match exp {
        Some(exp) => exp.saturating_mul(1000),
        None => chrono::Utc::now()
            .timestamp_millis()
            .saturating_add(fallback_secs.saturating_mul(1000)),
    };
    Credential::identity(jwt, expires_at, claims)
}

#[cfg(test)]
pub(crate) fn encode_test_jwt(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{}.{}.sig", header, body)
}
