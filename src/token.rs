//! Session token decoding and expiry checks.
//!
//! The backend issues JWT-shaped bearer credentials. The client decodes the
//! payload claims to check expiry but never verifies the signature; that is
//! the server's responsibility.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Claims carried in the payload segment of a session token.
///
/// Only `exp` is required; everything else the backend includes is optional
/// display data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Expiration time (Unix timestamp, seconds)
    pub exp: u64,
    /// Subject user id
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Subject email
    #[serde(default)]
    pub email: Option<String>,
    /// Role name as issued by the backend
    #[serde(default)]
    pub role_type: Option<String>,
    /// Not valid before (Unix timestamp, seconds)
    #[serde(default)]
    pub nbf: Option<u64>,
    /// Issued at (Unix timestamp, seconds)
    #[serde(default)]
    pub iat: Option<u64>,
    /// Token id
    #[serde(default)]
    pub jti: Option<String>,
}

/// Decode the claims of a JWT-shaped token without verifying the signature.
///
/// Returns `None` for anything that is not three dot-separated segments with
/// a base64url JSON payload carrying an `exp` claim.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return None,
    };

    // Some issuers pad their base64url; the engine rejects padding, so strip it.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// A token is valid only while the wall clock is before its `exp` claim.
/// Anything that fails to decode counts as expired.
pub fn is_valid(token: &str) -> bool {
    match decode_claims(token) {
        Some(claims) => now_millis() < claims.exp.saturating_mul(1000),
        None => false,
    }
}

/// True when the string has the three dot-separated segments of a JWT.
pub fn looks_like_jwt(token: &str) -> bool {
    token.split('.').count() == 3
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
