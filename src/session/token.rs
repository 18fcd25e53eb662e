//! Expiry decoding for the backend's JWT access tokens.
//!
//! Only the `exp` claim is read; signatures are the backend's business.
//! Anything undecodable is reported as expired so a bad token can never
//! keep a session alive.

use crate::error::DecodeError;
use base64::{engine::general_purpose, Engine};
use chrono::Utc;
use tracing::debug;

/// Extracts the `exp` claim (seconds since epoch) from a JWT.
pub fn decode_expiry(token: &str) -> Result<i64, DecodeError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => return Err(DecodeError::Malformed),
    };

    let raw = general_purpose::URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    let claims: serde_json::Value = serde_json::from_slice(&raw)?;

    claims
        .get("exp")
        .and_then(serde_json::Value::as_i64)
        .ok_or(DecodeError::MissingExpiry)
}

/// True when the token is expired or cannot be decoded at all.
pub fn is_expired(token: &str) -> bool {
    expired_at(token, Utc::now().timestamp())
}

/// Expiry check against an explicit clock reading, for deterministic tests.
pub fn expired_at(token: &str, now: i64) -> bool {
    match decode_expiry(token) {
        Ok(exp) => now >= exp,
        Err(e) => {
            debug!("Treating undecodable token as expired: {}", e);
            true
        }
    }
}

#[cfg(test)]
pub(crate) fn make_token(exp: serde_json::Value) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload =
        general_purpose::URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
    format!("{header}.{payload}.sig")
}
