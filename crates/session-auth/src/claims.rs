//! Unverified access-token claims
//!
//! The backend issues HS256 JWTs whose payload is
//! `{"sub": <user id>, "exp": <unix seconds, float>, "type": "access"|"refresh"}`.
//! The client cannot verify the signature (it does not hold the key) and
//! does not need to: the claims are only used for display, e.g. showing who
//! is logged in and when the access token lapses.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    /// Expiry as unix seconds. The backend emits a float timestamp.
    pub exp: f64,
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,
}

impl TokenClaims {
    pub fn is_expired_at(&self, unix_secs: u64) -> bool {
        self.exp <= unix_secs as f64
    }
}

/// Decode a JWT payload without checking its signature.
pub fn decode_unverified(token: &str) -> Result<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(Error::InvalidToken(
                "expected three dot-separated segments".into(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::InvalidToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::InvalidToken(format!("payload is not valid claims: {e}")))
}
