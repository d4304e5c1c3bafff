//! Refresh exchange
//!
//! `POST {base}/auth/refresh` with `{"refresh_token": ...}`. A success body
//! carries a complete new pair; anything else is a failed exchange. The
//! caller supplies the `reqwest::Client`, so the exchange runs under the
//! same default timeout as every other call.

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

/// Body sent to the refresh endpoint.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "bearer" from the current backend; not relied on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn into_pair(self) -> CredentialPair {
        CredentialPair::new(self.access_token, self.refresh_token)
    }
}

/// Exchange a refresh token for a new credential pair.
///
/// A 401/403 from the endpoint means the refresh token itself is expired or
/// revoked and maps to `InvalidCredentials`; other failures are
/// `TokenExchange` (bad status or body) or `Http` (transport).
pub async fn refresh_token(
    client: &reqwest::Client,
    refresh_url: &str,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(refresh_url)
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}
