//! Error types for API calls

/// Errors surfaced to callers of `ApiClient`.
///
/// Only `Unauthorized` and `RefreshFailed` are produced by the refresh
/// path. Transport failures and non-401 statuses are never rewritten.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    /// A 401 that the refresh path could not or would not fix: no refresh
    /// credential was stored, or the replayed call was rejected again.
    #[error("unauthorized ({path}): {body}")]
    Unauthorized { path: String, body: String },

    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] session_auth::Error),

    #[error("credential store error: {0}")]
    Credential(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response decode error: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_failure_keeps_its_source() {
        use std::error::Error as _;

        let err = Error::RefreshFailed(session_auth::Error::InvalidCredentials(
            "refresh token rejected (401 Unauthorized)".into(),
        ));
        assert!(err.to_string().starts_with("token refresh failed:"));
        let source = err.source().expect("source must be preserved");
        assert!(source.to_string().contains("refresh token rejected"));
    }

    #[test]
    fn unauthorized_names_the_path() {
        let err = Error::Unauthorized {
            path: "/users/profile".into(),
            body: r#"{"detail":"Could not validate credentials"}"#.into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/users/profile"), "got: {msg}");
        assert!(msg.contains("Could not validate credentials"), "got: {msg}");
    }
}
