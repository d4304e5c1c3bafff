//! Error types for credential storage and the refresh exchange

/// Errors from credential and token operations.
///
/// `Clone` because a single refresh outcome is handed to every caller
/// waiting on that exchange.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The session was ended while an exchange was in flight; its result
    /// is discarded.
    #[error("session ended by logout")]
    LoggedOut,
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
