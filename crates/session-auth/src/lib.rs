//! Session credentials for the learning platform API
//!
//! Holds the access/refresh credential pair, persists it, and performs the
//! refresh exchange against the backend. Nothing in here decides *when* to
//! refresh; that belongs to the `api-client` coordinator.
//!
//! Credential flow:
//! 1. The login flow (outside this workspace) hands a pair to a [`TokenStore`]
//! 2. Every outbound call reads the access token via [`TokenStore::get`]
//! 3. On a 401 the coordinator calls [`refresh_token`] with the refresh token
//! 4. The new pair replaces the old one via [`TokenStore::set`], or the
//!    store is wiped via [`TokenStore::clear`] if the exchange fails

pub mod claims;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use claims::{TokenClaims, decode_unverified};
pub use constants::*;
pub use credentials::{CredentialPair, FileTokenStore, MemoryTokenStore, TokenStore};
pub use error::{Error, Result};
pub use token::{RefreshRequest, TokenResponse, refresh_token};
