//! Authenticated HTTP client for the learning platform API
//!
//! Every call goes out with the current access token. When the backend
//! answers 401, the client refreshes the credential pair once (no matter how
//! many calls failed at the same time) and replays each failed call with the
//! new token. If the refresh itself fails, the stored credentials are
//! cleared and every waiting call fails with the same error.
//!
//! Layout:
//! - [`interceptor`]: attach bearer tokens, classify responses
//! - [`coordinator`]: the single-flight refresh state machine
//! - [`client`]: `ApiClient`, tying the two together around `reqwest`

pub mod call;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod interceptor;
pub mod metrics;

pub use call::{ApiRequest, ApiResponse, CallContext};
pub use client::{ApiClient, ClientConfig};
pub use coordinator::RefreshCoordinator;
pub use error::{Error, Result};
pub use interceptor::Disposition;
pub use reqwest::{Method, StatusCode};
