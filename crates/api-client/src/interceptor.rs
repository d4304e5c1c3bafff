//! Request and response interceptors
//!
//! Both sides are synchronous and side-effect free apart from header
//! mutation: the request side only reads the token store, and the response
//! side only classifies a status. The client loop acts on the verdict.

use common::Secret;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use session_auth::TokenStore;
use tracing::{debug, warn};

use crate::call::CallContext;

/// Attach the stored access token, if any, as a bearer credential.
///
/// Returns the access token that was attached. Never refreshes, never
/// touches the network.
pub fn authorize(headers: &mut HeaderMap, store: &dyn TokenStore) -> Option<Secret<String>> {
    let Some(pair) = store.get() else {
        debug!("no access token stored, sending without credentials");
        return None;
    };
    attach_bearer(headers, pair.access()).then(|| pair.access_secret().clone())
}

/// Set `Authorization: Bearer <access>`, replacing any existing value.
pub fn attach_bearer(headers: &mut HeaderMap, access: &str) -> bool {
    match HeaderValue::from_str(&format!("Bearer {access}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
            true
        }
        Err(e) => {
            warn!(error = %e, "access token is not a valid header value, sending without it");
            false
        }
    }
}

/// What the client does with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the response to the caller unchanged.
    Deliver,
    /// 401 on an eligible call: go through the refresh coordinator, then replay.
    Refresh,
    /// 401 on a call that already had its one replay.
    Reject,
}

/// Classify a response status for the given call.
pub fn inspect(call: &CallContext, status: StatusCode) -> Disposition {
    if status != StatusCode::UNAUTHORIZED {
        return Disposition::Deliver;
    }
    if call.targets_refresh_endpoint() {
        // The exchange reports its own failure; it never re-enters the refresh path
        return Disposition::Deliver;
    }
    if call.is_retried() {
        return Disposition::Reject;
    }
    Disposition::Refresh
}
