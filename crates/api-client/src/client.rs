//! Authenticated API client
//!
//! `ApiClient::send` is the only way calls leave the process. Each send:
//!
//! 1. attaches the stored access token (request interceptor)
//! 2. issues the call
//! 3. classifies the response (response interceptor)
//! 4. on an eligible 401, waits on the refresh coordinator and replays the
//!    call once with the new access token
//!
//! Non-401 responses, including 4xx/5xx, come back as `Ok(ApiResponse)`.
//! Paths are always resolved against the base URL; absolute URLs are
//! refused so the access token never leaves the API origin.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use session_auth::TokenStore;
use tracing::{Instrument, debug, info_span, warn};

use crate::call::{ApiRequest, ApiResponse, CallContext};
use crate::coordinator::RefreshCoordinator;
use crate::error::{Error, Result};
use crate::interceptor::{self, Disposition};
use crate::metrics;

/// Connection settings for one client instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base, e.g. `http://localhost:8001/api`
    pub base_url: String,
    /// Ambient timeout for every call, the refresh exchange included
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: session_auth::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Cloning shares the HTTP pool, the token store and the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| Error::Transport(format!("building HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            http.clone(),
            session_auth::refresh_url(&base_url),
        );

        Ok(Self {
            http,
            base_url,
            store,
            coordinator,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Drop both credentials. An exchange still in flight is discarded
    /// rather than logging the session back in.
    pub async fn logout(&self) -> Result<()> {
        self.coordinator
            .logout()
            .await
            .map_err(|e| Error::Credential(e.to_string()))
    }

    /// Send a call, refreshing and replaying once on a 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let call = CallContext::new(&request);
        let span = info_span!(
            "api_call",
            call_id = %call.id(),
            method = %request.method(),
            path = %request.path(),
        );
        self.execute(request, call).instrument(span).await
    }

    /// GET `path` and decode a successful JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path))
            .await?
            .error_for_status()?
            .json()
    }

    async fn execute(&self, request: ApiRequest, mut call: CallContext) -> Result<ApiResponse> {
        let mut fresh_access: Option<Secret<String>> = None;

        loop {
            let response = self
                .dispatch(&request, &mut call, fresh_access.as_ref())
                .await?;

            match interceptor::inspect(&call, response.status()) {
                Disposition::Deliver => {
                    debug!(status = response.status().as_u16(), "response delivered");
                    return Ok(response);
                }
                Disposition::Reject => {
                    metrics::record_unauthorized("rejected");
                    warn!("replayed call rejected again, giving up");
                    return Err(unauthorized(&request, &response));
                }
                Disposition::Refresh => {
                    let access = self
                        .coordinator
                        .on_unauthorized(&mut call, unauthorized(&request, &response))
                        .await?;
                    metrics::record_replay();
                    debug!("replaying with refreshed access token");
                    fresh_access = Some(access);
                }
            }
        }
    }

    /// Build and issue one attempt of `request`.
    ///
    /// A replay carries the token produced by the exchange that released it;
    /// first attempts read the store.
    async fn dispatch(
        &self,
        request: &ApiRequest,
        call: &mut CallContext,
        fresh_access: Option<&Secret<String>>,
    ) -> Result<ApiResponse> {
        let url = self.url_for(request.path())?;

        let mut headers = request.headers().clone();
        let sent_with = match fresh_access {
            Some(access) => interceptor::attach_bearer(&mut headers, access.expose())
                .then(|| access.clone()),
            None => interceptor::authorize(&mut headers, self.store.as_ref()),
        };
        call.record_sent(sent_with);

        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(headers);
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Transport(format!("request timed out: {e}"))
            } else {
                Error::Transport(format!("request failed: {e}"))
            }
        })?;
        ApiResponse::read(response).await
    }

    fn url_for(&self, path: &str) -> Result<String> {
        if let Some((scheme, _)) = path.split_once("://")
            && !scheme.is_empty()
            && !scheme.contains('/')
        {
            return Err(Error::InvalidRequest(format!(
                "expected a path relative to {}, got absolute URL {path}",
                self.base_url
            )));
        }
        if path.starts_with('/') {
            Ok(format!("{}{path}", self.base_url))
        } else {
            Ok(format!("{}/{path}", self.base_url))
        }
    }
}

fn unauthorized(request: &ApiRequest, response: &ApiResponse) -> Error {
    Error::Unauthorized {
        path: request.path().to_string(),
        body: response.text(),
    }
}
