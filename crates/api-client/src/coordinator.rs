//! Single-flight refresh coordinator
//!
//! One coordinator per client. It owns the refresh state and the queue of
//! calls waiting on the exchange in flight:
//!
//! - Idle + 401 → mark the call retried, start the exchange, become
//!   Refreshing. With no refresh token stored the call fails at once and
//!   the state stays Idle. If the stored access token is no longer the one
//!   the call went out with, an earlier exchange already rotated it: the
//!   call is replayed with the current token and no exchange starts.
//! - Refreshing + 401 → mark the call retried and queue it. No second
//!   exchange is started.
//! - Exchange succeeds → store the new pair, release every queued call
//!   with the new access token, back to Idle.
//! - Exchange fails → clear the store, release every queued call with the
//!   same error, back to Idle.
//!
//! The check-and-transition runs under a std Mutex that is never held
//! across an `.await`; the network exchange itself runs outside the lock in
//! a spawned task, so it settles (and releases the queue) even if the call
//! that started it is dropped.
//!
//! Logout bumps a generation counter. An exchange that started under an
//! older generation discards its result instead of writing it back, and
//! its waiters fail with `LoggedOut`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use common::Secret;
use session_auth::{CredentialPair, TokenStore};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::call::CallContext;
use crate::error::{Error, Result};
use crate::metrics;

/// Outcome of one exchange, shared by every call it releases.
type RefreshOutcome = std::result::Result<Secret<String>, session_auth::Error>;

/// A call parked until the exchange in flight settles.
struct Waiter {
    call_id: String,
    tx: oneshot::Sender<RefreshOutcome>,
}

/// The queue only exists while an exchange is in flight.
enum RefreshState {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

struct Shared {
    state: Mutex<RefreshState>,
    /// Bumped by every logout
    generation: AtomicU64,
    /// Serializes store writes between exchanges and logout
    writes: tokio::sync::Mutex<()>,
    store: Arc<dyn TokenStore>,
    http: reqwest::Client,
    refresh_url: String,
}

/// Cheap to clone; clones share the same state and queue.
#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    /// `http` should be the client's own `reqwest::Client` so the exchange
    /// runs under the same default timeout as every other call.
    pub fn new(store: Arc<dyn TokenStore>, http: reqwest::Client, refresh_url: String) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RefreshState::Idle),
                generation: AtomicU64::new(0),
                writes: tokio::sync::Mutex::new(()),
                store,
                http,
                refresh_url,
            }),
        }
    }

    /// Whether an exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Number of calls waiting on the exchange in flight, including the one
    /// that started it.
    pub fn waiting(&self) -> usize {
        match &*self.lock_state() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// End the session: drop both credentials and discard the result of any
    /// exchange still in flight.
    pub async fn logout(&self) -> session_auth::Result<()> {
        let _writes = self.shared.writes.lock().await;
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.store.clear().await
    }

    /// Handle a 401 for `call` and wait for a fresh access token.
    ///
    /// Marks the call retried. `unauthorized` is returned as-is when the
    /// call already had its replay or there is no refresh token to use.
    /// A call that went out with a token that has since been rotated gets
    /// the current token back without a new exchange.
    pub async fn on_unauthorized(
        &self,
        call: &mut CallContext,
        unauthorized: Error,
    ) -> Result<Secret<String>> {
        if call.is_retried() {
            metrics::record_unauthorized("rejected");
            return Err(unauthorized);
        }

        let rx = {
            let mut state = self.lock_state();
            call.mark_retried();
            let (tx, rx) = oneshot::channel();
            let waiter = Waiter {
                call_id: call.id().to_owned(),
                tx,
            };

            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    waiters.push_back(waiter);
                    metrics::record_unauthorized("queued");
                    debug!(
                        call_id = call.id(),
                        queued = waiters.len(),
                        "refresh already in flight, waiting"
                    );
                }
                RefreshState::Idle => {
                    let Some(pair) = self.shared.store.get() else {
                        metrics::record_unauthorized("no_refresh_token");
                        debug!(call_id = call.id(), "no refresh token stored, failing call");
                        return Err(unauthorized);
                    };
                    if call.sent_with() != Some(pair.access()) {
                        metrics::record_unauthorized("stale");
                        debug!(
                            call_id = call.id(),
                            "credentials rotated since the call was sent, replaying"
                        );
                        return Ok(pair.access_secret().clone());
                    }
                    let generation = self.shared.generation.load(Ordering::SeqCst);
                    *state = RefreshState::Refreshing {
                        waiters: VecDeque::from([waiter]),
                    };
                    metrics::record_unauthorized("refresh");
                    debug!(call_id = call.id(), "starting token refresh");

                    let coordinator = self.clone();
                    tokio::spawn(async move { coordinator.exchange(pair, generation).await });
                }
            }
            rx
        };

        match rx.await {
            Ok(Ok(access)) => Ok(access),
            Ok(Err(e)) => Err(Error::RefreshFailed(e)),
            Err(_) => Err(Error::RefreshFailed(session_auth::Error::TokenExchange(
                "refresh task ended without a result".into(),
            ))),
        }
    }

    /// Run the exchange, update the store, then settle the queue.
    async fn exchange(&self, current: CredentialPair, generation: u64) {
        let started = Instant::now();
        let shared = &self.shared;

        let outcome =
            match session_auth::refresh_token(&shared.http, &shared.refresh_url, current.refresh())
                .await
            {
                Ok(token) => {
                    let _writes = shared.writes.lock().await;
                    if shared.generation.load(Ordering::SeqCst) != generation {
                        Err(session_auth::Error::LoggedOut)
                    } else {
                        let pair = token.into_pair();
                        let access = pair.access_secret().clone();
                        if let Err(e) = shared.store.set(pair).await {
                            warn!(error = %e, "failed to persist refreshed credentials");
                        }
                        Ok(access)
                    }
                }
                Err(e) => {
                    let _writes = shared.writes.lock().await;
                    if let Err(clear_err) = shared.store.clear().await {
                        warn!(error = %clear_err, "failed to persist cleared credentials");
                    }
                    Err(e)
                }
            };

        let waiters = match std::mem::replace(&mut *self.lock_state(), RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => {
                metrics::record_refresh("success", waiters.len());
                info!(released = waiters.len(), elapsed_ms, "token refresh succeeded");
            }
            Err(session_auth::Error::LoggedOut) => {
                metrics::record_refresh("logged_out", waiters.len());
                info!(
                    released = waiters.len(),
                    elapsed_ms, "logged out during token refresh, result discarded"
                );
            }
            Err(e) => {
                metrics::record_refresh("failure", waiters.len());
                warn!(
                    error = %e,
                    released = waiters.len(),
                    elapsed_ms,
                    "token refresh failed, credentials cleared"
                );
            }
        }

        release(waiters, &outcome);
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hand `outcome` to every waiter in enqueue order.
fn release(waiters: VecDeque<Waiter>, outcome: &RefreshOutcome) {
    for (position, waiter) in waiters.into_iter().enumerate() {
        if waiter.tx.send(outcome.clone()).is_err() {
            debug!(call_id = %waiter.call_id, position, "caller went away before refresh settled");
        } else {
            debug!(call_id = %waiter.call_id, position, "released");
        }
    }
}
