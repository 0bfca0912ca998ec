//! Single-flight access token refresh
//!
//! [`RefreshCoordinator`] owns the `Idle -> Refreshing -> Idle` state machine.
//! The first caller to find it idle starts the one exchange; everybody who
//! arrives while it is running parks a oneshot sender and receives a clone of
//! the same outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;
use warden_config::Config;

use crate::error::{RefreshError, RefreshResult, StoreResult};
use crate::events::{SessionEvent, SessionEventBus};
use crate::store::TokenStore;
use crate::token::{Token, TokenKind, TokenPair};
use crate::transport::{ApiRequest, HttpTransport};

type Waiter = oneshot::Sender<RefreshResult<Token>>;

#[derive(Debug)]
enum RefreshState {
    Idle,
    Refreshing(Vec<Waiter>),
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: Token,
    /// Present only when the server rotates refresh tokens
    #[serde(default)]
    refresh: Option<Token>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<RefreshState>,
    store: Arc<dyn TokenStore>,
    events: SessionEventBus,
    transport: Arc<dyn HttpTransport>,
    refresh_url: String,
    timeout: Duration,
    max_session_lifetime: Option<Duration>,
    generation: AtomicU64,
    established_at: Mutex<Option<Instant>>,
}

/// Serialises refresh attempts for one session
///
/// Cloning is cheap and every clone drives the same state machine.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// Coordinator in the idle state with no session established.
    pub fn new(
        config: &Config,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn HttpTransport>,
        events: SessionEventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RefreshState::Idle),
                store,
                events,
                transport,
                refresh_url: config.api.refresh_url(),
                timeout: config.refresh.timeout,
                max_session_lifetime: config.refresh.max_session_lifetime,
                generation: AtomicU64::new(0),
                established_at: Mutex::new(None),
            }),
        }
    }

    /// Obtain a fresh access token, joining an in-flight attempt if any.
    pub async fn refresh(&self) -> RefreshResult<Token> {
        let (tx, rx) = oneshot::channel();

        // The generation is captured in the same critical section that
        // `establish` and `invalidate` bump it in.
        let leader = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    waiters.push(tx);
                    None
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(vec![tx]);
                    Some(self.inner.generation.load(Ordering::SeqCst))
                }
            }
        };

        if let Some(generation) = leader {
            log::debug!(
                "[RefreshCoordinator] Starting refresh exchange (generation {generation})"
            );
            let inner = Arc::clone(&self.inner);
            tokio::spawn(inner.run(generation));
        } else {
            log::debug!("[RefreshCoordinator] Joining in-flight refresh");
        }

        rx.await.unwrap_or_else(|_| {
            Err(RefreshError::Network(
                "refresh task ended without a result".to_string(),
            ))
        })
    }

    /// True while an exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock(), RefreshState::Refreshing(_))
    }

    /// Install a new session. Any refresh still in flight for the previous
    /// one will be discarded when it returns.
    pub fn establish(&self, pair: &TokenPair) -> StoreResult<()> {
        let _state = self.inner.state.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.store.set_pair(pair)?;
        *self.inner.established_at.lock() = Some(Instant::now());
        log::info!(
            "[RefreshCoordinator] Session established (generation {})",
            self.generation()
        );
        Ok(())
    }

    /// Start the lifetime clock for a session resumed from storage, unless
    /// one is already running.
    pub fn resume(&self) {
        let mut established_at = self.inner.established_at.lock();
        if established_at.is_none() {
            *established_at = Some(Instant::now());
        }
    }

    /// End the current session without publishing anything.
    pub fn invalidate(&self) -> StoreResult<()> {
        let _state = self.inner.state.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *self.inner.established_at.lock() = None;
        self.inner.store.clear()
    }

    /// Bumped each time a session is established or invalidated.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Store shared with the monitor and the interceptor.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }
}

impl Inner {
    async fn run(self: Arc<Self>, generation: u64) {
        let outcome = self.exchange(generation).await;
        let (result, waiters, event) = self.settle(generation, outcome);

        log::debug!(
            "[RefreshCoordinator] Resolving {} waiter(s)",
            waiters.len()
        );
        for waiter in waiters {
            // A waiter whose caller went away simply misses the result.
            let _ = waiter.send(result.clone());
        }

        if let Some(event) = event {
            self.events.publish(event);
        }
    }

    async fn exchange(&self, generation: u64) -> RefreshResult<RefreshResponse> {
        // A session replaced before the task first ran must not have its
        // refresh token spent on behalf of the old one.
        let refresh = {
            let _state = self.state.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                return Err(RefreshError::Superseded);
            }
            self.store.get(TokenKind::Refresh)
        }
        .ok_or(RefreshError::NoRefreshToken)?;

        let established_at = *self.established_at.lock();
        if let Some(max) = self.max_session_lifetime
            && let Some(at) = established_at
            && at.elapsed() >= max
        {
            return Err(RefreshError::LifetimeExceeded);
        }

        let request = ApiRequest::post(self.refresh_url.as_str())
            .json(&RefreshRequest {
                refresh: refresh.as_str(),
            })
            .map_err(|e| RefreshError::Network(e.to_string()))?
            .negotiated();

        let response =
            match tokio::time::timeout(self.timeout, self.transport.send(request))
                .await
            {
                Ok(sent) => sent?,
                Err(_) => return Err(RefreshError::Timeout(self.timeout)),
            };

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
            });
        }

        response
            .json::<RefreshResponse>()
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))
    }

    /// Apply the outcome and return to `Idle`. The generation check and the
    /// store write happen under the state lock, the same lock `establish`
    /// and `invalidate` take, so a stale result can never land.
    fn settle(
        &self,
        generation: u64,
        outcome: RefreshResult<RefreshResponse>,
    ) -> (RefreshResult<Token>, Vec<Waiter>, Option<SessionEvent>) {
        let mut state = self.state.lock();
        let waiters = match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing(waiters) => waiters,
            RefreshState::Idle => Vec::new(),
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            log::info!(
                "[RefreshCoordinator] Session changed during refresh, discarding result"
            );
            return (Err(RefreshError::Superseded), waiters, None);
        }

        let outcome = outcome.and_then(|response| {
            self.store_response(response)
                .map_err(|e| RefreshError::Store(e.to_string()))
        });

        match outcome {
            Ok(access) => {
                log::info!(
                    "[RefreshCoordinator] Access token refreshed ({})",
                    access.redacted()
                );
                let event = SessionEvent::Refreshed {
                    access: access.clone(),
                };
                (Ok(access), waiters, Some(event))
            }
            Err(err) => {
                log::warn!("[RefreshCoordinator] Refresh failed, ending session: {err}");
                if let Err(clear_err) = self.store.clear() {
                    log::warn!(
                        "[RefreshCoordinator] Failed to clear token store: {clear_err}"
                    );
                }
                *self.established_at.lock() = None;
                (Err(err), waiters, Some(SessionEvent::Expired))
            }
        }
    }

    fn store_response(&self, response: RefreshResponse) -> StoreResult<Token> {
        self.store.set(TokenKind::Access, response.access.clone())?;
        if let Some(rotated) = response.refresh {
            log::debug!("[RefreshCoordinator] Server rotated the refresh token");
            self.store.set(TokenKind::Refresh, rotated)?;
        }
        Ok(response.access)
    }
}
