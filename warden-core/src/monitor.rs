//! Proactive expiry checks
//!
//! [`ExpiryMonitor`] periodically inspects the stored access token and asks
//! the [`RefreshCoordinator`] for a new one shortly before it expires. It is
//! advisory: the interceptor's reactive 401 path is the backstop when a tick is
//! missed.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use warden_config::RefreshConfig;

use crate::refresh::RefreshCoordinator;
use crate::store::TokenStore;
use crate::token::{SessionState, TokenKind};

/// What a single evaluation found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No access token is stored
    NoToken,
    /// The stored token has no usable expiry; the tick was skipped
    Undecodable,
    /// More than the buffer window remains
    Healthy,
    /// Already past expiry; left to the reactive path
    Expired,
    /// A refresh was started in the background
    RefreshTriggered,
}

#[derive(Debug)]
struct Timer {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct MonitorInner {
    store: Arc<dyn TokenStore>,
    coordinator: RefreshCoordinator,
    interval: Duration,
    buffer: TimeDelta,
    timer: Mutex<Option<Timer>>,
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.cancel.cancel();
        }
    }
}

/// Periodic expiry watcher for one session
#[derive(Debug, Clone)]
pub struct ExpiryMonitor {
    inner: Arc<MonitorInner>,
}

impl ExpiryMonitor {
    /// Build a stopped monitor over the coordinator's store.
    pub fn new(config: &RefreshConfig, coordinator: RefreshCoordinator) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                store: Arc::clone(coordinator.store()),
                coordinator,
                interval: config.check_interval,
                buffer: TimeDelta::from_std(config.expiry_buffer)
                    .unwrap_or(TimeDelta::MAX),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Begin periodic checks. Calling it while already running does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut timer = self.inner.timer.lock();
        if let Some(active) = timer.as_ref()
            && !active.handle.is_finished()
        {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::run(
            Arc::downgrade(&self.inner),
            self.inner.interval,
            cancel.clone(),
        ));
        *timer = Some(Timer { handle, cancel });

        log::debug!(
            "[ExpiryMonitor] Started with interval {:?}",
            self.inner.interval
        );
    }

    /// Cancel periodic checks. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.cancel.cancel();
            log::debug!("[ExpiryMonitor] Stopped");
        }
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.handle.is_finished())
    }

    async fn run(
        inner: Weak<MonitorInner>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; checks start one interval in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    ExpiryMonitor { inner }.tick();
                }
            }
        }
    }

    /// Evaluate the stored token once, triggering a background refresh when
    /// it is inside the buffer window.
    pub fn tick(&self) -> TickOutcome {
        let Some(access) = self.inner.store.get(TokenKind::Access) else {
            return TickOutcome::NoToken;
        };

        let time_left = match access.time_until_expiry(Utc::now()) {
            Ok(left) => left,
            Err(e) => {
                log::debug!("[ExpiryMonitor] Skipping tick, token undecodable: {e}");
                return TickOutcome::Undecodable;
            }
        };

        if time_left <= TimeDelta::zero() {
            return TickOutcome::Expired;
        }
        if time_left > self.inner.buffer {
            return TickOutcome::Healthy;
        }

        log::info!(
            "[ExpiryMonitor] Access token expires in {}s, refreshing",
            time_left.num_seconds()
        );
        let coordinator = self.inner.coordinator.clone();
        tokio::spawn(async move {
            // Failures already surface as a SessionExpired event.
            if let Err(e) = coordinator.refresh().await {
                log::debug!("[ExpiryMonitor] Background refresh failed: {e}");
            }
        });
        TickOutcome::RefreshTriggered
    }

    /// Signed time until the stored access token expires.
    pub fn time_until_expiry(&self) -> Option<TimeDelta> {
        self.inner
            .store
            .get(TokenKind::Access)?
            .time_until_expiry(Utc::now())
            .ok()
    }

    /// True when the token is past expiry or missing.
    pub fn is_expired(&self) -> bool {
        self.time_until_expiry()
            .is_none_or(|left| left <= TimeDelta::zero())
    }

    /// True inside the buffer window but not yet expired.
    pub fn will_expire_soon(&self) -> bool {
        self.time_until_expiry()
            .is_some_and(|left| left > TimeDelta::zero() && left <= self.inner.buffer)
    }

    /// Classify the stored access token against the buffer.
    pub fn session_state(&self) -> SessionState {
        SessionState::evaluate(self.time_until_expiry(), self.inner.buffer)
    }
}
