//! One authenticated session
//!
//! [`Session`] wires a store, a transport and a single
//! [`RefreshCoordinator`] into the monitor and the interceptor. There is no
//! global instance; callers own the handle and pass it where it is needed.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;
use warden_config::Config;

use crate::error::{ClientError, SessionError, SessionResult};
use crate::events::SessionEventBus;
use crate::interceptor::RequestInterceptor;
use crate::monitor::ExpiryMonitor;
use crate::refresh::RefreshCoordinator;
use crate::store::{FileTokenStore, MemoryTokenStore, StorageKeys, TokenStore};
use crate::token::{SessionState, TokenKind, TokenPair};
use crate::transport::{ApiRequest, HttpTransport, ReqwestTransport};

/// Username/password body accepted by the login endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    /// Login name
    pub username: String,
    /// Plain password, sent once over the login request
    pub password: String,
}

/// Handle owning the coordinator, monitor, interceptor and event bus of one login
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    config: Config,
    events: SessionEventBus,
    coordinator: RefreshCoordinator,
    monitor: ExpiryMonitor,
    client: RequestInterceptor,
}

impl Session {
    /// Wire a session over an explicit store and transport. The monitor is not started.
    pub fn new(
        config: Config,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let events = SessionEventBus::new();
        let coordinator = RefreshCoordinator::new(
            &config,
            store,
            Arc::clone(&transport),
            events.clone(),
        );
        let monitor = ExpiryMonitor::new(&config.refresh, coordinator.clone());
        let client =
            RequestInterceptor::new(&config.api, transport, coordinator.clone());

        let id = Uuid::new_v4();
        log::debug!("[Session] Created session {id} for {}", config.api.base_url);

        Self {
            id,
            config,
            events,
            coordinator,
            monitor,
            client,
        }
    }

    /// Build a session with the production transport and the configured
    /// token store.
    pub fn from_config(config: Config) -> SessionResult<Self> {
        let transport = ReqwestTransport::new(&config.api)
            .map_err(|e| SessionError::HttpClient(e.to_string()))?;

        let store: Arc<dyn TokenStore> = match &config.storage.path {
            Some(path) => Arc::new(FileTokenStore::open(
                path,
                StorageKeys::from(&config.storage),
            )?),
            None => {
                log::warn!(
                    "[Session] No token store path configured, credentials will not persist"
                );
                Arc::new(MemoryTokenStore::new())
            }
        };

        Ok(Self::new(config, store, Arc::new(transport)))
    }

    /// Identifier used in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configuration the session was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Authenticate and install the returned token pair.
    pub async fn login<C>(&self, credentials: &C) -> SessionResult<()>
    where
        C: Serialize + ?Sized,
    {
        let pair = self
            .authenticate(&self.config.api.login_path, credentials)
            .await?;
        self.establish(pair)
    }

    /// Register and install the returned token pair.
    pub async fn signup<D>(&self, details: &D) -> SessionResult<()>
    where
        D: Serialize + ?Sized,
    {
        let pair = self
            .authenticate(&self.config.api.signup_path, details)
            .await?;
        self.establish(pair)
    }

    async fn authenticate<B>(&self, path: &str, body: &B) -> SessionResult<TokenPair>
    where
        B: Serialize + ?Sized,
    {
        let request = ApiRequest::post(self.client.url(path)?)
            .json(body)
            .map_err(ClientError::from)?;
        let response = self.client.send_anonymous(request).await?;

        match response.status {
            status if status.is_success() => {
                Ok(response.json::<TokenPair>().map_err(ClientError::from)?)
            }
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                log::warn!("[Session] Credentials rejected with status {status}");
                Err(SessionError::Unauthorized { status })
            }
            status => Err(ClientError::Status {
                status,
                body: response.text(),
            }
            .into()),
        }
    }

    /// Install an externally obtained token pair and start monitoring.
    pub fn establish(&self, pair: TokenPair) -> SessionResult<()> {
        self.coordinator.establish(&pair)?;
        self.monitor.start();
        log::info!("[Session] Session {} authenticated", self.id);
        Ok(())
    }

    /// Resume from persisted credentials. Returns whether there was anything
    /// to resume.
    pub fn restore(&self) -> bool {
        if self.coordinator.store().get(TokenKind::Refresh).is_none() {
            log::debug!("[Session] Nothing to restore");
            return false;
        }
        self.coordinator.resume();
        self.monitor.start();
        log::info!("[Session] Restored session {} from storage", self.id);
        true
    }

    /// End the session. A refresh still in flight completes but its result
    /// is dropped.
    pub fn logout(&self) -> SessionResult<()> {
        self.monitor.stop();
        self.coordinator.invalidate()?;
        log::info!("[Session] Session {} logged out", self.id);
        Ok(())
    }

    /// Current state of the stored access token.
    pub fn state(&self) -> SessionState {
        self.monitor.session_state()
    }

    /// A refresh token is held, so protected calls can still succeed even if
    /// the access token has lapsed.
    pub fn is_authenticated(&self) -> bool {
        self.coordinator.store().get(TokenKind::Refresh).is_some()
    }

    /// Interceptor for protected API calls.
    pub fn client(&self) -> &RequestInterceptor {
        &self.client
    }

    /// Bus carrying `Expired` and `Refreshed`.
    pub fn events(&self) -> &SessionEventBus {
        &self.events
    }

    /// Proactive expiry watcher.
    pub fn monitor(&self) -> &ExpiryMonitor {
        &self.monitor
    }

    /// The session's only refresh coordinator.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.monitor.stop();
    }
}
