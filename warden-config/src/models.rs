//! Effective configuration handed to the session layer.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

use crate::constants::{
    DEFAULT_ACCESS_KEY, DEFAULT_BASE_URL, DEFAULT_CHECK_INTERVAL,
    DEFAULT_EXPIRY_BUFFER, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_KEY,
    DEFAULT_REFRESH_PATH, DEFAULT_REFRESH_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SIGNUP_PATH, TOKEN_STORE_FILE,
};

/// Fully composed configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Remote API endpoints and request bounds.
    pub api: ApiConfig,
    /// Token lifecycle tuning.
    pub refresh: RefreshConfig,
    /// Where the credential pair is persisted.
    pub storage: StorageConfig,
}

/// API endpoints used by the interceptor and the refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL that relative request paths are joined onto.
    pub base_url: String,
    /// Upper bound for every intercepted request.
    pub request_timeout: Duration,
    /// Path of the refresh exchange.
    pub refresh_path: String,
    /// Path of the login endpoint.
    pub login_path: String,
    /// Path of the signup endpoint.
    pub signup_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            signup_path: DEFAULT_SIGNUP_PATH.to_string(),
        }
    }
}

impl ApiConfig {
    /// Join `path` onto the base URL. Absolute URLs pass through untouched.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Absolute URL of the refresh exchange.
    pub fn refresh_url(&self) -> String {
        self.url_for(&self.refresh_path)
    }
}

/// Timing of the proactive expiry monitor and the refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// How often the expiry monitor inspects the access token.
    pub check_interval: Duration,
    /// Remaining lifetime at or below which a proactive refresh is issued.
    pub expiry_buffer: Duration,
    /// Upper bound for one refresh exchange. Elapsing counts as a rejection.
    pub timeout: Duration,
    /// Absolute cap on how long one login may be kept alive by rolling
    /// refreshes. `None` leaves the cap to the server.
    pub max_session_lifetime: Option<Duration>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            expiry_buffer: DEFAULT_EXPIRY_BUFFER,
            timeout: DEFAULT_REFRESH_TIMEOUT,
            max_session_lifetime: None,
        }
    }
}

/// Persistent credential storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// File backing the token store. `None` keeps tokens in memory only.
    pub path: Option<PathBuf>,
    /// Key the access token is stored under.
    pub access_key: String,
    /// Key the refresh token is stored under.
    pub refresh_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            access_key: DEFAULT_ACCESS_KEY.to_string(),
            refresh_key: DEFAULT_REFRESH_KEY.to_string(),
        }
    }
}

/// Platform data directory location of the token file, when one exists.
pub fn default_store_path() -> Option<PathBuf> {
    ProjectDirs::from("", "warden", "warden")
        .map(|dirs| dirs.data_dir().join(TOKEN_STORE_FILE))
}
