use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    /// `[api]`
    #[serde(default)]
    pub api: FileApiConfig,
    /// `[refresh]`
    #[serde(default)]
    pub refresh: FileRefreshConfig,
    /// `[storage]`
    #[serde(default)]
    pub storage: FileStorageConfig,
}

/// `[api]` table
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileApiConfig {
    /// API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Humantime duration, e.g. `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
    /// Refresh endpoint path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_path: Option<String>,
    /// Login endpoint path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_path: Option<String>,
    /// Signup endpoint path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signup_path: Option<String>,
}

/// `[refresh]` table; every value is a humantime duration
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRefreshConfig {
    /// Expiry monitor period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<String>,
    /// Proactive refresh window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_buffer: Option<String>,
    /// Refresh exchange bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Absolute session lifetime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_session_lifetime: Option<String>,
}

/// `[storage]` table
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStorageConfig {
    /// Token file location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Storage key of the access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    /// Storage key of the refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_key: Option<String>,
}

/// Environment-derived configuration values.
///
/// Durations stay raw here; the loader parses them so that a bad value is
/// reported with the variable name attached.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    /// `WARDEN_BASE_URL`
    pub base_url: Option<String>,
    /// `WARDEN_REQUEST_TIMEOUT`
    pub request_timeout: Option<String>,
    /// `WARDEN_REFRESH_PATH`
    pub refresh_path: Option<String>,
    /// `WARDEN_LOGIN_PATH`
    pub login_path: Option<String>,
    /// `WARDEN_SIGNUP_PATH`
    pub signup_path: Option<String>,
    /// `WARDEN_CHECK_INTERVAL`
    pub check_interval: Option<String>,
    /// `WARDEN_EXPIRY_BUFFER`
    pub expiry_buffer: Option<String>,
    /// `WARDEN_REFRESH_TIMEOUT`
    pub refresh_timeout: Option<String>,
    /// `WARDEN_MAX_SESSION_LIFETIME`
    pub max_session_lifetime: Option<String>,
    /// `WARDEN_TOKEN_STORE`
    pub token_store: Option<PathBuf>,
}

impl EnvConfig {
    /// Read through an arbitrary lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };

        Self {
            base_url: var("WARDEN_BASE_URL"),
            request_timeout: var("WARDEN_REQUEST_TIMEOUT"),
            refresh_path: var("WARDEN_REFRESH_PATH"),
            login_path: var("WARDEN_LOGIN_PATH"),
            signup_path: var("WARDEN_SIGNUP_PATH"),
            check_interval: var("WARDEN_CHECK_INTERVAL"),
            expiry_buffer: var("WARDEN_EXPIRY_BUFFER"),
            refresh_timeout: var("WARDEN_REFRESH_TIMEOUT"),
            max_session_lifetime: var("WARDEN_MAX_SESSION_LIFETIME"),
            token_store: var("WARDEN_TOKEN_STORE").map(PathBuf::from),
        }
    }
}
