use std::time::Duration;

use thiserror::Error;
use url::Url;

use super::models::{ApiConfig, Config, RefreshConfig, StorageConfig};

/// A composed config that must not be used
#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    /// Base URL is neither http nor https.
    #[error("base URL '{url}' must use http or https")]
    UnsupportedScheme {
        /// Offending base URL
        url: String,
    },
    /// Endpoint path is not absolute.
    #[error("{field} must be a path starting with '/', got '{value}'")]
    InvalidPath {
        /// Setting name
        field: &'static str,
        /// Configured value
        value: String,
    },
    /// A duration that must be positive is zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Setting name
        field: &'static str,
    },
    /// Storage keys are blank or collide.
    #[error("storage keys must be non-empty and distinct")]
    InvalidStorageKeys,
}

/// A usable but suspicious setting
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// What looks wrong
    pub message: String,
    /// Suggested fix, when there is one
    pub hint: Option<String>,
}

/// Warnings collected by the guard rails
#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    /// In the order they were found
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    /// Record a warning with a suggested fix.
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    /// True when nothing was flagged.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Reject unusable settings and collect warnings for questionable ones.
pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    validate_api(&config.api)?;
    validate_refresh(&config.refresh, &mut warnings)?;
    validate_storage(&config.storage, &mut warnings)?;

    Ok(warnings)
}

fn validate_api(api: &ApiConfig) -> Result<(), ConfigGuardRailError> {
    // Parse failures are reported by the loader with the source attached.
    if let Ok(url) = Url::parse(&api.base_url)
        && !matches!(url.scheme(), "http" | "https")
    {
        return Err(ConfigGuardRailError::UnsupportedScheme {
            url: api.base_url.clone(),
        });
    }

    for (field, value) in [
        ("api.refresh_path", &api.refresh_path),
        ("api.login_path", &api.login_path),
        ("api.signup_path", &api.signup_path),
    ] {
        if !value.starts_with('/') {
            return Err(ConfigGuardRailError::InvalidPath {
                field,
                value: value.clone(),
            });
        }
    }

    non_zero("api.request_timeout", api.request_timeout)
}

fn validate_refresh(
    refresh: &RefreshConfig,
    warnings: &mut ConfigWarnings,
) -> Result<(), ConfigGuardRailError> {
    non_zero("refresh.check_interval", refresh.check_interval)?;
    non_zero("refresh.expiry_buffer", refresh.expiry_buffer)?;
    non_zero("refresh.timeout", refresh.timeout)?;
    if let Some(lifetime) = refresh.max_session_lifetime {
        non_zero("refresh.max_session_lifetime", lifetime)?;
    }

    if refresh.expiry_buffer <= refresh.check_interval {
        warnings.push_with_hint(
            format!(
                "expiry buffer ({}) does not exceed the check interval ({}); \
                 a token may expire between two checks",
                humantime::format_duration(refresh.expiry_buffer),
                humantime::format_duration(refresh.check_interval),
            ),
            "Raise WARDEN_EXPIRY_BUFFER or lower WARDEN_CHECK_INTERVAL",
        );
    }

    Ok(())
}

fn validate_storage(
    storage: &StorageConfig,
    warnings: &mut ConfigWarnings,
) -> Result<(), ConfigGuardRailError> {
    let access = storage.access_key.trim();
    let refresh = storage.refresh_key.trim();
    if access.is_empty() || refresh.is_empty() || access == refresh {
        return Err(ConfigGuardRailError::InvalidStorageKeys);
    }

    if storage.path.is_none() {
        warnings.push_with_hint(
            "no token store path resolved; credentials will not survive a restart",
            "Set WARDEN_TOKEN_STORE or storage.path",
        );
    }

    Ok(())
}

fn non_zero(
    field: &'static str,
    value: Duration,
) -> Result<(), ConfigGuardRailError> {
    if value.is_zero() {
        Err(ConfigGuardRailError::ZeroDuration { field })
    } else {
        Ok(())
    }
}
