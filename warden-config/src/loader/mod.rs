//! Layered configuration loading.

pub mod error;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use url::Url;

use crate::constants::CONFIG_PATH_VAR;
use crate::models::{ApiConfig, Config, RefreshConfig, StorageConfig};
use crate::sources::{EnvConfig, FileConfig};
use crate::util::{first_of, parse_duration};
use crate::validation::{ConfigWarnings, apply_guard_rails};

use error::ConfigLoadError;

/// Result of a successful load: the effective config plus any non-fatal
/// guard-rail findings.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    /// Effective configuration
    pub config: Config,
    /// Non-fatal findings, already logged
    pub warnings: ConfigWarnings,
}

/// Composes defaults, an optional TOML file and the environment.
///
/// Precedence, highest first: process environment, `.env` file, TOML file,
/// built-in defaults.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader that consults `WARDEN_CONFIG` for the TOML file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this TOML file instead of consulting `WARDEN_CONFIG`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Seed the environment from a dotenv file. Real environment variables
    /// still win over values from the file.
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Load against the process environment.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        self.load_with(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn load_with<F>(&self, lookup: F) -> Result<ConfigLoad, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dotenv = match self.env_file.as_deref() {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        let combined =
            |name: &str| lookup(name).or_else(|| dotenv.get(name).cloned());

        let env = EnvConfig::from_lookup(&combined);

        let config_path = self
            .config_path
            .clone()
            .or_else(|| combined(CONFIG_PATH_VAR).map(PathBuf::from));
        let file = match config_path.as_deref() {
            Some(path) => read_file_config(path)?,
            None => FileConfig::default(),
        };

        let config = compose(&env, &file)?;
        let warnings = apply_guard_rails(&config)?;
        for warning in &warnings.items {
            match &warning.hint {
                Some(hint) => log::warn!("[config] {} ({})", warning.message, hint),
                None => log::warn!("[config] {}", warning.message),
            }
        }

        Ok(ConfigLoad { config, warnings })
    }
}

fn read_env_file(
    path: &Path,
) -> Result<HashMap<String, String>, ConfigLoadError> {
    let mut values = HashMap::new();
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        values.insert(key, value);
    }
    Ok(values)
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        ConfigLoadError::FileIo {
            path: path.to_path_buf(),
            source,
        }
    })?;
    toml::from_str(&raw).map_err(|source| ConfigLoadError::FileParse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose(
    env: &EnvConfig,
    file: &FileConfig,
) -> Result<Config, ConfigLoadError> {
    let api_defaults = ApiConfig::default();
    let base_url = first_of(&env.base_url, &file.api.base_url)
        .unwrap_or(api_defaults.base_url);
    Url::parse(&base_url).map_err(|source| ConfigLoadError::InvalidBaseUrl {
        value: base_url.clone(),
        source,
    })?;

    let api = ApiConfig {
        base_url,
        request_timeout: duration_or(
            "api.request_timeout",
            first_of(&env.request_timeout, &file.api.request_timeout),
            api_defaults.request_timeout,
        )?,
        refresh_path: first_of(&env.refresh_path, &file.api.refresh_path)
            .unwrap_or(api_defaults.refresh_path),
        login_path: first_of(&env.login_path, &file.api.login_path)
            .unwrap_or(api_defaults.login_path),
        signup_path: first_of(&env.signup_path, &file.api.signup_path)
            .unwrap_or(api_defaults.signup_path),
    };

    let refresh_defaults = RefreshConfig::default();
    let refresh = RefreshConfig {
        check_interval: duration_or(
            "refresh.check_interval",
            first_of(&env.check_interval, &file.refresh.check_interval),
            refresh_defaults.check_interval,
        )?,
        expiry_buffer: duration_or(
            "refresh.expiry_buffer",
            first_of(&env.expiry_buffer, &file.refresh.expiry_buffer),
            refresh_defaults.expiry_buffer,
        )?,
        timeout: duration_or(
            "refresh.timeout",
            first_of(&env.refresh_timeout, &file.refresh.timeout),
            refresh_defaults.timeout,
        )?,
        max_session_lifetime: first_of(
            &env.max_session_lifetime,
            &file.refresh.max_session_lifetime,
        )
        .map(|raw| parse_duration("refresh.max_session_lifetime", &raw))
        .transpose()?,
    };

    let storage_defaults = StorageConfig::default();
    let storage = StorageConfig {
        path: first_of(&env.token_store, &file.storage.path)
            .or(storage_defaults.path),
        access_key: file
            .storage
            .access_key
            .clone()
            .unwrap_or(storage_defaults.access_key),
        refresh_key: file
            .storage
            .refresh_key
            .clone()
            .unwrap_or(storage_defaults.refresh_key),
    };

    Ok(Config {
        api,
        refresh,
        storage,
    })
}

fn duration_or(
    field: &'static str,
    raw: Option<String>,
    default: std::time::Duration,
) -> Result<std::time::Duration, ConfigLoadError> {
    match raw {
        Some(raw) => parse_duration(field, &raw),
        None => Ok(default),
    }
}
