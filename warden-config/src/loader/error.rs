//! Errors raised while composing a configuration.

use super::super::validation::ConfigGuardRailError;

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a configuration could not be composed
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// TOML file exists but could not be read.
    #[error("failed to read config file {path}")]
    FileIo {
        /// Config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// TOML file is not valid for the config schema.
    #[error("failed to parse config file {path}")]
    FileParse {
        /// Config file
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },
    /// Base URL does not parse.
    #[error("invalid base URL '{value}'")]
    InvalidBaseUrl {
        /// Configured value
        value: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },
    /// A duration setting is not humantime syntax.
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        /// Setting name
        field: &'static str,
        /// Configured value
        value: String,
        /// Parser error
        #[source]
        source: humantime::DurationError,
    },
    /// Composed config failed a guard rail.
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    /// The `.env` file could not be read.
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
