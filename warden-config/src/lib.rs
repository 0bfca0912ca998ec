//! Shared configuration library for warden.
//!
//! Configuration is composed from built-in defaults, an optional TOML file and
//! the process environment (optionally seeded from a `.env` file). The
//! composed [`Config`] is checked by guard rails before it is handed to the
//! session layer, so every consumer sees the same defaults and validation
//! rules.

pub mod constants;
pub mod loader;
pub mod models;
/// Raw TOML and environment inputs.
pub mod sources;
/// Parsing helpers shared by the loader.
pub mod util;
/// Guard rails applied to the composed config.
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::{ApiConfig, Config, RefreshConfig, StorageConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
