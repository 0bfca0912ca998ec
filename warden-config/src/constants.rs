//! Default values shared by the models and the loader.

use std::time::Duration;

/// API base URL when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Refresh exchange endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh/";
/// Login endpoint.
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login/";
/// Signup endpoint.
pub const DEFAULT_SIGNUP_PATH: &str = "/auth/signup/";

/// Bound for one intercepted request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Expiry monitor period.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);
/// Refresh proactively once the access token has five minutes or less left.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(5 * 60);
/// Bound for one refresh exchange.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// Storage key of the access token.
pub const DEFAULT_ACCESS_KEY: &str = "access_token";
/// Storage key of the refresh token.
pub const DEFAULT_REFRESH_KEY: &str = "refresh_token";
/// File name inside the platform data directory.
pub const TOKEN_STORE_FILE: &str = "tokens.json";

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_VAR: &str = "WARDEN_CONFIG";
