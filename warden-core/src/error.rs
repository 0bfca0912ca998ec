//! Session error types
//!
//! One `thiserror` enum per concern. [`RefreshError`] is `Clone` because a
//! single refresh outcome is handed to every caller that waited on it.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Token could not be decoded into usable claims
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not three dot-separated segments
    #[error("token is not a three-segment JWT")]
    Malformed,

    /// Payload segment is not base64 JSON claims
    #[error("token claims could not be parsed: {0}")]
    InvalidClaims(String),

    /// No `exp` claim
    #[error("token carries no expiry claim")]
    MissingExpiry,

    /// Expiry at or before the issue time
    #[error("token expiry {exp} is not after its issue time {iat}")]
    InvalidTimeline {
        /// `iat` in Unix seconds
        iat: i64,
        /// `exp` in Unix seconds
        exp: i64,
    },
}

/// Outcome of a failed refresh, shared verbatim by all waiters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// Nothing to exchange; the session was never established or was cleared.
    #[error("no refresh token stored")]
    NoRefreshToken,

    /// Server answered the exchange with a non-success status.
    #[error("refresh token rejected by server (status {status})")]
    Rejected {
        /// Status of the refresh response
        status: StatusCode,
    },

    /// Connection or request failure below HTTP status level.
    #[error("refresh request failed: {0}")]
    Network(String),

    /// No answer within the configured refresh timeout.
    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    /// Success status, but no usable `access` field.
    #[error("refresh response could not be parsed: {0}")]
    InvalidResponse(String),

    /// The absolute session lifetime has run out.
    #[error("session exceeded its maximum lifetime")]
    LifetimeExceeded,

    /// Session was logged out or replaced while the exchange was in flight.
    #[error("session ended while refresh was in flight")]
    Superseded,

    /// The new tokens could not be written.
    #[error("token store failed during refresh: {0}")]
    Store(String),
}

impl RefreshError {
    /// Whether the failure ended the session (store cleared, expiry
    /// published). Only a superseded refresh leaves the session alone.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RefreshError::Superseded)
    }
}

impl From<TransportError> for RefreshError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(after) => RefreshError::Timeout(after),
            other => RefreshError::Network(other.to_string()),
        }
    }
}

/// Failure below HTTP status level
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other failure while sending.
    #[error("request failed: {0}")]
    Request(String),

    /// Status received, body unreadable.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Errors surfaced by the request interceptor
#[derive(Debug, Error)]
pub enum ClientError {
    /// Sending failed before a status was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A 401 triggered a refresh and the refresh failed.
    #[error("session refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// Non-success status after any retry.
    #[error("request failed with status {status}: {body}")]
    Status {
        /// Final response status
        status: StatusCode,
        /// Response body as text
        body: String,
    },

    /// Body is not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Path did not resolve to a valid URL.
    #[error("invalid request URL '{0}'")]
    InvalidUrl(String),

    /// A header value contains bytes HTTP does not allow.
    #[error("invalid value for header '{0}'")]
    InvalidHeader(String),
}

/// Token persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// Existing token file could not be read.
    #[error("failed to read token store {path}")]
    ReadFailed {
        /// Token file
        path: std::path::PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Token file could not be written or removed.
    #[error("failed to write token store {path}")]
    WriteFailed {
        /// Token file
        path: std::path::PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Token file is not the expected JSON object.
    #[error("corrupted token store data")]
    CorruptedData(#[source] serde_json::Error),
}

/// Login, signup and lifecycle failures of a [`crate::Session`]
#[derive(Debug, Error)]
pub enum SessionError {
    /// Login or signup request failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Issued tokens could not be stored.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Login or signup was refused.
    #[error("credentials rejected (status {status})")]
    Unauthorized {
        /// Status of the refusal
        status: StatusCode,
    },

    /// The production transport could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Result type alias for interceptor operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for refresh operations
pub type RefreshResult<T> = Result<T, RefreshError>;

/// Result type alias for token store mutations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for session lifecycle operations
pub type SessionResult<T> = Result<T, SessionError>;
