//! Bearer credentials and their claims
//!
//! Tokens are treated as opaque strings everywhere except here, where the
//! JWT payload is read for expiry bookkeeping. Signatures are never checked
//! on the client; the server stays the authority on validity.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Which of the two credentials a value is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived bearer credential attached to API calls
    Access,
    /// Longer-lived credential exchanged for new access tokens
    Refresh,
}

impl TokenKind {
    /// Both kinds, access first.
    pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];
}

/// An opaque signed credential
///
/// `Debug` only shows a short prefix so tokens do not leak into logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token, for headers and request bodies.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the raw string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Short, log-safe preview of the token.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{prefix}…({} chars)", self.0.len())
    }

    /// Read the claims without verifying the signature.
    pub fn claims(&self) -> Result<TokenClaims, DecodeError> {
        TokenClaims::decode(self.as_str())
    }

    /// Expiry instant from the `exp` claim.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, DecodeError> {
        Ok(self.claims()?.expires_at)
    }

    /// Signed time until expiry; negative once expired.
    pub fn time_until_expiry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<TimeDelta, DecodeError> {
        Ok(self.expires_at()? - now)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.redacted()).finish()
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Claims carried by a token that the client cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// `sub`, when present
    pub subject: Option<String>,
    /// `iat`, when present
    pub issued_at: Option<DateTime<Utc>>,
    /// `exp`
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwtClaims {
    /// Subject (typically user ID)
    sub: Option<String>,
    /// Token issued at time (Unix timestamp)
    iat: Option<i64>,
    /// Token expiration time (Unix timestamp)
    exp: Option<i64>,
}

impl TokenClaims {
    fn decode(raw: &str) -> Result<Self, DecodeError> {
        if raw.split('.').count() != 3 {
            return Err(DecodeError::Malformed);
        }

        // Only the payload is of interest; expiry is judged by the caller.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<JwtClaims>(
            raw,
            &DecodingKey::from_secret(b"unused"),
            &validation,
        )
        .map_err(|e| DecodeError::InvalidClaims(e.to_string()))?;

        let claims = data.claims;
        let exp = claims.exp.ok_or(DecodeError::MissingExpiry)?;
        if let Some(iat) = claims.iat
            && exp <= iat
        {
            return Err(DecodeError::InvalidTimeline { iat, exp });
        }

        Ok(Self {
            subject: claims.sub,
            issued_at: claims.iat.and_then(|iat| DateTime::from_timestamp(iat, 0)),
            expires_at: DateTime::from_timestamp(exp, 0).ok_or_else(|| {
                DecodeError::InvalidClaims(format!("exp {exp} out of range"))
            })?,
        })
    }
}

/// Access and refresh token as handed out by login or signup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer token
    pub access: Token,
    /// Token exchanged for new access tokens
    pub refresh: Token,
}

/// Derived state of the stored access token. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// More than the buffer window remains
    Valid,
    /// Within the buffer window but not yet expired
    ExpiringSoon,
    /// Past expiry, missing or undecodable
    Expired,
}

impl SessionState {
    /// Classify the remaining lifetime against the refresh buffer.
    pub fn evaluate(time_left: Option<TimeDelta>, buffer: TimeDelta) -> Self {
        match time_left {
            Some(left) if left > buffer => SessionState::Valid,
            Some(left) if left > TimeDelta::zero() => SessionState::ExpiringSoon,
            _ => SessionState::Expired,
        }
    }
}
