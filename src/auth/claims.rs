/// JWT Claims structures
///
/// Payloads for the two token types (RFC 7519). Both carry the session id
/// (`sid`) binding them to a server-side session record; refresh tokens
/// additionally carry the rotation fingerprint (`jti`).
///
/// Deserialization doubles as the schema check: every field is required, so
/// a verified token missing `sub`, `sid`, or (for refresh) `jti` is rejected
/// before any business logic runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

/// Claims for short-lived access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Session identifier, key of the server-side session record
    pub sid: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl AccessClaims {
    pub fn new(user_id: Uuid, session_id: &str, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns error if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

/// Claims for longer-lived refresh tokens
///
/// `jti` must match the `refreshTokenJti` currently recorded in the session
/// for the token to be accepted; a mismatch is the reuse-detection signal.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub sid: String,
    /// Rotation fingerprint of this refresh token
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl RefreshClaims {
    pub fn new(
        user_id: Uuid,
        session_id: &str,
        jti: &str,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            jti: jti.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}
