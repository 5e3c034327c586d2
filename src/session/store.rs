/// Session Store contract
///
/// A session is a JSON record keyed by an opaque random session id, living
/// in a key-value store with per-key expiry (EX semantics - absolute TTL
/// from the moment of the write). The record tracks the single currently
/// valid refresh jti for the session; every successful refresh replaces it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;

/// Upper bound applied to every store call so a slow backend fails the
/// request instead of hanging it
pub const STORE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Session record, persisted as JSON under the session id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Owning user (weak reference; the user row may vanish independently)
    pub user: Uuid,
    /// The one currently valid refresh token jti for this session
    pub refresh_token_jti: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn new(user: Uuid, refresh_token_jti: String) -> Self {
        Self {
            user,
            refresh_token_jti,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Result of the conditional jti rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// The expected jti matched and was atomically replaced; the absolute
    /// expiry of the record is unchanged
    Rotated {
        record: SessionRecord,
        remaining_ttl: i64,
    },
    /// No live record under this session id
    Missing,
    /// The stored jti no longer matches the expected one - a concurrent
    /// rotation won, or the presented token was already superseded
    Stale,
}

/// Expiring key-value store for session records
///
/// `ttl` returns the remaining lifetime in whole seconds; `-2` means the
/// key is absent or already expired. Any value `<= 0` must be treated as
/// invalid. `del` is idempotent - deleting an absent key is not an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn set(
        &self,
        session_id: &str,
        record: &SessionRecord,
        ttl_seconds: i64,
    ) -> Result<(), StoreError>;

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    async fn ttl(&self, session_id: &str) -> Result<i64, StoreError>;

    async fn del(&self, session_id: &str) -> Result<(), StoreError>;

    /// Compare-and-swap on the stored refresh jti.
    ///
    /// Replaces the jti and stamps `updated_at` only if the stored jti still
    /// equals `expected_jti`, preserving the record's absolute expiry (no
    /// sliding window). Two concurrent refreshes presenting the same valid
    /// jti cannot both succeed.
    async fn rotate_jti(
        &self,
        session_id: &str,
        expected_jti: &str,
        new_jti: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<RotateOutcome, StoreError>;
}

// 32 alphanumeric characters, ~190 bits of entropy
const SESSION_TOKEN_LENGTH: usize = 32;

fn random_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Generate a new opaque session identifier
pub fn generate_session_id() -> String {
    random_token()
}

/// Generate a new refresh token jti
pub fn generate_refresh_jti() -> String {
    random_token()
}
