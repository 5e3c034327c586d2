/// In-memory session store
///
/// Process-local backend with the same EX expiry semantics a Redis-style
/// store provides. Records round-trip through their JSON-serialized form so
/// behavior matches an external key-value backend exactly. A single async
/// mutex serializes all operations, which is also what makes `rotate_jti`
/// atomic.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::session::store::{RotateOutcome, SessionRecord, SessionStore};

struct Entry {
    payload: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    fn remaining_secs(&self, now: Instant) -> i64 {
        self.expires_at.saturating_duration_since(now).as_secs() as i64
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) session records
    pub async fn live_sessions(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }
}

fn encode(record: &SessionRecord) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(payload: &str) -> Result<SessionRecord, StoreError> {
    serde_json::from_str(payload).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn set(
        &self,
        session_id: &str,
        record: &SessionRecord,
        ttl_seconds: i64,
    ) -> Result<(), StoreError> {
        let payload = encode(record)?;
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds.max(0) as u64);

        let mut entries = self.entries.lock().await;
        entries.insert(session_id.to_string(), Entry { payload, expires_at });
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(session_id) {
            None => return Ok(None),
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return decode(&entry.payload).map(Some),
        };

        if expired {
            entries.remove(session_id);
        }
        Ok(None)
    }

    async fn ttl(&self, session_id: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let remaining = match entries.get(session_id) {
            None => return Ok(-2),
            Some(entry) => entry.remaining_secs(now),
        };

        if remaining <= 0 {
            entries.remove(session_id);
            return Ok(-2);
        }
        Ok(remaining)
    }

    async fn del(&self, session_id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.remove(session_id);
        Ok(())
    }

    async fn rotate_jti(
        &self,
        session_id: &str,
        expected_jti: &str,
        new_jti: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<RotateOutcome, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(session_id) {
            None => return Ok(RotateOutcome::Missing),
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            entries.remove(session_id);
            return Ok(RotateOutcome::Missing);
        }

        let entry = match entries.get_mut(session_id) {
            None => return Ok(RotateOutcome::Missing),
            Some(entry) => entry,
        };

        let mut record = decode(&entry.payload)?;
        if record.refresh_token_jti != expected_jti {
            return Ok(RotateOutcome::Stale);
        }

        record.refresh_token_jti = new_jti.to_string();
        record.updated_at = Some(updated_at);
        entry.payload = encode(&record)?;
        // expires_at deliberately untouched: the absolute expiry carries over

        let remaining_ttl = entry.remaining_secs(now);
        Ok(RotateOutcome::Rotated {
            record,
            remaining_ttl,
        })
    }
}
