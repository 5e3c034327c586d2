/// User Directory contract
///
/// Email matching is exact-string: no case normalization is applied, the
/// stored value is whatever sign-up received. Users are never deleted
/// through this interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;

/// Full user record as stored
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub onboarding_step: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

/// Limited projection exposed to authenticated clients; the password hash
/// never leaves the directory through this type
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub onboarding_step: i32,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look up the limited profile projection by user id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    /// Insert a new user. The unique constraint on email is the
    /// authoritative guard against check-then-insert races; a violation
    /// surfaces as `StoreError::UniqueConstraintViolation`.
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError>;
}
