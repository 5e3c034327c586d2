/// In-memory user directory
///
/// Backing double for tests and local development. Enforces the same email
/// uniqueness the Postgres schema enforces with its unique constraint.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::users::directory::{NewUser, User, UserDirectory, UserProfile};

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.lock().await.len()
    }

    /// Drop a user row, simulating out-of-band deletion. Sessions pointing
    /// at the removed user become orphans the auth engine must self-heal.
    pub async fn remove(&self, id: Uuid) {
        self.users.lock().await.remove(&id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let users = self.users.lock().await;
        Ok(users.values().any(|u| u.email == email))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.get(&id).map(|u| UserProfile {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            profile_picture: u.profile_picture.clone(),
            onboarding_step: u.onboarding_step,
        }))
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;

        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: None,
            profile_picture: None,
            onboarding_step: 1,
            created_at: Utc::now(),
            updated_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let directory = InMemoryUserDirectory::new();
        let user = directory.insert(new_user("a@x.com")).await.unwrap();

        assert!(directory.exists_by_email("a@x.com").await.unwrap());
        let found = directory.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let profile = directory.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(profile.email, "a@x.com");
        assert_eq!(profile.onboarding_step, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let directory = InMemoryUserDirectory::new();
        directory.insert(new_user("a@x.com")).await.unwrap();

        let result = directory.insert(new_user("a@x.com")).await;
        assert!(matches!(
            result,
            Err(StoreError::UniqueConstraintViolation(_))
        ));
        assert_eq!(directory.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_email_matching_is_case_sensitive() {
        let directory = InMemoryUserDirectory::new();
        directory.insert(new_user("User@x.com")).await.unwrap();

        // Exact-string matching, no normalization
        assert!(!directory.exists_by_email("user@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_makes_user_unfindable() {
        let directory = InMemoryUserDirectory::new();
        let user = directory.insert(new_user("a@x.com")).await.unwrap();

        directory.remove(user.id).await;
        assert!(directory.find_by_id(user.id).await.unwrap().is_none());
    }
}
