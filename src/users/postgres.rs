/// Postgres-backed user directory
///
/// Queries run against the `users` table created by the migration in
/// `migrations/`. The connection pool is a shared, long-lived, process-wide
/// handle constructed at startup and injected here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::users::directory::{NewUser, User, UserDirectory, UserProfile};

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<
            _,
            (
                Uuid,
                String,
                String,
                Option<String>,
                Option<String>,
                i32,
                DateTime<Utc>,
                Option<DateTime<Utc>>,
            ),
        >(
            r#"
            SELECT id, email, password_hash, name, profile_picture,
                   onboarding_step, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(
                id,
                email,
                password_hash,
                name,
                profile_picture,
                onboarding_step,
                created_at,
                updated_at,
            )| User {
                id,
                email,
                password_hash,
                name,
                profile_picture,
                onboarding_step,
                created_at,
                updated_at,
            },
        ))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, Option<String>, i32)>(
            r#"
            SELECT id, email, name, profile_picture, onboarding_step
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, email, name, profile_picture, onboarding_step)| UserProfile {
                id,
                email,
                name,
                profile_picture,
                onboarding_step,
            },
        ))
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(id)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: None,
            profile_picture: None,
            onboarding_step: 1,
            created_at,
            updated_at: None,
        })
    }
}
