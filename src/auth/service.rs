/// Auth Engine
///
/// Orchestrates sign-up, sign-in, sign-out, refresh, and profile lookup over
/// the injected user directory and session store. Store handles are
/// explicit, process-wide dependencies passed to the constructor, which is
/// also what lets the tests run against in-memory doubles.
///
/// Session lifecycle: a session is ACTIVE while its record lives in the
/// store, with exactly one valid refresh jti at a time. Every successful
/// refresh replaces the jti; sign-out and reuse detection delete the record.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{sign_access_token, sign_refresh_token};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, StoreError};
use crate::session::{
    generate_refresh_jti, generate_session_id, RotateOutcome, SessionRecord, SessionStore,
    STORE_CALL_TIMEOUT,
};
use crate::users::{NewUser, UserDirectory, UserProfile};

/// Freshly signed access + refresh token pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful sign-up or sign-in
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user_id: Uuid,
    pub session_id: String,
    pub tokens: TokenPair,
}

pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    jwt: JwtSettings,
}

/// Every store call runs under a deadline; a slow backend fails the request
/// instead of hanging it
async fn bounded<T>(
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(STORE_CALL_TIMEOUT, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Store(StoreError::Timeout(
            "store call exceeded deadline".to_string(),
        ))),
    }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        jwt: JwtSettings,
    ) -> Self {
        Self {
            users,
            sessions,
            jwt,
        }
    }

    /// Register a new user and open a session for it
    ///
    /// # Errors
    /// - `EmailInUse` if the email is already registered (reported to the
    ///   client; not security-sensitive)
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<IssuedSession, AppError> {
        if bounded(self.users.exists_by_email(email)).await? {
            return Err(AuthError::EmailInUse.into());
        }

        // Argon2 is deliberately expensive; keep it off the request
        // dispatch path
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))??;

        let inserted = bounded(self.users.insert(NewUser {
            email: email.to_string(),
            password_hash,
        }))
        .await;

        let user = match inserted {
            Ok(user) => user,
            // The unique constraint is the authoritative guard against a
            // concurrent sign-up slipping past the existence check
            Err(AppError::Store(StoreError::UniqueConstraintViolation(_))) => {
                return Err(AuthError::EmailInUse.into());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(user_id = %user.id, "User registered successfully");

        self.open_session(user.id).await
    }

    /// Authenticate an existing user and open a session for it
    ///
    /// # Errors
    /// - `InvalidCredentials` whether the email is unknown or the password
    ///   is wrong; the client cannot tell which
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<IssuedSession, AppError> {
        let user = match bounded(self.users.find_by_email(email)).await? {
            Some(user) => user,
            None => return Err(AuthError::InvalidCredentials.into()),
        };

        let password = password.to_string();
        let stored_hash = user.password_hash.clone();
        let password_matches =
            tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
                .await
                .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?;

        if !password_matches {
            return Err(AuthError::InvalidCredentials.into());
        }

        tracing::info!(user_id = %user.id, "User signed in successfully");

        self.open_session(user.id).await
    }

    /// Delete the session record. Idempotent: signing out an already-dead
    /// session is not an error.
    pub async fn sign_out(&self, session_id: &str) -> Result<(), AppError> {
        bounded(self.sessions.del(session_id)).await?;
        tracing::info!(session_id, "Session signed out");
        Ok(())
    }

    /// Rotate the refresh token for a session
    ///
    /// The refresh guard has already matched `presented_jti` against the
    /// live record; the checks here close the window between the guard and
    /// the rotation. The session's absolute expiry carries over unchanged,
    /// so a chain of refreshes cannot extend a session indefinitely.
    pub async fn refresh(
        &self,
        session_id: &str,
        user_id: Uuid,
        presented_jti: &str,
    ) -> Result<TokenPair, AppError> {
        let session = bounded(self.sessions.get(session_id))
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if session.refresh_token_jti != presented_jti {
            // The presented token was superseded after the guard ran;
            // treat it as reuse and revoke
            bounded(self.sessions.del(session_id)).await?;
            return Err(AuthError::ReuseDetected.into());
        }

        let remaining = bounded(self.sessions.ttl(session_id)).await?;
        if remaining <= 0 {
            return Err(AuthError::SessionExpired.into());
        }

        let new_jti = generate_refresh_jti();
        let outcome = bounded(self.sessions.rotate_jti(
            session_id,
            presented_jti,
            &new_jti,
            Utc::now(),
        ))
        .await?;

        match outcome {
            RotateOutcome::Rotated { .. } => {}
            RotateOutcome::Missing => return Err(AuthError::Unauthorized.into()),
            RotateOutcome::Stale => {
                // Lost the swap to a concurrent refresh holding the same
                // jti - same reuse signal as a replayed token
                bounded(self.sessions.del(session_id)).await?;
                return Err(AuthError::ReuseDetected.into());
            }
        }

        let access_token = sign_access_token(&user_id, session_id, &self.jwt)?;
        let refresh_token = sign_refresh_token(&user_id, session_id, &new_jti, &self.jwt)?;

        tracing::info!(session_id, "Refresh token rotated");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Look up the authenticated user's profile
    ///
    /// A session whose user row has vanished is revoked on sight so the
    /// orphaned credentials cannot be presented again.
    pub async fn me(&self, user_id: Uuid, session_id: &str) -> Result<UserProfile, AppError> {
        match bounded(self.users.find_by_id(user_id)).await? {
            Some(profile) => Ok(profile),
            None => {
                bounded(self.sessions.del(session_id)).await?;
                tracing::warn!(session_id, "Session referenced a missing user, revoked");
                Err(AuthError::Unauthorized.into())
            }
        }
    }

    async fn open_session(&self, user_id: Uuid) -> Result<IssuedSession, AppError> {
        let session_id = generate_session_id();
        let refresh_jti = generate_refresh_jti();

        let record = SessionRecord::new(user_id, refresh_jti.clone());
        bounded(
            self.sessions
                .set(&session_id, &record, self.jwt.refresh_token_expiry),
        )
        .await?;

        let access_token = sign_access_token(&user_id, &session_id, &self.jwt)?;
        let refresh_token = sign_refresh_token(&user_id, &session_id, &refresh_jti, &self.jwt)?;

        Ok(IssuedSession {
            user_id,
            session_id,
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }
}
