/// Token signing and verification
///
/// HS256 signing of the two claim sets. Access and refresh tokens use
/// distinct secrets: a leaked access token can never pass refresh-side
/// verification. Verification enforces algorithm, expiry, and issuer, with
/// a small leeway absorbing clock skew between issuance and verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};

/// Generate a signed access token bound to a session
pub fn sign_access_token(
    user_id: &Uuid,
    session_id: &str,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = AccessClaims::new(
        *user_id,
        session_id,
        config.access_token_expiry,
        config.issuer.clone(),
    );
    sign(&claims, &config.access_secret)
}

/// Generate a signed refresh token bound to a session and rotation jti
pub fn sign_refresh_token(
    user_id: &Uuid,
    session_id: &str,
    jti: &str,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = RefreshClaims::new(
        *user_id,
        session_id,
        jti,
        config.refresh_token_expiry,
        config.issuer.clone(),
    );
    sign(&claims, &config.refresh_secret)
}

/// Validate and extract claims from an access token
///
/// # Errors
/// Classifies failures as `Expired`, `InvalidSignature`, `IssuerMismatch`,
/// or `Malformed`
pub fn verify_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, TokenError> {
    verify(token, &config.access_secret, config)
}

/// Validate and extract claims from a refresh token
///
/// Signature verification alone does not make a refresh token valid; the
/// caller must still match `jti` against the live session record.
pub fn verify_refresh_token(
    token: &str,
    config: &JwtSettings,
) -> Result<RefreshClaims, TokenError> {
    verify(token, &config.refresh_secret, config)
}

fn sign<C: Serialize>(claims: &C, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

fn verify<C: DeserializeOwned>(
    token: &str,
    secret: &str,
    config: &JwtSettings,
) -> Result<C, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = config.clock_tolerance;

    decode::<C>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| classify(e))
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
        _ => TokenError::Malformed,
    }
}
