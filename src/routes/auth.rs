/// Authentication Routes
///
/// Handles sign-up, sign-in, sign-out, token refresh, and current user
/// information. Tokens never appear in response bodies; they ride in the
/// auth cookies set here. Guards run before the refresh/sign-out/me
/// handlers, so these handlers trust the identity in request extensions.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    access_cookie, clear_access_cookie, clear_refresh_cookie, refresh_cookie, validate_password,
    AuthService, CookiePolicy,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, ErrorHandler};
use crate::middleware::{AuthContext, RefreshContext};
use crate::validators::is_valid_email;

/// Sign-up request body
#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
}

/// Sign-in request body
#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

/// POST /api/v1/auth/sign-up
///
/// Register a new user with email and password, open a session, and set
/// both auth cookies.
///
/// # Errors
/// - 400: Validation errors (invalid email, password out of bounds)
/// - 400: Email already in use
/// - 500: Internal server error
pub async fn sign_up(
    form: web::Json<SignUpRequest>,
    service: web::Data<AuthService>,
    jwt: web::Data<JwtSettings>,
    policy: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    validate_password(&form.password)?;

    let issued = service.sign_up(&email, &form.password).await?;

    Ok(HttpResponse::Created()
        .cookie(access_cookie(&issued.tokens.access_token, &jwt, &policy))
        .cookie(refresh_cookie(&issued.tokens.refresh_token, &jwt, &policy))
        .json(ApiMessage {
            success: true,
            message: "User registered successfully.".to_string(),
        }))
}

/// POST /api/v1/auth/sign-in
///
/// Authenticate with email and password, open a fresh session, and set both
/// auth cookies.
///
/// # Security Notes
/// - Same error whether the email is unknown or the password is wrong,
///   preventing user enumeration
///
/// # Errors
/// - 400: Validation error (invalid email format)
/// - 400: Incorrect credentials
/// - 500: Internal server error
pub async fn sign_in(
    form: web::Json<SignInRequest>,
    service: web::Data<AuthService>,
    jwt: web::Data<JwtSettings>,
    policy: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;

    let issued = service.sign_in(&email, &form.password).await?;

    Ok(HttpResponse::Ok()
        .cookie(access_cookie(&issued.tokens.access_token, &jwt, &policy))
        .cookie(refresh_cookie(&issued.tokens.refresh_token, &jwt, &policy))
        .json(ApiMessage {
            success: true,
            message: "OK".to_string(),
        }))
}

/// POST /api/v1/auth/sign-out
///
/// Delete the session and clear both auth cookies. Requires a valid access
/// cookie (enforced by the access guard).
pub async fn sign_out(
    ctx: web::ReqData<AuthContext>,
    service: web::Data<AuthService>,
    policy: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    service.sign_out(&ctx.session_id).await?;

    Ok(HttpResponse::NoContent()
        .cookie(clear_access_cookie(&policy))
        .cookie(clear_refresh_cookie(&policy))
        .finish())
}

/// POST /api/v1/auth/refresh
///
/// Rotate the refresh token and issue a fresh cookie pair. The refresh
/// guard has already verified the token and matched its jti against the
/// session; any auth failure surfacing here still clears both cookies so
/// the client cannot retry with a stale pair.
pub async fn refresh(
    ctx: web::ReqData<RefreshContext>,
    service: web::Data<AuthService>,
    jwt: web::Data<JwtSettings>,
    policy: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    match service.refresh(&ctx.session_id, ctx.user_id, &ctx.jti).await {
        Ok(tokens) => Ok(HttpResponse::Ok()
            .cookie(access_cookie(&tokens.access_token, &jwt, &policy))
            .cookie(refresh_cookie(&tokens.refresh_token, &jwt, &policy))
            .json(ApiMessage {
                success: true,
                message: "OK".to_string(),
            })),
        Err(err @ AppError::Auth(_)) => Ok(auth_failure_with_cleared_cookies(err, &policy)),
        Err(err) => Err(err),
    }
}

/// GET /api/v1/auth/me
///
/// Return the authenticated user's profile. If the user row has vanished,
/// the engine revokes the session and the stale cookies are cleared here.
pub async fn me(
    ctx: web::ReqData<AuthContext>,
    service: web::Data<AuthService>,
    policy: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    match service.me(ctx.user_id, &ctx.session_id).await {
        Ok(profile) => Ok(HttpResponse::Ok().json(profile)),
        Err(err @ AppError::Auth(_)) => Ok(auth_failure_with_cleared_cookies(err, &policy)),
        Err(err) => Err(err),
    }
}

/// Build the error response an AppError would produce, with both auth
/// cookies cleared on top
fn auth_failure_with_cleared_cookies(err: AppError, policy: &CookiePolicy) -> HttpResponse {
    let request_id = uuid::Uuid::new_v4().to_string();
    err.log_error(&request_id);

    let (status, body) = ErrorHandler::error_response(&err, &request_id);

    HttpResponse::build(status)
        .cookie(clear_access_cookie(policy))
        .cookie(clear_refresh_cookie(policy))
        .json(body)
}
