/// Auth cookie construction
///
/// Both tokens travel in httpOnly cookies, never in response bodies. Path
/// scoping keeps the refresh token off every request except the refresh
/// endpoint itself. Clearing uses removal cookies with the same name/path
/// so browsers reliably drop the stale pair.

use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};

use crate::configuration::JwtSettings;

pub const ACCESS_TOKEN_NAME: &str = "papertrail_access";
pub const REFRESH_TOKEN_NAME: &str = "papertrail_refresh";

const ACCESS_COOKIE_PATH: &str = "/api";
const REFRESH_COOKIE_PATH: &str = "/api/v1/auth/refresh";

/// Whether cookies carry the Secure flag (production only)
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
}

pub fn access_cookie(token: &str, jwt: &JwtSettings, policy: &CookiePolicy) -> Cookie<'static> {
    Cookie::build(ACCESS_TOKEN_NAME, token.to_string())
        .path(ACCESS_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(policy.secure)
        .max_age(Duration::seconds(jwt.access_token_expiry))
        .finish()
}

pub fn refresh_cookie(token: &str, jwt: &JwtSettings, policy: &CookiePolicy) -> Cookie<'static> {
    Cookie::build(REFRESH_TOKEN_NAME, token.to_string())
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(policy.secure)
        .max_age(Duration::seconds(jwt.refresh_token_expiry))
        .finish()
}

pub fn clear_access_cookie(policy: &CookiePolicy) -> Cookie<'static> {
    let mut cookie = Cookie::build(ACCESS_TOKEN_NAME, "")
        .path(ACCESS_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(policy.secure)
        .finish();
    cookie.make_removal();
    cookie
}

pub fn clear_refresh_cookie(policy: &CookiePolicy) -> Cookie<'static> {
    let mut cookie = Cookie::build(REFRESH_TOKEN_NAME, "")
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(policy.secure)
        .finish();
    cookie.make_removal();
    cookie
}
