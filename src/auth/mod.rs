/// Authentication module
///
/// Token signing/verification, password hashing, cookie construction,
/// and the auth engine orchestrating the session lifecycle.

mod claims;
mod cookies;
mod password;
mod service;
mod token;

pub use claims::AccessClaims;
pub use claims::RefreshClaims;
pub use cookies::access_cookie;
pub use cookies::clear_access_cookie;
pub use cookies::clear_refresh_cookie;
pub use cookies::refresh_cookie;
pub use cookies::CookiePolicy;
pub use cookies::ACCESS_TOKEN_NAME;
pub use cookies::REFRESH_TOKEN_NAME;
pub use password::hash_password;
pub use password::validate_password;
pub use password::verify_password;
pub use service::AuthService;
pub use service::IssuedSession;
pub use service::TokenPair;
pub use token::sign_access_token;
pub use token::sign_refresh_token;
pub use token::verify_access_token;
pub use token::verify_refresh_token;
