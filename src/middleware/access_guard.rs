/// Access Guard Middleware
///
/// Gates protected routes on the access-token cookie. A token is accepted
/// only when its signature, expiry, and issuer verify AND a live session
/// still exists for its `sid` claim - a signed token outlives sign-out, the
/// session record does not. On success the caller identity is injected into
/// request extensions for route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{verify_access_token, ACCESS_TOKEN_NAME};
use crate::configuration::JwtSettings;
use crate::session::{SessionStore, STORE_CALL_TIMEOUT};

/// Identity attached to requests that passed the access guard
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub session_id: String,
}

/// Access guard for protecting routes
///
/// Must be applied to routes that require an authenticated session.
pub struct AccessGuard {
    jwt: JwtSettings,
    sessions: Arc<dyn SessionStore>,
}

impl AccessGuard {
    pub fn new(jwt: JwtSettings, sessions: Arc<dyn SessionStore>) -> Self {
        Self { jwt, sessions }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AccessGuardService {
            service: Rc::new(service),
            jwt: self.jwt.clone(),
            sessions: Arc::clone(&self.sessions),
        }))
    }
}

pub struct AccessGuardService<S> {
    service: Rc<S>,
    jwt: JwtSettings,
    sessions: Arc<dyn SessionStore>,
}

impl<S, B> Service<ServiceRequest> for AccessGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let jwt = self.jwt.clone();
        let sessions = Arc::clone(&self.sessions);

        Box::pin(async move {
            let token = match req.cookie(ACCESS_TOKEN_NAME) {
                Some(cookie) => cookie.value().to_string(),
                None => {
                    tracing::warn!("Missing access token cookie");
                    return Err(unauthorized("Missing access token"));
                }
            };

            let claims = match verify_access_token(&token, &jwt) {
                Ok(claims) => claims,
                Err(e) => {
                    tracing::warn!("Access token rejected: {}", e);
                    return Err(unauthorized("Invalid or expired token"));
                }
            };

            // Typed claims already guarantee sub and sid are present; the
            // subject must additionally parse as a user id
            let user_id = match claims.user_id() {
                Ok(id) => id,
                Err(_) => {
                    tracing::warn!("Access token subject is not a valid user id");
                    return Err(unauthorized("Invalid or expired token"));
                }
            };

            // Existence check only: access tokens carry no jti
            let session = match tokio::time::timeout(
                STORE_CALL_TIMEOUT,
                sessions.get(&claims.sid),
            )
            .await
            {
                Ok(Ok(session)) => session,
                Ok(Err(e)) => {
                    tracing::error!("Session lookup failed: {}", e);
                    return Err(internal_error());
                }
                Err(_) => {
                    tracing::error!("Session lookup timed out");
                    return Err(internal_error());
                }
            };

            if session.is_none() {
                tracing::warn!(session_id = %claims.sid, "No live session for access token");
                return Err(unauthorized("Invalid or expired token"));
            }

            tracing::debug!(
                user_id = %user_id,
                session_id = %claims.sid,
                "Access token validated"
            );

            req.extensions_mut().insert(AuthContext {
                user_id,
                session_id: claims.sid,
            });

            service.call(req).await
        })
    }
}

fn unauthorized(message: &str) -> Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "error": message,
        "code": "UNAUTHORIZED"
    }));
    actix_web::error::InternalError::from_response("Unauthorized", response).into()
}

fn internal_error() -> Error {
    let response = HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "Internal server error",
        "code": "INTERNAL_ERROR"
    }));
    actix_web::error::InternalError::from_response("Internal error", response).into()
}
