/// Refresh Guard Middleware
///
/// Gates the refresh endpoint on the refresh-token cookie, and owns reuse
/// detection: a verified token whose `jti` no longer matches the session
/// record is a superseded (possibly stolen) token, so the session is revoked
/// on the spot. Every failure path clears both auth cookies so the client
/// cannot retry with the stale pair.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{
    clear_access_cookie, clear_refresh_cookie, verify_refresh_token, CookiePolicy,
    REFRESH_TOKEN_NAME,
};
use crate::configuration::JwtSettings;
use crate::session::{SessionStore, STORE_CALL_TIMEOUT};

/// Identity attached to requests that passed the refresh guard
#[derive(Debug, Clone)]
pub struct RefreshContext {
    pub user_id: Uuid,
    pub session_id: String,
    pub jti: String,
}

pub struct RefreshGuard {
    jwt: JwtSettings,
    sessions: Arc<dyn SessionStore>,
    policy: CookiePolicy,
}

impl RefreshGuard {
    pub fn new(jwt: JwtSettings, sessions: Arc<dyn SessionStore>, policy: CookiePolicy) -> Self {
        Self {
            jwt,
            sessions,
            policy,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RefreshGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RefreshGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RefreshGuardService {
            service: Rc::new(service),
            jwt: self.jwt.clone(),
            sessions: Arc::clone(&self.sessions),
            policy: self.policy.clone(),
        }))
    }
}

pub struct RefreshGuardService<S> {
    service: Rc<S>,
    jwt: JwtSettings,
    sessions: Arc<dyn SessionStore>,
    policy: CookiePolicy,
}

impl<S, B> Service<ServiceRequest> for RefreshGuardService<S>
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
        let policy = self.policy.clone();

        Box::pin(async move {
            let token = match req.cookie(REFRESH_TOKEN_NAME) {
                Some(cookie) => cookie.value().to_string(),
                None => {
                    tracing::warn!("Missing refresh token cookie");
                    return Err(unauthorized_cleared(&policy));
                }
            };

            // Typed claims make the decode schema-checked: sub, sid, and
            // jti must all be present for verification to succeed
            let claims = match verify_refresh_token(&token, &jwt) {
                Ok(claims) => claims,
                Err(e) => {
                    tracing::warn!("Refresh token rejected: {}", e);
                    return Err(unauthorized_cleared(&policy));
                }
            };

            let user_id = match claims.user_id() {
                Ok(id) => id,
                Err(_) => {
                    tracing::warn!("Refresh token subject is not a valid user id");
                    return Err(unauthorized_cleared(&policy));
                }
            };

            let session = match tokio::time::timeout(
                STORE_CALL_TIMEOUT,
                sessions.get(&claims.sid),
            )
            .await
            {
                Ok(Ok(Some(session))) => session,
                Ok(Ok(None)) => {
                    tracing::warn!(session_id = %claims.sid, "No live session for refresh token");
                    return Err(unauthorized_cleared(&policy));
                }
                Ok(Err(e)) => {
                    tracing::error!("Session lookup failed: {}", e);
                    return Err(internal_error());
                }
                Err(_) => {
                    tracing::error!("Session lookup timed out");
                    return Err(internal_error());
                }
            };

            if claims.jti != session.refresh_token_jti {
                // The presented token was superseded by a rotation: either
                // a stale client or a stolen token. Revoke the session so
                // neither party can continue.
                tracing::warn!(
                    session_id = %claims.sid,
                    "Refresh token reuse detected, revoking session"
                );
                match tokio::time::timeout(STORE_CALL_TIMEOUT, sessions.del(&claims.sid)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("Session revocation failed: {}", e),
                    Err(_) => tracing::error!("Session revocation timed out"),
                }
                return Err(unauthorized_cleared(&policy));
            }

            req.extensions_mut().insert(RefreshContext {
                user_id,
                session_id: claims.sid,
                jti: claims.jti,
            });

            service.call(req).await
        })
    }
}

fn unauthorized_cleared(policy: &CookiePolicy) -> Error {
    let response = HttpResponse::Unauthorized()
        .cookie(clear_access_cookie(policy))
        .cookie(clear_refresh_cookie(policy))
        .json(serde_json::json!({
            "error": "Missing or invalid refresh token",
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
