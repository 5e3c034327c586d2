use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, CookiePolicy};
use crate::configuration::JwtSettings;
use crate::middleware::{AccessGuard, RefreshGuard};
use crate::routes::{health_check, me, refresh, sign_in, sign_out, sign_up};
use crate::session::SessionStore;
use crate::users::UserDirectory;

pub fn run(
    listener: TcpListener,
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    jwt: JwtSettings,
    cookies_secure: bool,
) -> Result<Server, std::io::Error> {
    let policy = CookiePolicy {
        secure: cookies_secure,
    };

    let auth_service = web::Data::new(AuthService::new(
        Arc::clone(&users),
        Arc::clone(&sessions),
        jwt.clone(),
    ));
    let jwt_data = web::Data::new(jwt.clone());
    let policy_data = web::Data::new(policy.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())

            // Shared state
            .app_data(auth_service.clone())
            .app_data(jwt_data.clone())
            .app_data(policy_data.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))

            .service(
                web::scope("/api/v1/auth")
                    .route("/sign-up", web::post().to(sign_up))
                    .route("/sign-in", web::post().to(sign_in))

                    // The refresh guard owns reuse detection and must run
                    // before the handler
                    .service(
                        web::resource("/refresh")
                            .wrap(RefreshGuard::new(
                                jwt.clone(),
                                Arc::clone(&sessions),
                                policy.clone(),
                            ))
                            .route(web::post().to(refresh)),
                    )

                    // Protected routes (require a live session)
                    .service(
                        web::resource("/sign-out")
                            .wrap(AccessGuard::new(jwt.clone(), Arc::clone(&sessions)))
                            .route(web::post().to(sign_out)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(AccessGuard::new(jwt.clone(), Arc::clone(&sessions)))
                            .route(web::get().to(me)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
