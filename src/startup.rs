use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, middleware::Logger, web, App, HttpRequest, HttpServer};
use std::net::TcpListener;

use crate::error::{AppError, ValidationError};
use crate::middleware::{JwtMiddleware, RequestLogger};
use crate::routes::{
    get_current_account, health_check, login, logout, refresh, register, CookiePolicy,
};
use crate::session::SessionManager;

/// Malformed JSON bodies use the same error envelope as every other failure
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!("Rejected request body: {}", err);
    AppError::Validation(ValidationError::InvalidFormat("request body")).into()
}

pub fn run(
    listener: TcpListener,
    sessions: SessionManager,
    cookie_policy: CookiePolicy,
) -> Result<Server, std::io::Error> {
    let tokens = sessions.tokens().clone();
    let sessions = web::Data::new(sessions);
    let cookie_policy = web::Data::new(cookie_policy);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(RequestLogger)

            // Shared state
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(sessions.clone())
            .app_data(cookie_policy.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Routes that require an access token
            .service(
                web::scope("/auth")
                    .wrap(JwtMiddleware::new(tokens.clone()))
                    .route("/logout", web::post().to(logout))
                    .route("/me", web::get().to(get_current_account)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
