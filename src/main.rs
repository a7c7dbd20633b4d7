use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use session_service::auth::TokenIssuer;
use session_service::configuration::get_configuration;
use session_service::routes::CookiePolicy;
use session_service::session::SessionManager;
use session_service::startup::run;
use session_service::store::{AccountStore, InMemoryAccountStore, PgAccountStore};
use session_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let store: Arc<dyn AccountStore> = match &configuration.database {
        Some(database) => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!("Failed to migrate the database: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
            })?;

            tracing::info!("Database connection pool created successfully");
            Arc::new(PgAccountStore::new(pool))
        }
        None => {
            tracing::warn!("No database configured; accounts are kept in memory");
            Arc::new(InMemoryAccountStore::new())
        }
    };

    let sessions = SessionManager::new(store, TokenIssuer::new(&configuration.jwt));
    let cookie_policy = CookiePolicy {
        secure: configuration.application.secure_cookies,
    };
    if !cookie_policy.secure {
        tracing::warn!("Session cookies are not marked Secure");
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, sessions, cookie_policy)?.await
}
