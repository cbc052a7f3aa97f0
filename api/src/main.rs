use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};

use api::auth::TokenService;
use api::config::AppConfig;
use api::mailer::{LogMailer, Mailer, SendGridMailer};
use api::observability::Observability;
use api::rate_limit::RateLimitState;
use api::state::AppState;
use api::storage::{DisabledStorage, HttpObjectStorage, ObjectStorage};
use api::store::{InMemoryUserStore, PgUserStore, UserStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    let obs = Observability::init()?;
    let config = AppConfig::from_env()?;

    let users: Arc<dyn UserStore> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;

            sqlx::migrate!("../database/migrations").run(&pool).await?;
            tracing::info!("Database connected and migrations applied");

            Arc::new(PgUserStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; accounts are kept in memory only");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let storage: Arc<dyn ObjectStorage> = match config.storage.clone() {
        Some(s) => Arc::new(HttpObjectStorage::new(s.endpoint, s.bucket, s.token, s.public_url)),
        None => {
            tracing::warn!("STORAGE_ENDPOINT is not set; profile picture uploads are disabled");
            Arc::new(DisabledStorage)
        }
    };

    let mailer: Arc<dyn Mailer> = match config.sendgrid_api_key.clone() {
        Some(key) => Arc::new(SendGridMailer::new(key)),
        None => {
            tracing::warn!("SENDGRID_API_KEY is not set; emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let state = AppState::new(
        users,
        storage,
        mailer,
        TokenService::new(&config.jwt_secret, config.jwt_ttl_secs),
        obs.registry,
    )
    .with_bcrypt_cost(config.bcrypt_cost)
    .with_email_from(config.email_from.clone());

    let app = api::build_router(state, RateLimitState::from_env()).layer(cors_layer(&config));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}
