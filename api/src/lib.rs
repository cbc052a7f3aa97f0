//! Accounts API: user management over HTTP with validated input and
//! token-based authentication.

pub mod auth;
pub mod auth_handlers;
pub mod auth_middleware;
pub mod config;
pub mod doc;
pub mod email_templates;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod metrics;
pub mod metrics_handler;
pub mod observability;
pub mod rate_limit;
pub mod routes;
pub mod security_headers;
pub mod state;
pub mod storage;
pub mod store;
pub mod user_handlers;
pub mod validation;

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::rate_limit::RateLimitState;
use crate::state::AppState;

/// The full application minus CORS, which depends on deployment config
pub fn build_router(state: AppState, rate_limit_state: RateLimitState) -> Router {
    let router = Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(doc::swagger_ui())
        .fallback(handlers::route_not_found)
        .layer(middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn(observability::request_logger))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    security_headers::with_security_headers(router)
}
