use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{
    auth_handlers,
    auth_middleware::{authenticate, restrict_to, ADMIN_ONLY},
    handlers, metrics_handler,
    state::AppState,
    user_handlers,
    validation::rules::MAX_PICTURE_BYTES,
};

/// Base64 of the largest accepted picture, plus room for a data URL prefix
/// and the rest of the JSON body
pub const PICTURE_BODY_LIMIT: usize = MAX_PICTURE_BYTES.div_ceil(3) * 4 + 64 * 1024;

pub fn observability_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(metrics_handler::metrics_endpoint))
}

/// Reachable without a token
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth_handlers::login))
        .route("/users", post(user_handlers::create_user))
}

/// Any authenticated account
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth_handlers::logout))
        .route(
            "/users/me",
            get(user_handlers::get_me).patch(user_handlers::update_me),
        )
        .route(
            "/users/me/picture",
            put(user_handlers::upload_picture)
                .delete(user_handlers::delete_picture)
                .layer(DefaultBodyLimit::max(PICTURE_BODY_LIMIT)),
        )
}

/// Administrators only
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(user_handlers::list_users))
        .route(
            "/users/:id",
            get(user_handlers::get_user)
                .patch(user_handlers::update_user)
                .delete(user_handlers::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(ADMIN_ONLY, restrict_to))
}

/// Everything served under `/api/v1`
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = account_routes()
        .merge(admin_routes())
        .route_layer(middleware::from_fn_with_state(state, authenticate));

    Router::new()
        .merge(observability_routes())
        .merge(public_routes())
        .merge(protected)
}
