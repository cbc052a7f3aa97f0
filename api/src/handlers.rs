use axum::{extract::State, http::Uri, Json};
use serde_json::{json, Value};

use crate::{doc::HealthSchema, error::ApiError, state::AppState};

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is up", body = HealthSchema)),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.started_at.elapsed().as_secs();
    Json(json!({
        "status": "success",
        "message": "Server is healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_secs": uptime
    }))
}

pub async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server", uri))
}
