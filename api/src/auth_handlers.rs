use axum::{extract::State, Json};
use shared::{AuthResponse, LoginRequest, MessageResponse};

use crate::{
    auth::verify_password,
    auth_middleware::Principal,
    doc::{AuthResponseSchema, ErrorSchema, LoginSchema, MessageResponseSchema},
    error::{ApiError, ApiResult},
    metrics,
    state::AppState,
    validation::ValidatedJson,
};

const BAD_CREDENTIALS: &str = "Incorrect email or password";

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginSchema,
    responses(
        (status = 200, description = "Logged in", body = AuthResponseSchema),
        (status = 400, description = "Invalid input", body = ErrorSchema),
        (status = 401, description = "Incorrect email or password", body = ErrorSchema)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let credentials = state
        .users
        .find_credentials_by_email(&payload.email)
        .await?;

    let Some(credentials) = credentials else {
        metrics::AUTH_FAILURES.with_label_values(&["bad_credentials"]).inc();
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    };

    if !verify_password(payload.password, credentials.password_hash).await? {
        metrics::AUTH_FAILURES.with_label_values(&["bad_credentials"]).inc();
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    }

    let user = credentials.user;
    let token = state.tokens.issue(&user)?;
    metrics::LOGINS_TOTAL.inc();
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(AuthResponse::success(token, user)))
}

/// Tokens are stateless; the client discards its copy
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponseSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "auth"
)]
pub async fn logout(principal: Principal) -> Json<MessageResponse> {
    tracing::info!(user_id = %principal.id, "user logged out");
    Json(MessageResponse::success("Logged out successfully"))
}
