use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::{
    AuthResponse, CreateUserRequest, NewUser, ProfilePictureRequest, UpdateUserRequest,
    UserChanges, UserListResponse, UserResponse,
};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    auth_middleware::Principal,
    doc::{
        AuthResponseSchema, CreateUserSchema, ErrorSchema, ProfilePictureSchema,
        UpdateUserSchema, UserListResponseSchema, UserResponseSchema,
    },
    error::{ApiError, ApiResult},
    mailer::{self, Email},
    metrics,
    state::AppState,
    storage::picture_key,
    validation::ValidatedJson,
};

const USER_NOT_FOUND: &str = "User not found";

fn parse_user_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid user id"))
}

async fn changes_from(state: &AppState, payload: UpdateUserRequest) -> ApiResult<UserChanges> {
    let password_hash = match payload.password {
        Some(password) => Some(hash_password(password, state.bcrypt_cost).await?),
        None => None,
    };
    Ok(UserChanges {
        email: payload.email,
        password_hash,
        first_name: payload.first_name,
        last_name: payload.last_name,
    })
}

async fn apply_update(state: &AppState, id: Uuid, payload: UpdateUserRequest) -> ApiResult<Json<UserResponse>> {
    let changes = changes_from(state, payload).await?;
    let user = if changes.is_empty() {
        state.users.find_by_id(id).await?
    } else {
        state.users.update(id, changes).await?
    }
    .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    tracing::info!(user_id = %user.id, "user updated");
    Ok(Json(UserResponse::success(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserSchema,
    responses(
        (status = 201, description = "Account created", body = AuthResponseSchema),
        (status = 400, description = "Invalid input", body = ErrorSchema)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let password_hash = hash_password(payload.password, state.bcrypt_cost).await?;
    let user = state
        .users
        .insert(NewUser {
            email: payload.email,
            password_hash,
            first_name: payload.first_name,
            last_name: payload.last_name,
            role: payload.role.unwrap_or_default(),
            is_active: payload.is_active.unwrap_or(true),
        })
        .await?;

    let token = state.tokens.issue(&user)?;
    metrics::USERS_CREATED.inc();
    tracing::info!(user_id = %user.id, role = %user.role, "user created");

    mailer::notify(
        state.mailer.clone(),
        Email::welcome(&user.email, &state.email_from, &user.first_name),
    );

    Ok((StatusCode::CREATED, Json(AuthResponse::success(token, user))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "All accounts", body = UserListResponseSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema),
        (status = 403, description = "Not an administrator", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UserListResponse>> {
    let users = state.users.list().await?;
    Ok(Json(UserListResponse::success(users)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "The account", body = UserResponseSchema),
        (status = 400, description = "Invalid input", body = ErrorSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema),
        (status = 403, description = "Not an administrator", body = ErrorSchema),
        (status = 404, description = "User not found", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<UserResponse>> {
    let id = parse_user_id(&id)?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    Ok(Json(UserResponse::success(user)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserSchema,
    responses(
        (status = 200, description = "Updated account", body = UserResponseSchema),
        (status = 400, description = "Invalid input", body = ErrorSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema),
        (status = 403, description = "Not an administrator", body = ErrorSchema),
        (status = 404, description = "User not found", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_user_id(&id)?;
    apply_update(&state, id, payload).await
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Invalid input", body = ErrorSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema),
        (status = 403, description = "Not an administrator", body = ErrorSchema),
        (status = 404, description = "User not found", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_user_id(&id)?;
    let picture = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?
        .profile_picture;

    if !state.users.delete(id).await? {
        return Err(ApiError::not_found(USER_NOT_FOUND));
    }
    if let Some(locator) = picture {
        discard_picture(&state, &locator).await;
    }

    tracing::info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "The caller's account", body = UserResponseSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema),
        (status = 404, description = "User not found", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn get_me(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<UserResponse>> {
    let user = state
        .users
        .find_by_id(principal.id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    Ok(Json(UserResponse::success(user)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body = UpdateUserSchema,
    responses(
        (status = 200, description = "Updated account", body = UserResponseSchema),
        (status = 400, description = "Invalid input", body = ErrorSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema),
        (status = 404, description = "User not found", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    apply_update(&state, principal.id, payload).await
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me/picture",
    request_body = ProfilePictureSchema,
    responses(
        (status = 200, description = "Picture stored", body = UserResponseSchema),
        (status = 400, description = "Invalid input", body = ErrorSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema),
        (status = 404, description = "User not found", body = ErrorSchema),
        (status = 413, description = "Request body is too large", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn upload_picture(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<ProfilePictureRequest>,
) -> ApiResult<Json<UserResponse>> {
    let bytes = STANDARD
        .decode(payload.image.as_bytes())
        .map_err(|_| ApiError::bad_request("Image must be base64 encoded"))?;

    let previous = state
        .users
        .find_by_id(principal.id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?
        .profile_picture;

    let key = picture_key(principal.id, &payload.mime_type);
    let size = bytes.len();
    let locator = state.storage.put(&key, bytes, &payload.mime_type).await?;

    let user = match state
        .users
        .set_profile_picture(principal.id, Some(locator.clone()))
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            discard_picture(&state, &locator).await;
            return Err(ApiError::not_found(USER_NOT_FOUND));
        }
        Err(err) => {
            discard_picture(&state, &locator).await;
            return Err(err.into());
        }
    };

    if let Some(old) = previous {
        discard_picture(&state, &old).await;
    }

    metrics::PICTURE_UPLOADS.inc();
    tracing::info!(user_id = %user.id, size, %key, "profile picture stored");
    Ok(Json(UserResponse::success(user)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/me/picture",
    responses(
        (status = 200, description = "Picture removed", body = UserResponseSchema),
        (status = 401, description = "Not logged in", body = ErrorSchema),
        (status = 404, description = "User not found", body = ErrorSchema)
    ),
    security(("bearerAuth" = [])),
    tag = "users"
)]
pub async fn delete_picture(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<UserResponse>> {
    let previous = state
        .users
        .find_by_id(principal.id)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?
        .profile_picture;

    let user = state
        .users
        .set_profile_picture(principal.id, None)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    if let Some(old) = previous {
        discard_picture(&state, &old).await;
    }
    Ok(Json(UserResponse::success(user)))
}

/// Best-effort removal; the user record no longer references the object
async fn discard_picture(state: &AppState, locator: &str) {
    if let Err(err) = state.storage.delete(locator).await {
        tracing::warn!(%locator, error = %err, "failed to delete stored picture");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_must_be_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);

        let err = parse_user_id("42").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid user id");
    }
}
