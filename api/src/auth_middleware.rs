use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use shared::Role;
use uuid::Uuid;

use crate::{error::ApiError, metrics, state::AppState};

pub const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";
pub const USER_GONE: &str = "The user belonging to this token no longer exists.";
pub const NOT_PERMITTED: &str = "You do not have permission to perform this action";

/// The authenticated caller, attached to the request by [`authenticate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn reject(reason: &'static str, err: ApiError) -> ApiError {
    metrics::AUTH_FAILURES.with_label_values(&[reason]).inc();
    err
}

/// Resolve the bearer token to a live account and attach its [`Principal`]
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let Some(token) = bearer_token(&request) else {
            return Err(reject("missing_token", ApiError::unauthorized(NOT_LOGGED_IN)));
        };
        state
            .tokens
            .verify(token)
            .map_err(|err| reject("invalid_token", err.into()))?
    };

    // The stored role wins over the one baked into the token.
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| reject("user_gone", ApiError::unauthorized(USER_GONE)))?;

    request.extensions_mut().insert(Principal {
        id: user.id,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Roles allowed through a [`restrict_to`] layer
#[derive(Debug, Clone, Copy)]
pub struct RoleGuard {
    allowed: &'static [Role],
}

impl RoleGuard {
    pub const fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }
}

pub const ADMIN_ONLY: RoleGuard = RoleGuard::new(&[Role::Admin]);

pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden(NOT_PERMITTED))
    }
}

/// Must run after [`authenticate`]
pub async fn restrict_to(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .copied()
        .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))?;

    if let Err(err) = authorize(&principal, guard.allowed) {
        metrics::AUTH_FAILURES.with_label_values(&["forbidden"]).inc();
        tracing::debug!(user_id = %principal.id, role = %principal.role, "role not permitted");
        return Err(err);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::Service;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn authorize_is_a_membership_check() {
        assert!(authorize(&principal(Role::Admin), &[Role::Admin]).is_ok());
        assert!(authorize(&principal(Role::User), &[Role::User, Role::Admin]).is_ok());

        let err = authorize(&principal(Role::User), &[Role::Admin]).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), NOT_PERMITTED);
    }

    #[test]
    fn bearer_token_parsing() {
        let with = |value: &str| {
            axum::http::Request::builder()
                .header(AUTHORIZATION, value)
                .body(Body::empty())
                .unwrap()
        };
        assert_eq!(bearer_token(&with("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&with("Basic abc")), None);
        assert_eq!(bearer_token(&with("Bearer   ")), None);
        assert_eq!(bearer_token(&axum::http::Request::new(Body::empty())), None);
    }

    async fn call(app: &Router<()>, request: Request<Body>) -> Response {
        let mut svc = app.clone();
        svc.call(request).await.unwrap()
    }

    fn guarded(with: Option<Principal>) -> Router<()> {
        let inject = move |mut request: Request, next: Next| async move {
            if let Some(p) = with {
                request.extensions_mut().insert(p);
            }
            next.run(request).await
        };
        Router::new()
            .route("/admin", get(|p: Principal| async move { p.role.to_string() }))
            .layer(middleware::from_fn_with_state(ADMIN_ONLY, restrict_to))
            .layer(middleware::from_fn(inject))
    }

    #[tokio::test]
    async fn restrict_to_blocks_other_roles() {
        let request = || axum::http::Request::builder().uri("/admin").body(Body::empty()).unwrap();

        let response = call(&guarded(Some(principal(Role::User))), request()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = call(&guarded(Some(principal(Role::Admin))), request()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(&guarded(None), request()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
