//! OpenAPI documentation.
//!
//! The wire types live in `shared`, which stays free of documentation
//! concerns. The schema types below mirror them field for field and are
//! registered under the same names, so the generated document reads as if
//! the models themselves were annotated.
//!
//! The document is served as JSON at `/api-docs/openapi.json` and browsed
//! through Swagger UI at `/api-docs`.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

pub const DOCS_PATH: &str = "/api-docs";
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

// ─────────────────────────────────────────────────────────────────────────────
// Schemas
// ─────────────────────────────────────────────────────────────────────────────

/// Access level of an account
#[derive(ToSchema)]
#[schema(as = Role, rename_all = "lowercase")]
pub enum RoleSchema {
    User,
    Admin,
}

/// A user account. Password hashes are never exposed.
#[derive(ToSchema)]
#[schema(as = User, rename_all = "camelCase")]
pub struct UserSchema {
    id: Uuid,
    #[schema(example = "ada@example.com")]
    email: String,
    #[schema(example = "Ada")]
    first_name: String,
    #[schema(example = "Lovelace")]
    last_name: String,
    role: RoleSchema,
    is_active: bool,
    /// Locator of the stored picture, if one was uploaded
    profile_picture: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(ToSchema)]
#[schema(as = CreateUserRequest, rename_all = "camelCase")]
pub struct CreateUserSchema {
    #[schema(example = "ada@example.com")]
    email: String,
    /// At least 8 characters with an uppercase letter, a lowercase letter,
    /// a digit and a symbol
    #[schema(example = "Password123!")]
    password: String,
    #[schema(example = "Ada", max_length = 50)]
    first_name: String,
    #[schema(example = "Lovelace", max_length = 50)]
    last_name: String,
    role: Option<RoleSchema>,
    is_active: Option<bool>,
}

/// Every field is optional. `role` and `isActive` are rejected.
#[derive(ToSchema)]
#[schema(as = UpdateUserRequest, rename_all = "camelCase")]
pub struct UpdateUserSchema {
    email: Option<String>,
    password: Option<String>,
    #[schema(max_length = 50)]
    first_name: Option<String>,
    #[schema(max_length = 50)]
    last_name: Option<String>,
}

#[derive(ToSchema)]
#[schema(as = LoginRequest)]
pub struct LoginSchema {
    #[schema(example = "ada@example.com")]
    email: String,
    #[schema(example = "Password123!")]
    password: String,
}

#[derive(ToSchema)]
#[schema(as = ProfilePictureRequest, rename_all = "camelCase")]
pub struct ProfilePictureSchema {
    /// Base64 image data, optionally as a `data:` URL. At most 5 MB decoded.
    image: String,
    #[schema(example = "image/png")]
    mime_type: String,
}

#[derive(ToSchema)]
#[schema(as = UserData)]
pub struct UserDataSchema {
    user: UserSchema,
}

#[derive(ToSchema)]
#[schema(as = UsersData)]
pub struct UsersDataSchema {
    users: Vec<UserSchema>,
}

/// Returned by signup and login
#[derive(ToSchema)]
#[schema(as = AuthResponse)]
pub struct AuthResponseSchema {
    #[schema(example = "success")]
    status: String,
    /// Bearer token for the `Authorization` header
    token: String,
    data: UserDataSchema,
}

#[derive(ToSchema)]
#[schema(as = UserResponse)]
pub struct UserResponseSchema {
    #[schema(example = "success")]
    status: String,
    data: UserDataSchema,
}

#[derive(ToSchema)]
#[schema(as = UserListResponse)]
pub struct UserListResponseSchema {
    #[schema(example = "success")]
    status: String,
    results: usize,
    data: UsersDataSchema,
}

#[derive(ToSchema)]
#[schema(as = MessageResponse)]
pub struct MessageResponseSchema {
    #[schema(example = "success")]
    status: String,
    #[schema(example = "Logged out successfully")]
    message: String,
}

/// Body of every failed request
#[derive(ToSchema)]
#[schema(as = Error)]
pub struct ErrorSchema {
    #[schema(example = "error")]
    status: String,
    #[schema(example = "Please provide a valid email")]
    message: String,
}

#[derive(ToSchema)]
#[schema(as = Health)]
pub struct HealthSchema {
    #[schema(example = "success")]
    status: String,
    #[schema(example = "Server is healthy")]
    message: String,
    timestamp: DateTime<Utc>,
    uptime_secs: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Document
// ─────────────────────────────────────────────────────────────────────────────

pub const BEARER_SCHEME: &str = "bearerAuth";

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            BEARER_SCHEME,
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Token returned by signup or POST /api/v1/auth/login"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "User Management API",
        description = "Accounts with validated input and token-based authentication.",
        license(name = "MIT")
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::handlers::health_check,
        crate::auth_handlers::login,
        crate::auth_handlers::logout,
        crate::user_handlers::create_user,
        crate::user_handlers::list_users,
        crate::user_handlers::get_user,
        crate::user_handlers::update_user,
        crate::user_handlers::delete_user,
        crate::user_handlers::get_me,
        crate::user_handlers::update_me,
        crate::user_handlers::upload_picture,
        crate::user_handlers::delete_picture,
    ),
    components(schemas(
        RoleSchema,
        UserSchema,
        CreateUserSchema,
        UpdateUserSchema,
        LoginSchema,
        ProfilePictureSchema,
        UserDataSchema,
        UsersDataSchema,
        AuthResponseSchema,
        UserResponseSchema,
        UserListResponseSchema,
        MessageResponseSchema,
        ErrorSchema,
        HealthSchema,
    )),
    tags(
        (name = "auth", description = "Login and logout"),
        (name = "users", description = "Account management"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// Swagger UI together with the JSON document it renders
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new(DOCS_PATH).url(OPENAPI_JSON_PATH, ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::openapi::schema::Schema;
    use utoipa::openapi::RefOr;

    fn assert_object_schema_has_field(schema: &RefOr<Schema>, field: &str) {
        match schema {
            RefOr::T(Schema::Object(obj)) => {
                assert!(
                    obj.properties.contains_key(field),
                    "schema should have field '{field}'"
                );
            }
            _ => panic!("expected Object schema"),
        }
    }

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/health",
            "/api/v1/auth/login",
            "/api/v1/auth/logout",
            "/api/v1/users",
            "/api/v1/users/{id}",
            "/api/v1/users/me",
            "/api/v1/users/me/picture",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn user_schema_uses_wire_names() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let user = schemas.get("User").expect("User schema");

        assert_object_schema_has_field(user, "firstName");
        assert_object_schema_has_field(user, "profilePicture");
        match user {
            RefOr::T(Schema::Object(obj)) => assert!(!obj.properties.contains_key("password")),
            _ => panic!("expected Object schema"),
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key(BEARER_SCHEME));
    }
}
