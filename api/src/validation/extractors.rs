//! Custom Axum extractors for validated input
//!
//! This module provides `ValidatedJson<T>` - a drop-in replacement for `Json<T>`
//! that runs the validation chain of `T` over the raw JSON body before
//! deserializing it.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::chain::ValidationChain;
use crate::error::ApiError;

/// A field-level validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Violations collected by one run of a rule set, in rule order
#[derive(Debug)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn first_message(&self) -> &str {
        self.errors
            .first()
            .map(|e| e.message.as_str())
            .unwrap_or("Validation failed")
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.first_message())
    }
}

/// Request bodies that are guarded by a validation chain
pub trait Validatable: Sized {
    fn chain() -> &'static ValidationChain;
}

/// Custom JSON extractor that validates and sanitizes input
///
/// Use this instead of `Json<T>` to automatically:
/// 1. Parse the request body as JSON
/// 2. Drop every field that is not on the operation's allow-list
/// 3. Run the operation's rules, rewriting values as they go
/// 4. Return a 400 carrying the first violation, or deserialize into `T`
///
/// # Example
///
/// ```ignore
/// use crate::validation::ValidatedJson;
///
/// pub async fn create_user(
///     ValidatedJson(req): ValidatedJson<CreateUserRequest>,
/// ) -> impl IntoResponse {
///     // req is already sanitized and validated
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validatable + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(map_json_rejection)?;

        T::chain().run(&mut body)?;

        let data = serde_json::from_value::<T>(body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;

        Ok(ValidatedJson(data))
    }
}

fn map_json_rejection(err: JsonRejection) -> ApiError {
    let message = match err {
        JsonRejection::JsonDataError(e) => format!("Invalid JSON data: {}", e.body_text()),
        JsonRejection::JsonSyntaxError(e) => format!("JSON syntax error: {}", e.body_text()),
        JsonRejection::MissingJsonContentType(_) => {
            "Content-Type must be application/json".to_string()
        }
        JsonRejection::BytesRejection(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large");
        }
        JsonRejection::BytesRejection(_) => "Failed to read request body".to_string(),
        _ => "Invalid JSON payload".to_string(),
    };
    ApiError::bad_request(message)
}

// Implement Deref for ergonomic access
impl<T> std::ops::Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::ops::DerefMut for ValidatedJson<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Builder for accumulating validation errors
#[derive(Debug, Default)]
pub struct ValidationBuilder {
    errors: Vec<FieldError>,
}

impl ValidationBuilder {
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    /// Add an error if the result is Err
    pub fn check<F>(&mut self, field: &str, validator: F) -> &mut Self
    where
        F: FnOnce() -> Result<(), String>,
    {
        if let Err(message) = validator() {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    /// Finish building and return Result
    pub fn build(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::chain;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Login {
        email: String,
        password: String,
    }

    impl Validatable for Login {
        fn chain() -> &'static ValidationChain {
            &chain::LOGIN
        }
    }

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_field_error() {
        let error = FieldError::new("email", "is required");
        assert_eq!(error.field, "email");
        assert_eq!(error.message, "is required");
    }

    #[test]
    fn test_validation_builder() {
        let mut builder = ValidationBuilder::new();

        builder
            .check("email", || Err("Please provide a valid email".to_string()))
            .check("password", || Ok(()))
            .check("firstName", || Err("firstName is required".to_string()));

        let errors = builder.build().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "email");
        assert_eq!(errors[1].field, "firstName");
    }

    #[test]
    fn test_first_message_becomes_api_error() {
        let err = ValidationError::new(vec![
            FieldError::new("email", "first"),
            FieldError::new("password", "second"),
        ]);
        let api: ApiError = err.into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.message(), "first");
    }

    #[tokio::test]
    async fn test_extractor_sanitizes_and_deserializes() {
        let req = json_request(r#"{"email":" Me@Example.com ","password":"pw","admin":true}"#);
        let ValidatedJson(login) = ValidatedJson::<Login>::from_request(req, &())
            .await
            .unwrap();
        assert_eq!(login.email, "me@example.com");
        assert_eq!(login.password, "pw");
    }

    #[tokio::test]
    async fn test_extractor_rejects_with_first_message() {
        let req = json_request(r#"{"email":"me@example.com"}"#);
        let err = ValidatedJson::<Login>::from_request(req, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.message(), "Password is required");
    }

    #[tokio::test]
    async fn test_extractor_reports_syntax_errors() {
        let req = json_request("{not json");
        let err = ValidatedJson::<Login>::from_request(req, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().starts_with("JSON syntax error"));
    }

    #[tokio::test]
    async fn test_extractor_rejects_wrong_types_after_validation() {
        // a numeric password passes the presence check but is not a string
        let req = json_request(r#"{"email":"me@example.com","password":12345}"#);
        let err = ValidatedJson::<Login>::from_request(req, &())
            .await
            .err()
            .unwrap();
        assert!(err.message().starts_with("Invalid request body"));
    }
}
