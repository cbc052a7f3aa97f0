//! Validation chains for API request types
//!
//! This module wires each request body to the chain that guards it when it
//! is received through `ValidatedJson`.

use shared::models::{CreateUserRequest, LoginRequest, ProfilePictureRequest, UpdateUserRequest};

use super::chain::{self, ValidationChain};
use super::extractors::Validatable;

impl Validatable for CreateUserRequest {
    fn chain() -> &'static ValidationChain {
        &chain::CREATE_USER
    }
}

impl Validatable for UpdateUserRequest {
    fn chain() -> &'static ValidationChain {
        &chain::UPDATE_USER
    }
}

impl Validatable for LoginRequest {
    fn chain() -> &'static ValidationChain {
        &chain::LOGIN
    }
}

impl Validatable for ProfilePictureRequest {
    fn chain() -> &'static ValidationChain {
        &chain::PROFILE_PICTURE
    }
}
