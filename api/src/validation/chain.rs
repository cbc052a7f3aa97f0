//! Validation chains
//!
//! A chain binds an allow-list to a rule set and runs, in order:
//! allow-list sanitization, every rule of the set, and the result check that
//! turns the first collected message into a 400 error.

use lazy_static::lazy_static;
use serde_json::{Map, Value};

use super::extractors::ValidationError;
use super::rules::{
    RuleSet, CREATE_USER_FIELDS, CREATE_USER_RULES, LOGIN_FIELDS, LOGIN_RULES,
    PROFILE_PICTURE_FIELDS, PROFILE_PICTURE_RULES, UPDATE_USER_FIELDS, UPDATE_USER_RULES,
};
use super::sanitizers::sanitize_fields;
use crate::{error::ApiError, metrics};

pub struct ValidationChain {
    rules: &'static RuleSet,
    allowed_fields: &'static [&'static str],
}

impl ValidationChain {
    pub fn build(rules: &'static RuleSet, allowed_fields: &'static [&'static str]) -> Self {
        Self {
            rules,
            allowed_fields,
        }
    }

    pub fn operation(&self) -> &'static str {
        self.rules.operation()
    }

    /// Sanitize and validate `body` in place.
    ///
    /// A missing body (`null`) is treated as an empty object. On failure the
    /// body is left in its partially sanitized state and must not be used.
    pub fn run(&self, body: &mut Value) -> Result<(), ApiError> {
        let input = match std::mem::take(body) {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ApiError::bad_request("Request body must be a JSON object")),
        };

        let mut sanitized = sanitize_fields(self.allowed_fields, input);
        let outcome = self.rules.apply(&mut sanitized);
        *body = Value::Object(sanitized);

        outcome.map_err(|errors| {
            let error = ValidationError::new(errors);
            metrics::VALIDATION_FAILURES
                .with_label_values(&[self.operation()])
                .inc();
            tracing::debug!(
                operation = self.operation(),
                violations = error.errors.len(),
                first = %error.first_message(),
                "request failed validation"
            );
            ApiError::from(error)
        })
    }
}

lazy_static! {
    pub static ref CREATE_USER: ValidationChain =
        ValidationChain::build(&CREATE_USER_RULES, &CREATE_USER_FIELDS);
    pub static ref UPDATE_USER: ValidationChain =
        ValidationChain::build(&UPDATE_USER_RULES, &UPDATE_USER_FIELDS);
    pub static ref LOGIN: ValidationChain = ValidationChain::build(&LOGIN_RULES, &LOGIN_FIELDS);
    pub static ref PROFILE_PICTURE: ValidationChain =
        ValidationChain::build(&PROFILE_PICTURE_RULES, &PROFILE_PICTURE_FIELDS);
}
