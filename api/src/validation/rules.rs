//! Declarative validation rules
//!
//! A [`Rule`] is an ordered list of steps for one body field. A step either
//! checks the current value (and names the message reported when the check
//! fails) or rewrites it. Evaluation of a rule stops at its first failing
//! check, so every rule contributes at most one message. A [`RuleSet`] runs
//! all of its rules, in order, and collects those messages.

use lazy_static::lazy_static;
use serde_json::{Map, Value};
use shared::Role;

use super::extractors::{FieldError, ValidationBuilder};
use super::patterns::{self, Pattern};
use super::sanitizers::{
    escape_html, normalize_email, strip_data_url_prefix, to_boolean, trim, value_to_text,
};
use super::validators::{
    decoded_len, is_base64, is_boolean, is_email, is_in, is_length, is_not_empty, is_present,
    matches,
};

const NAME_MAX_LENGTH: usize = 50;
const PASSWORD_MIN_LENGTH: usize = 8;
/// Largest accepted profile picture, after base64 decoding
pub const MAX_PICTURE_BYTES: usize = 5 * 1024 * 1024;
pub const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;
type Transform = Box<dyn Fn(Value) -> Value + Send + Sync>;

enum Step {
    Check { predicate: Predicate, message: String },
    Sanitize(Transform),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    /// Absent fields are validated as if they were empty
    Required,
    /// Absent fields are skipped
    Optional,
    /// Presence alone is a violation
    Forbidden,
}

pub struct Rule {
    field: &'static str,
    presence: Presence,
    forbidden_message: String,
    steps: Vec<Step>,
}

impl Rule {
    pub fn field(field: &'static str) -> Self {
        Self {
            field,
            presence: Presence::Required,
            forbidden_message: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.field
    }

    /// Skip the rule entirely when the field is missing
    pub fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    /// Reject the request whenever the field is present
    pub fn forbidden(mut self, message: impl Into<String>) -> Self {
        self.presence = Presence::Forbidden;
        self.forbidden_message = message.into();
        self
    }

    /// Check against the raw JSON value
    pub fn check_value<F>(mut self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.steps.push(Step::Check {
            predicate: Box::new(predicate),
            message: message.into(),
        });
        self
    }

    /// Check against the text form of the value
    pub fn check<F>(self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.check_value(move |value| predicate(&value_to_text(value)), message)
    }

    pub fn sanitize<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.steps.push(Step::Sanitize(Box::new(transform)));
        self
    }

    /// Rewrite the text form of the value
    pub fn sanitize_text<F>(self, transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.sanitize(move |value| Value::String(transform(&value_to_text(&value))))
    }

    pub fn required(self, message: impl Into<String>) -> Self {
        self.check(is_present, message)
    }

    /// Like [`Rule::required`], but a whitespace-only value is accepted
    pub fn not_empty(self, message: impl Into<String>) -> Self {
        self.check(is_not_empty, message)
    }

    pub fn trim(self) -> Self {
        self.sanitize_text(trim)
    }

    pub fn to_lowercase(self) -> Self {
        self.sanitize_text(str::to_lowercase)
    }

    pub fn normalize_email(self) -> Self {
        self.sanitize_text(normalize_email)
    }

    pub fn escape(self) -> Self {
        self.sanitize_text(escape_html)
    }

    pub fn max_length(self, max: usize, message: impl Into<String>) -> Self {
        self.check(move |v| is_length(v, 0, max), message)
    }

    pub fn min_length(self, min: usize, message: impl Into<String>) -> Self {
        self.check(move |v| is_length(v, min, usize::MAX), message)
    }

    pub fn matches(self, pattern: &'static Pattern, message: impl Into<String>) -> Self {
        self.check(move |v| matches(v, pattern), message)
    }

    pub fn one_of(self, options: &'static [&'static str], message: impl Into<String>) -> Self {
        self.check(move |v| is_in(v, options), message)
    }

    /// Validate the field in `body`, rewriting it in place.
    ///
    /// Returns the message of the first failing check.
    pub fn apply(&self, body: &mut Map<String, Value>) -> Result<(), String> {
        let present = body.contains_key(self.field);
        match self.presence {
            Presence::Forbidden if present => return Err(self.forbidden_message.clone()),
            Presence::Forbidden => return Ok(()),
            Presence::Optional if !present => return Ok(()),
            _ => {}
        }

        // Rewritten through the existing slot so retained keys keep their order.
        let mut value = body.get_mut(self.field).map(Value::take).unwrap_or(Value::Null);
        let outcome = self.run_steps(&mut value);
        if let Some(slot) = body.get_mut(self.field) {
            *slot = value;
        }
        outcome
    }

    fn run_steps(&self, value: &mut Value) -> Result<(), String> {
        for step in &self.steps {
            match step {
                Step::Check { predicate, message } => {
                    if !predicate(value) {
                        return Err(message.clone());
                    }
                }
                Step::Sanitize(transform) => *value = transform(value.take()),
            }
        }
        Ok(())
    }
}

/// Ordered rules for one API operation
pub struct RuleSet {
    operation: &'static str,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(operation: &'static str, rules: Vec<Rule>) -> Self {
        Self { operation, rules }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Run every rule; violations are returned in rule order
    pub fn apply(&self, body: &mut Map<String, Value>) -> Result<(), Vec<FieldError>> {
        let mut builder = ValidationBuilder::new();
        for rule in &self.rules {
            builder.check(rule.name(), || rule.apply(body));
        }
        builder.build()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field rules
// ─────────────────────────────────────────────────────────────────────────────

fn email_rule() -> Rule {
    Rule::field("email")
        .trim()
        .check(is_email, "Please provide a valid email")
        .normalize_email()
}

fn password_rule() -> Rule {
    Rule::field("password")
        .min_length(
            PASSWORD_MIN_LENGTH,
            "Password must be at least 8 characters long",
        )
        .matches(&patterns::PASSWORD, patterns::PASSWORD.description())
}

fn name_rule(field: &'static str) -> Rule {
    Rule::field(field)
        .trim()
        .required(format!("{} is required", field))
        .max_length(
            NAME_MAX_LENGTH,
            format!("{} cannot exceed {} characters", field, NAME_MAX_LENGTH),
        )
        .matches(
            &patterns::NAME,
            format!("{} {}", field, patterns::NAME.description()),
        )
        .escape()
}

fn role_rule() -> Rule {
    Rule::field("role")
        .optional()
        .check(|v| v.parse::<Role>().is_ok(), "Invalid role specified")
        .trim()
}

fn is_active_rule() -> Rule {
    Rule::field("isActive")
        .optional()
        .check_value(is_boolean, "isActive must be a boolean value")
        .sanitize(|value| Value::Bool(to_boolean(&value)))
}

fn image_rule() -> Rule {
    Rule::field("image")
        .required("Please provide an image")
        .sanitize_text(strip_data_url_prefix)
        .check(is_base64, "Image must be base64 encoded")
        .check(
            |v| decoded_len(v).is_some_and(|len| len <= MAX_PICTURE_BYTES),
            "Image cannot exceed 5 MB",
        )
}

fn mime_type_rule() -> Rule {
    Rule::field("mimeType")
        .trim()
        .to_lowercase()
        .one_of(&IMAGE_TYPES, "Unsupported image type")
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule sets and allow-lists
// ─────────────────────────────────────────────────────────────────────────────

pub const CREATE_USER_FIELDS: [&str; 6] =
    ["email", "password", "firstName", "lastName", "role", "isActive"];
/// `role` and `isActive` are admitted only so their presence can be rejected
pub const UPDATE_USER_FIELDS: [&str; 6] =
    ["email", "password", "firstName", "lastName", "role", "isActive"];
pub const LOGIN_FIELDS: [&str; 2] = ["email", "password"];
pub const PROFILE_PICTURE_FIELDS: [&str; 2] = ["image", "mimeType"];

lazy_static! {
    pub static ref CREATE_USER_RULES: RuleSet = RuleSet::new(
        "create_user",
        vec![
            email_rule(),
            password_rule(),
            name_rule("firstName"),
            name_rule("lastName"),
            role_rule(),
            is_active_rule(),
        ],
    );

    pub static ref UPDATE_USER_RULES: RuleSet = RuleSet::new(
        "update_user",
        vec![
            Rule::field("role").forbidden("Role cannot be updated through this endpoint"),
            Rule::field("isActive").forbidden("isActive cannot be updated through this endpoint"),
            email_rule().optional(),
            password_rule().optional(),
            name_rule("firstName").optional(),
            name_rule("lastName").optional(),
        ],
    );

    pub static ref LOGIN_RULES: RuleSet = RuleSet::new(
        "login",
        vec![
            email_rule(),
            Rule::field("password").not_empty("Password is required"),
        ],
    );

    pub static ref PROFILE_PICTURE_RULES: RuleSet = RuleSet::new(
        "profile_picture",
        vec![image_rule(), mime_type_rule()],
    );
}
