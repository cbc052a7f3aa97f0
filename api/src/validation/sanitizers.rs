//! Input sanitization functions
//!
//! This module provides functions to clean and normalize input data
//! before validation and storage.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    /// Pattern to match a `data:<mime>;base64,` prefix on inline uploads
    static ref DATA_URL_PREFIX: Regex = Regex::new(r"^data:[^;,]+;base64,").unwrap();
}

/// Keep only the allow-listed keys of a request body.
///
/// Retained keys keep their values and relative order. Never fails.
pub fn sanitize_fields(allowed_fields: &[&str], input: Map<String, Value>) -> Map<String, Value> {
    input
        .into_iter()
        .filter(|(key, _)| allowed_fields.contains(&key.as_str()))
        .collect()
}

/// Text form of a JSON value, as seen by string validators.
///
/// Strings are used as-is, numbers and booleans are rendered, everything
/// else reads as empty.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Trim leading and trailing whitespace from a string
pub fn trim(value: &str) -> String {
    value.trim().to_string()
}

/// Trim and lower-case an email address.
///
/// Provider specific folding (dropping dots or `+tag` sub-addresses for
/// particular mail hosts) is intentionally not applied.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Escape HTML special characters
pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
        .replace('/', "&#x2F;")
}

/// Remove a `data:image/png;base64,` style prefix from an inline upload
pub fn strip_data_url_prefix(value: &str) -> String {
    DATA_URL_PREFIX.replace(value.trim(), "").to_string()
}

/// Interpret a value already known to be boolean-like
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => !matches!(value_to_text(other).as_str(), "" | "0" | "false"),
    }
}
