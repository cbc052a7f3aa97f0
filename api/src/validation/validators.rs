//! Field validators for input validation
//!
//! Plain predicates over the text form of a value. Rule sets pair each of
//! them with the message that is reported when it does not hold.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::patterns::{self, Pattern};

/// Non-empty after trimming
pub fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Non-empty as given; whitespace counts as content
pub fn is_not_empty(value: &str) -> bool {
    !value.is_empty()
}

/// Character count within `[min, max]`
pub fn is_length(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    len >= min && len <= max
}

pub fn is_email(value: &str) -> bool {
    // RFC 5321 limits the whole address to 254 octets
    value.len() <= 254 && patterns::EMAIL.is_match(value)
}

pub fn matches(value: &str, pattern: &Pattern) -> bool {
    pattern.is_match(value)
}

pub fn is_in(value: &str, options: &[&str]) -> bool {
    options.contains(&value)
}

/// Accepts the same spellings as `toBoolean` understands strictly
pub fn is_boolean(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(_) => true,
        serde_json::Value::String(s) => matches!(s.as_str(), "true" | "false" | "1" | "0"),
        serde_json::Value::Number(n) => matches!(n.as_u64(), Some(0) | Some(1)),
        _ => false,
    }
}

/// Standard-alphabet, padded base64
pub fn is_base64(value: &str) -> bool {
    !value.is_empty() && STANDARD.decode(value).is_ok()
}

/// Size of the payload a padded base64 string decodes to, computed from its
/// length alone. Only meaningful once [`is_base64`] holds.
pub fn decoded_len(value: &str) -> Option<usize> {
    if value.len() % 4 != 0 {
        return None;
    }
    let padding = value.bytes().rev().take(2).filter(|b| *b == b'=').count();
    Some(value.len() / 4 * 3 - padding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_present() {
        assert!(is_present("x"));
        assert!(!is_present(""));
        assert!(!is_present("   "));
        assert!(is_not_empty("   "));
        assert!(!is_not_empty(""));
    }

    #[test]
    fn test_is_length() {
        assert!(is_length("hello", 1, 10));
        assert!(!is_length("", 1, 10));
        assert!(!is_length("hello world!", 1, 5));
        // counted in characters, not bytes
        assert!(is_length("ééééé", 5, 5));
    }

    #[test]
    fn test_is_email() {
        assert!(is_email("a@b.com"));
        assert!(!is_email("a@"));
        assert!(!is_email(&format!("{}@b.com", "a".repeat(260))));
    }

    #[test]
    fn test_is_in() {
        assert!(is_in("admin", &["user", "admin"]));
        assert!(!is_in("root", &["user", "admin"]));
        assert!(!is_in("Admin", &["user", "admin"]));
    }

    #[test]
    fn test_is_boolean() {
        assert!(is_boolean(&json!(true)));
        assert!(is_boolean(&json!("false")));
        assert!(is_boolean(&json!(1)));
        assert!(!is_boolean(&json!("yes")));
        assert!(!is_boolean(&json!(2)));
        assert!(!is_boolean(&json!(null)));
    }

    #[test]
    fn test_is_base64() {
        assert!(is_base64("aGVsbG8="));
        assert!(!is_base64("not base64!"));
        assert!(!is_base64(""));
    }

    #[test]
    fn test_decoded_len_matches_decoding() {
        for size in [0usize, 1, 2, 3, 4, 5, 1024] {
            let encoded = STANDARD.encode(vec![7u8; size]);
            assert_eq!(decoded_len(&encoded), Some(size));
        }
        assert_eq!(decoded_len("aGVsbG8"), None);
    }
}
