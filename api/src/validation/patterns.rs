//! Reusable input patterns
//!
//! Each pattern carries the human readable description that is shown to
//! clients when a value does not match. A pattern may be composed of several
//! regular expressions which must all match (the `regex` crate has no
//! lookahead, so "contains a digit and a lowercase letter and ..." is spelled
//! out as one expression per requirement).

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug)]
pub struct Pattern {
    description: &'static str,
    all_of: Vec<Regex>,
}

impl Pattern {
    fn new(description: &'static str, expressions: &[&str]) -> Self {
        Self {
            description,
            all_of: expressions.iter().map(|e| Regex::new(e).unwrap()).collect(),
        }
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.all_of.iter().all(|re| re.is_match(value))
    }
}

lazy_static! {
    /// Letters, spaces, hyphens and apostrophes
    pub static ref NAME: Pattern = Pattern::new(
        "Can only contain letters, spaces, hyphens, and apostrophes",
        &[r"^[a-zA-Z\s\-']+$"],
    );

    /// At least one digit, lowercase letter, uppercase letter and symbol
    pub static ref PASSWORD: Pattern = Pattern::new(
        "Must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        &[r"\d", r"[a-z]", r"[A-Z]", r"[^a-zA-Z0-9]"],
    );

    pub static ref EMAIL: Pattern = Pattern::new(
        "Must be a valid email address",
        &[r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*\.[A-Za-z]{2,}$"],
    );
}
