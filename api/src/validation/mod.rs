//! Input Validation Module
//!
//! This module provides allow-list sanitization and declarative validation
//! for the Accounts API request bodies.
//!
//! # Overview
//!
//! The validation system consists of these components:
//!
//! 1. **Patterns** - Named regular expressions with client-facing descriptions
//! 2. **Sanitizers** - Allow-list filtering and value normalization
//! 3. **Validators** - Reusable predicates for common field types
//! 4. **Rules** - Per-operation rule sets built from validators and sanitizers
//! 5. **Chains** - Allow-list + rule set + result check, run per request
//! 6. **Extractors** - `ValidatedJson<T>`, which runs the chain of `T`
//!
//! # Usage
//!
//! ```ignore
//! use crate::validation::ValidatedJson;
//!
//! pub async fn login(ValidatedJson(req): ValidatedJson<LoginRequest>) -> impl IntoResponse {
//!     // req.email is trimmed and lower-cased, unknown fields are gone
//! }
//! ```
//!
//! # Validation Error Response
//!
//! The first violation, in rule order, is returned as a 400:
//!
//! ```json
//! { "status": "error", "message": "Password must be at least 8 characters long" }
//! ```

pub mod chain;
pub mod extractors;
pub mod patterns;
pub mod requests;
pub mod rules;
pub mod sanitizers;
pub mod validators;

// Re-export commonly used items
pub use chain::ValidationChain;
pub use extractors::{FieldError, Validatable, ValidatedJson, ValidationError};
pub use rules::{Rule, RuleSet};
pub use sanitizers::{escape_html, normalize_email, sanitize_fields, trim};
