//! Field-level validation of JSON request bodies.
//!
//! Rules are checked against the raw body so that every problem is reported
//! at once, before the body is deserialized into a typed request.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;

use super::response::ApiError;

/// Brazilian-style phone: two-digit area code (optionally parenthesized),
/// then 8 or 9 digits with an optional dash before the last four.
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\(\d{2}\)|\d{2})\d{4,5}-?\d{4}$").expect("phone pattern is valid")
});

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub max_length: Option<usize>,
    pub min_length: Option<usize>,
    pub name: &'static str,
    pub pattern: Option<&'static Regex>,
    pub required: bool,
}

impl FieldRule {
    /// A required string field
    pub fn string(name: &'static str) -> Self {
        Self {
            max_length: None,
            min_length: None,
            name,
            pattern: None,
            required: true,
        }
    }

    pub fn min(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: &'static Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    fn check(&self, value: Option<&Value>, errors: &mut Vec<String>) {
        let name = self.name;
        let value = match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(v) => Some(v),
        };

        let Some(value) = value else {
            if self.required {
                errors.push(format!("Missing required field: {name}"));
            }
            return;
        };

        let text = match value {
            Value::String(text) => {
                self.check_length(text, errors);
                text.clone()
            }
            // Wrong type; the format check still runs against the literal text
            other => {
                errors.push(format!("Field {name} must be of type string"));
                other.to_string()
            }
        };

        if let Some(pattern) = self.pattern {
            if !pattern.is_match(&text) {
                errors.push(format!("Field {name} does not match the expected format"));
            }
        }
    }

    fn check_length(&self, text: &str, errors: &mut Vec<String>) {
        let name = self.name;
        let len = text.chars().count();
        if let Some(min) = self.min_length {
            if len < min {
                errors.push(format!("Field {name} must be at least {min} characters"));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                errors.push(format!("Field {name} must be at most {max} characters"));
            }
        }
    }
}

pub fn register_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::string("username").min(2),
        FieldRule::string("password").min(6),
    ]
}

pub fn login_rules() -> Vec<FieldRule> {
    vec![FieldRule::string("username"), FieldRule::string("password")]
}

pub fn contact_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::string("name").min(2).max(50),
        FieldRule::string("phone").pattern(&PHONE_PATTERN),
    ]
}

/// Check `body` against `rules`, collecting every failure.
pub fn validate_body(body: &Value, rules: &[FieldRule]) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    for rule in rules {
        rule.check(body.get(rule.name), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Validate, then deserialize into the typed request.
pub fn parse_body<T: DeserializeOwned>(body: Value, rules: &[FieldRule]) -> Result<T, ApiError> {
    validate_body(&body, rules)?;
    serde_json::from_value(body).map_err(|e| ApiError::validation(e.to_string()))
}
