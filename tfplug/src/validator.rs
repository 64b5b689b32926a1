//! Common attribute validators
//!
//! Null and unknown values are skipped by every validator here; required
//! checks are done by the schema itself.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use regex::Regex;

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_least(min: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: None,
        })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("string length must be between {} and {}", min, max),
            (Some(min), None) => format!("string length must be at least {}", min),
            (None, Some(max)) => format!("string length must be at most {}", max),
            (None, None) => "string of any length".to_string(),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Dynamic::String(s) = &request.config_value {
            let len = s.chars().count();
            let too_short = self.min.is_some_and(|min| len < min);
            let too_long = self.max.is_some_and(|max| len > max);
            if too_short || too_long {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value Length",
                        format!(
                            "Attribute {} {}, got: {}",
                            request.path,
                            self.description(),
                            len
                        ),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}

/// Validates string values against a regular expression
pub struct StringPatternValidator {
    pattern: Regex,
    message: String,
}

impl StringPatternValidator {
    /// `message` describes the expected format and is shown to the user
    pub fn create(pattern: Regex, message: impl Into<String>) -> Box<dyn Validator> {
        Box::new(Self {
            pattern,
            message: message.into(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.message.clone()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Dynamic::String(s) = &request.config_value {
            if !self.pattern.is_match(s) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid Attribute Value Match",
                        format!("Attribute {} {}, got: {}", request.path, self.message, s),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        ValidatorResponse { diagnostics }
    }
}
