//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and enumerated strings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TinkerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::TinkerConfig;

const LOG_FORMATS: &[&str] = &["full", "compact"];

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &TinkerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.logging.filter.trim().is_empty() {
        errors.push(ValidationError {
            field: "logging.filter",
            message: "must not be empty".to_string(),
        });
    }

    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        errors.push(ValidationError {
            field: "logging.format",
            message: format!(
                "unknown format '{}', expected one of {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&TinkerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = TinkerConfig::default();
        config.logging.filter = "  ".into();
        config.logging.format = "json".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "logging.filter");
        assert!(errors[1].to_string().contains("json"));
    }
}
