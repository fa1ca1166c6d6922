//! Input validation for trainerdb
//!
//! CouchDB rejects database names and document ids that break its naming
//! rules with an opaque 400. Checking them up front gives a readable error
//! before any request is made.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{kind} '{value}' is too long (max {max} characters)")]
    TooLong {
        kind: &'static str,
        value: String,
        max: usize,
    },

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Maximum length of a CouchDB database name
pub const MAX_DATABASE_NAME_LENGTH: usize = 238;

/// Id prefixes that may start with an underscore
const SYSTEM_PREFIXES: &[&str] = &["_design/", "_local/"];

fn database_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_$()+/-]*$").expect("database name pattern is valid")
    })
}

/// Validate a CouchDB database name
///
/// Rules:
/// - Must be 1-238 characters
/// - Must start with a lowercase letter
/// - Only lowercase letters, digits and `_ $ ( ) + - /` allowed
pub fn validate_database_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Empty("database name"));
    }

    if name.len() > MAX_DATABASE_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            kind: "database name",
            value: name.to_string(),
            max: MAX_DATABASE_NAME_LENGTH,
        });
    }

    if !database_name_pattern().is_match(name) {
        return Err(ValidationError::InvalidIdentifier {
            kind: "database name",
            value: name.to_string(),
            reason: "must start with a lowercase letter and use only a-z, 0-9 and _$()+-/",
        });
    }

    Ok(())
}

/// Validate a document id
///
/// Ids starting with `_` are reserved for design and local documents.
pub fn validate_document_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::Empty("document id"));
    }

    if id.starts_with('_') {
        let system = SYSTEM_PREFIXES
            .iter()
            .any(|prefix| id.starts_with(prefix) && id.len() > prefix.len());
        if !system {
            return Err(ValidationError::InvalidIdentifier {
                kind: "document id",
                value: id.to_string(),
                reason: "only design and local documents may start with an underscore",
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_database_names() {
        assert!(validate_database_name("ai_personal_trainer").is_ok());
        assert!(validate_database_name("a").is_ok());
        assert!(validate_database_name("team/fitness-2024").is_ok());
    }

    #[test]
    fn test_invalid_database_names() {
        assert!(validate_database_name("").is_err());
        assert!(validate_database_name("Trainer").is_err());
        assert!(validate_database_name("1trainer").is_err());
        assert!(validate_database_name("_users").is_err());
        assert!(validate_database_name("my db").is_err());
        assert!(validate_database_name(&"a".repeat(239)).is_err());
    }

    #[test]
    fn test_document_ids() {
        assert!(validate_document_id("base_exercises").is_ok());
        assert!(validate_document_id("custom_exercises_user-1").is_ok());
        assert!(validate_document_id("_design/workouts").is_ok());
        assert!(validate_document_id("_local/checkpoint").is_ok());
        assert!(validate_document_id("").is_err());
        assert!(validate_document_id("_design/").is_err());
        assert!(validate_document_id("_secret").is_err());
    }
}
