//! Error types for trainerdb
//!
//! Not-found is never an error in this crate: lookups return `None` or an
//! empty vector. What remains are write conflicts, transport failures and
//! caller mistakes.

use thiserror::Error;

/// The main error type for trainerdb operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Revision Errors
    // ==========================================================================
    #[error("Document '{id}' was modified concurrently (stale or missing revision)")]
    Conflict { id: String },

    #[error("Update of document '{id}' requires its current revision")]
    MissingRevision { id: String },

    #[error("Update requires a document with an '_id'")]
    MissingDocumentId,

    // ==========================================================================
    // Store Errors
    // ==========================================================================
    #[error("Store request failed: {message}")]
    Persistence {
        message: String,
        status: Option<u16>,
    },

    #[error("Store rejected credentials: {message}")]
    Unauthorized { message: String },

    #[error("View '{design}/{view}' does not exist")]
    SchemaMissing { design: String, view: String },

    #[error("Invalid view query on '{design}/{view}': {reason}")]
    InvalidQuery {
        design: String,
        view: String,
        reason: String,
    },

    // ==========================================================================
    // Document Errors
    // ==========================================================================
    #[error("Invalid document: {reason}")]
    InvalidDocument { reason: String },

    #[error("Document '{id}' has type '{actual}', expected '{expected}'")]
    TypeMismatch {
        id: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Username '{username}' is already taken")]
    UsernameTaken { username: String },

    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ==========================================================================
    // Serialization Errors
    // ==========================================================================
    #[error("Failed to encode or decode JSON: {message}")]
    Json { message: String },
}

/// Result type alias for trainerdb operations
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Conversions from external error types
// =============================================================================

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Persistence {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config {
            message: err.to_string(),
        }
    }
}

impl From<crate::validation::ValidationError> for Error {
    fn from(err: crate::validation::ValidationError) -> Self {
        use crate::validation::ValidationError;
        match err {
            ValidationError::InvalidIdentifier { kind, value, reason } => {
                Error::InvalidIdentifier { kind, value, reason }
            }
            ValidationError::Empty(kind) => Error::InvalidIdentifier {
                kind,
                value: String::new(),
                reason: "cannot be empty",
            },
            ValidationError::TooLong { kind, value, .. } => Error::InvalidIdentifier {
                kind,
                value,
                reason: "exceeds maximum length",
            },
        }
    }
}

// =============================================================================
// Error Display Helpers
// =============================================================================

impl Error {
    /// Returns a user-friendly suggestion for fixing the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Conflict { .. } => Some("Re-fetch the document and apply the change again"),
            Error::MissingRevision { .. } => {
                Some("Fetch the document first so the update carries its '_rev'")
            }
            Error::Unauthorized { .. } => Some("Check COUCHDB_USER and COUCHDB_PASSWORD"),
            Error::Persistence { .. } => Some("Check that CouchDB is running at COUCHDB_URL"),
            Error::InvalidIdentifier { kind: "database name", .. } => {
                Some("Database names use lowercase letters, digits and _$()+-/, starting with a letter")
            }
            Error::InvalidIdentifier { .. } => {
                Some("Document ids must be non-empty; only _design/ and _local/ ids may start with '_'")
            }
            Error::UsernameTaken { .. } => Some("Choose a different username"),
            _ => None,
        }
    }

    /// Returns true if retrying after a re-fetch can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Conflict { .. } | Error::MissingRevision { .. } | Error::Persistence { .. }
        )
    }

    /// Returns true for a missing design document or view
    pub fn is_schema_missing(&self) -> bool {
        matches!(self, Error::SchemaMissing { .. })
    }
}
