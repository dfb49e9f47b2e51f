//! Custom error types for Tally
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for Tally operations
#[derive(Error, Debug)]
pub enum TallyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Bad input, duplicate names, or a delete guard violation.
    ///
    /// The message is meant to be shown to the user as-is.
    #[error("{0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Underlying document store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Replica connection or sync failure
    #[error("Replication error: {0}")]
    Replication(String),

    /// Import errors
    #[error("Import error: {0}")]
    Import(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),

    /// The local store is not open yet; reconnect and try again
    #[error("The local database is not ready yet. Please try again.")]
    NotConnected,
}

impl TallyError {
    /// Create a "not found" error for budgets
    pub fn budget_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Budget",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for expenses
    pub fn expense_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Expense",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this came from the document store or the filesystem under it
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Io(_) | Self::Json(_) | Self::NotFound { .. }
        )
    }

    /// Check if this is a replication error
    pub fn is_replication(&self) -> bool {
        matches!(self, Self::Replication(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for Tally operations
pub type TallyResult<T> = Result<T, TallyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TallyError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = TallyError::Validation("The budget needs a valid name.".into());
        assert_eq!(err.to_string(), "The budget needs a valid name.");
        assert!(err.is_validation());
        assert!(!err.is_storage());
    }

    #[test]
    fn test_not_found_error() {
        let err = TallyError::budget_not_found("123:abc");
        assert_eq!(err.to_string(), "Budget not found: 123:abc");
        assert!(err.is_not_found());
        assert!(err.is_storage());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let tally_err: TallyError = io_err.into();
        assert!(matches!(tally_err, TallyError::Io(_)));
    }
}
