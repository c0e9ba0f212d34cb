//! Core error types for the Pocketfolio application.
//!
//! This module defines backend-agnostic error types. Backend-specific errors
//! (from the key/value store) are converted to these types by the storage
//! layer.

use chrono::ParseError as ChronoParseError;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the portfolio application.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Backend-agnostic error type for persistence operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert backend-specific errors into this format.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store cannot fit the write and nothing is left to evict.
    #[error("Backing store capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A stored payload failed integrity verification.
    #[error("Stored payload failed integrity verification: {0}")]
    Corruption(String),

    /// A payload could not be serialized or deserialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Converting a legacy layout into the current schema failed.
    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    /// Rotating the previous payload into its backup slot failed.
    #[error("Backup rotation failed: {0}")]
    BackupFailed(String),

    /// Internal/unexpected storage error.
    #[error("Internal storage error: {0}")]
    Internal(String),
}

/// Validation errors for user input and data parsing.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Field '{field}' must be a positive number, got {value}")]
    NonPositiveNumber { field: &'static str, value: String },

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse date/time: {0}")]
    DateTimeParse(#[from] ChronoParseError),
}

// === From implementations for common error types ===

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

impl From<ChronoParseError> for Error {
    fn from(err: ChronoParseError) -> Self {
        Error::Validation(ValidationError::DateTimeParse(err))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
