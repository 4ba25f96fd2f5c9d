//! Core Error Types
//!
//! Defines the foundational error types used across the Veritab workspace.
//! These errors are dependency-free (only thiserror + std) and cover the
//! contract violations the data model can detect itself: malformed sheets,
//! bad cell references, and illegal lifecycle transitions.
//!
//! The engine crate extends these with additional error variants (I/O,
//! serialization, worker task failures) that require heavier dependencies.

use thiserror::Error;

/// Core error type for the Veritab workspace.
///
/// Every variant is a programming-contract violation rather than a runtime
/// condition to recover from: a well-formed workbook driven only through the
/// scheduler never produces one.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Validation errors (parallel-vector length mismatch, empty input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown sheet or row references
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal cell lifecycle transitions
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
