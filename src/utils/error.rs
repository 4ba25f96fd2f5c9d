//! Application Error Types
//!
//! Extends the core error set with the variants the engine needs: file I/O
//! and serialization for the workbook store, and task failures from the
//! worker pool. Collaborator errors never reach this level; the pipeline
//! absorbs them into its retry loop and they surface only as failed cells.

use thiserror::Error;
use veritab_core::CoreError;

/// Top-level error type for the engine crate.
#[derive(Error, Debug)]
pub enum AppError {
    /// Contract violations detected by the core model
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Worker task failures (panicked or aborted tasks)
    #[error("Task error: {0}")]
    Task(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a task error
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }
}

/// Convert AppError to a string
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
