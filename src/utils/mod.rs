//! Utilities
//!
//! Shared helpers for the engine crate.

pub mod error;

pub use error::{AppError, AppResult};
