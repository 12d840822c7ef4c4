//! Error types for identifier validation

use thiserror::Error;

/// Errors that can occur during typed ID validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// ID value is null/zero when non-null required
    #[error("ID cannot be null/zero")]
    NullId,

    /// ID value is negative (raw ids arrive as signed integers from route params)
    #[error("ID value {value} must be a positive integer")]
    Negative { value: i64 },
}
