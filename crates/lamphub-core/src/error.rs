//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Device names must contain at least one non-whitespace character
    #[error("Device name must not be empty")]
    EmptyDeviceName,

    /// Unknown device status label
    #[error("Invalid device status: {value} (expected \"online\" or \"offline\")")]
    InvalidStatus { value: String },

    /// Unknown task name
    #[error("Unknown task: {name}")]
    UnknownTask { name: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
