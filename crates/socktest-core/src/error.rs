//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Port outside 1..=65535 or not a number
    #[error("Invalid port number: {value} (expected a number between 1 and 65535)")]
    InvalidPort { value: String },

    /// Empty or whitespace-only host
    #[error("Invalid address: {value:?}")]
    InvalidAddress { value: String },

    /// Parse error for incoming data
    #[error("Failed to parse {field}: {reason}")]
    ParseError { field: String, reason: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
