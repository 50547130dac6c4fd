//! Error types for the socktest client.
//!
//! Transport failures are not errors here: they are session events and end
//! up as operator notices. What remains are invalid settings and console I/O.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` in this module.

use std::io;

use socktest_core::DomainError;
use thiserror::Error;

/// Client application errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Address or port rejected by validation.
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] DomainError),

    /// Console read or write failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_target_display() {
        let error = ClientError::from(DomainError::InvalidPort {
            value: "abc".to_string(),
        });
        let display = error.to_string();
        assert!(display.contains("Invalid target"));
        assert!(display.contains("abc"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let error: ClientError = io::Error::new(io::ErrorKind::BrokenPipe, "stdout gone").into();
        assert!(matches!(error, ClientError::Io(_)));
        assert!(error.to_string().contains("stdout gone"));
    }
}
