//! socktest Core - Shared types for the TCP test harness
//!
//! This crate provides the domain types shared between
//! the server (socktestd) and the interactive client (socktest).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod endpoint;
pub mod error;
pub mod identity;
pub mod session;

// Re-exports for convenience
pub use endpoint::{parse_port, Endpoint, DEFAULT_ADDR, DEFAULT_PORT, ENV_ADDR, ENV_PORT};
pub use error::{DomainError, DomainResult};
pub use identity::{ClientId, ConnectionInfo};
pub use session::{Effect, Notice, SessionEvent, SessionState, Transition, TransportErrorKind};
