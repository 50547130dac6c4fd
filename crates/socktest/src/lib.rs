//! socktest client library
//!
//! Drives a single outbound TCP connection through the identity handshake
//! and then relays operator lines to the server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  commands   ┌─────────────────┐  Framed<TcpStream>
//! │ ClientSession│────────────▶│ connection task │◀──────────────────▶ server
//! │ (state mach.)│◀────────────│  (per attempt)  │
//! └──────┬───────┘  events     └─────────────────┘
//!        │ notices
//!        ▼
//! ┌──────────────┐
//! │   console    │
//! └──────────────┘
//! ```
//!
//! The session owns the [`SessionState`](socktest_core::SessionState);
//! the connection task only performs I/O and reports what happened.

pub mod cli;
pub mod connection;
pub mod console;
pub mod error;
pub mod session;

pub use error::{ClientError, Result};
pub use session::{ClientSession, SessionStatus};
