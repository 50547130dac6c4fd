//! socktest Server - Connection registry and echo relay
//!
//! This crate provides the server side of the TCP test harness:
//! - `registry` - Connection registry actor; assigns identities and routes data
//! - `server` - TCP listener spawning one handler per connection
//! - `console` - Operator console (`/info`, `/list`, `/exit`)
//! - `cli` - Process entry point (arguments, logging, signals)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        socktestd                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   RelayServer   │────▶│       RegistryActor         │   │
//! │  │  (TcpListener)  │     │  (connection state owner)   │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ accept                      │ Outbound::Data    │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│◀────│   per-connection mpsc       │   │
//! │  │ (per client)    │     │   (echo / identity reply)   │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod cli;
pub mod console;
pub mod registry;
pub mod server;
