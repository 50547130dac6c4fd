//! Connection registry using Actor pattern.
//!
//! The registry is the central state manager for all live connections.
//! It receives commands via a tokio mpsc channel and maintains the canonical
//! source of truth for identities and per-connection protocol state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ConnectionHandler │────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! └──────────────────┘     └─────────────────┘     └──────────────────┘
//!         ▲                       │                        │
//!         │   RegistryCommand     │   ConnectionEvent      │
//!         │   (mpsc channel)      │   (broadcast)          │
//!         │                       ▼                        ▼
//!    Outbound::Data         HashMap<ClientId,        log / tests
//!    Outbound::Close        ConnectionEntry>
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{
    ConnectionEvent, Outbound, OutboundReceiver, OutboundSender, RegistryCommand, RegistryError,
    RemovalReason, RouteOutcome, ShutdownReport,
};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// # Example
///
/// ```no_run
/// use socktestd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     let live = handle.connected_count().await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
