//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `ConnectionEvent`: Events published by the registry for subscribers
//! - `Outbound`: Instructions the actor sends to a connection handler

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use socktest_core::{ClientId, ConnectionInfo};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

// ============================================================================
// Outbound Channel
// ============================================================================

/// Instruction delivered to a single connection's handler task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write these bytes to the peer.
    Data(Bytes),
    /// End the stream.
    Close,
}

/// Sending side of a connection's outbound queue.
///
/// Unbounded: the relay applies no back-pressure.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// Receiving side of a connection's outbound queue.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a freshly accepted connection under the next identity.
    Accept {
        /// Remote address of the peer
        peer: SocketAddr,
        /// Queue the actor uses to reach the connection
        outbound: OutboundSender,
        /// Channel to send the assigned identity
        respond_to: oneshot::Sender<Result<ClientId, RegistryError>>,
    },

    /// Handle one inbound chunk from a connection.
    ///
    /// # Errors
    /// - `RegistryError::ConnectionNotFound` if the identity is not live
    /// - `RegistryError::DeliveryFailed` if the connection's queue is gone
    Route {
        /// Connection the chunk arrived on
        id: ClientId,
        /// Raw chunk
        data: Bytes,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<RouteOutcome, RegistryError>>,
    },

    /// Remove a connection. Idempotent.
    Remove {
        /// Connection to remove
        id: ClientId,
        /// Channel to send the removed entry, `None` if already absent
        respond_to: oneshot::Sender<Option<ConnectionInfo>>,
    },

    /// End every live connection and empty the registry.
    ShutdownAll {
        /// Channel to send the outcome
        respond_to: oneshot::Sender<ShutdownReport>,
    },

    /// Number of live connections.
    Count {
        /// Channel to send the count
        respond_to: oneshot::Sender<usize>,
    },

    /// Snapshot of all live connections, ordered by identity.
    List {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<ConnectionInfo>>,
    },
}

/// What the registry did with a routed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handshake answered with this identity.
    IdentitySent(ClientId),
    /// Chunk echoed back; carries its length.
    Echoed(usize),
}

/// Result of `ShutdownAll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Connections told to close
    pub closed: usize,
    /// Connections whose close could not be delivered (already gone)
    pub failed: usize,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No live connection with this identity.
    #[error("connection not found: #{0}")]
    ConnectionNotFound(ClientId),

    /// The connection's handler is gone; the entry has been dropped.
    #[error("failed to deliver to connection #{0}")]
    DeliveryFailed(ClientId),

    /// Every identity has been handed out; new connections are refused.
    #[error("identity sequence exhausted")]
    IdentitiesExhausted,

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Connection Events
// ============================================================================

/// Events published by the registry to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection was registered.
    Accepted {
        /// Snapshot of the new connection
        info: ConnectionInfo,
    },

    /// A connection was removed.
    Removed {
        /// Snapshot of the removed connection
        info: ConnectionInfo,
        /// Why it was removed
        reason: RemovalReason,
    },
}

/// Reason why a connection was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The stream ended (either peer closed it or it errored).
    Closed,

    /// Removed by `ShutdownAll`.
    Shutdown,

    /// The handler's queue was closed while routing data to it.
    DeliveryFailed,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed"),
            Self::Shutdown => write!(f, "server shutting down"),
            Self::DeliveryFailed => write!(f, "connection handler gone"),
        }
    }
}
