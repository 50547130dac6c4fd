//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to connection events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot};

use socktest_core::{ClientId, ConnectionInfo};

use super::commands::{
    ConnectionEvent, OutboundSender, RegistryCommand, RegistryError, RouteOutcome, ShutdownReport,
};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<ConnectionEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Register an accepted connection and obtain its identity.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    /// - `RegistryError::IdentitiesExhausted` if no identity is left
    pub async fn accept(
        &self,
        peer: SocketAddr,
        outbound: OutboundSender,
    ) -> Result<ClientId, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Accept {
                peer,
                outbound,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Route one inbound chunk from connection `id`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ConnectionNotFound` if `id` is not live
    /// - `RegistryError::DeliveryFailed` if the reply could not be queued
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn route(&self, id: ClientId, data: Bytes) -> Result<RouteOutcome, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Route {
                id,
                data,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a connection. Returns the removed entry, or `None` if it was
    /// already gone or the actor has shut down.
    pub async fn remove(&self, id: ClientId) -> Option<ConnectionInfo> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Remove { id, respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Close every live connection and empty the registry.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn shutdown_all(&self) -> Result<ShutdownReport, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::ShutdownAll { respond_to: tx })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Number of live connections; 0 if the actor is unreachable.
    pub async fn connected_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Count { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Snapshot of live connections ordered by identity.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn list_connections(&self) -> Vec<ConnectionInfo> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::List { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribe to accept/remove events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    #[cfg(test)]
    fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
