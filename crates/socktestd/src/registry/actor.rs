//! Registry actor - owns all connection state and processes commands.
//!
//! The RegistryActor is the single owner of the connection table. It
//! receives commands via an mpsc channel and publishes events via broadcast.
//! Because every command is handled sequentially on one task, assigning the
//! next identity and inserting the entry happen as one atomic step.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use socktest_core::{ClientId, ConnectionInfo};
use socktest_protocol::{decode_text, identity_reply, Inbound, RelayPhase};

use super::commands::{
    ConnectionEvent, Outbound, OutboundSender, RegistryCommand, RegistryError, RemovalReason,
    RouteOutcome, ShutdownReport,
};

/// One live connection as seen by the registry.
struct ConnectionEntry {
    info: ConnectionInfo,
    phase: RelayPhase,
    outbound: OutboundSender,
}

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all connection state.
///
/// # Ownership
///
/// The actor owns:
/// - `connections`: live connections keyed by identity
/// - `next_id`: the next identity to hand out
///
/// Identities come from a monotonic counter, not from the table size, so
/// removal leaves a gap and never causes an identity to be reused.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Live connections: identity → entry
    connections: HashMap<ClientId, ConnectionEntry>,

    /// Next identity to assign; `None` once the sequence is exhausted
    next_id: Option<ClientId>,

    /// Event publisher for accept/remove notifications
    event_publisher: broadcast::Sender<ConnectionEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            receiver,
            connections: HashMap::new(),
            next_id: Some(ClientId::default()),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            connections = self.connections.len(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Accept {
                peer,
                outbound,
                respond_to,
            } => {
                let result = self.handle_accept(peer, outbound);
                // Ignore send error - the accept loop may have gone away
                let _ = respond_to.send(result);
            }
            RegistryCommand::Route {
                id,
                data,
                respond_to,
            } => {
                let result = self.handle_route(id, data);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove { id, respond_to } => {
                let result = self.handle_remove(id, RemovalReason::Closed);
                let _ = respond_to.send(result);
            }
            RegistryCommand::ShutdownAll { respond_to } => {
                let report = self.handle_shutdown_all();
                let _ = respond_to.send(report);
            }
            RegistryCommand::Count { respond_to } => {
                let _ = respond_to.send(self.connections.len());
            }
            RegistryCommand::List { respond_to } => {
                let _ = respond_to.send(self.handle_list());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_accept(
        &mut self,
        peer: SocketAddr,
        outbound: OutboundSender,
    ) -> Result<ClientId, RegistryError> {
        let Some(id) = self.next_id else {
            error!(peer = %peer, "Identity sequence exhausted, refusing connection");
            return Err(RegistryError::IdentitiesExhausted);
        };
        self.next_id = id.checked_next();

        let info = ConnectionInfo::new(id, peer);
        self.connections.insert(
            id,
            ConnectionEntry {
                info: info.clone(),
                phase: RelayPhase::default(),
                outbound,
            },
        );

        info!(
            client_id = %id,
            peer = %peer,
            total_connections = self.connections.len(),
            "Connection registered"
        );

        // Publish event (ignore if no subscribers)
        let _ = self.event_publisher.send(ConnectionEvent::Accepted { info });

        Ok(id)
    }

    /// Answers a handshake or echoes the chunk to its origin.
    fn handle_route(&mut self, id: ClientId, data: Bytes) -> Result<RouteOutcome, RegistryError> {
        let entry = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::ConnectionNotFound(id))?;

        let (reply, outcome) = match entry.phase.classify(data) {
            Inbound::IdentityRequest => {
                info!(client_id = %id, "Identity requested");
                (identity_reply(id), RouteOutcome::IdentitySent(id))
            }
            Inbound::Payload(payload) => {
                let len = payload.len();
                (payload, RouteOutcome::Echoed(len))
            }
        };

        let text = decode_text(&reply);
        if entry.outbound.send(Outbound::Data(reply)).is_err() {
            warn!(client_id = %id, "Connection handler gone, dropping connection");
            let _ = self.handle_remove(id, RemovalReason::DeliveryFailed);
            return Err(RegistryError::DeliveryFailed(id));
        }

        info!(client_id = %id, data = %text, "Sent to client");
        Ok(outcome)
    }

    fn handle_remove(&mut self, id: ClientId, reason: RemovalReason) -> Option<ConnectionInfo> {
        let Some(entry) = self.connections.remove(&id) else {
            debug!(client_id = %id, "Connection already removed");
            return None;
        };

        info!(
            client_id = %id,
            peer = %entry.info.peer,
            reason = %reason,
            remaining = self.connections.len(),
            "Client disconnected"
        );

        let _ = self.event_publisher.send(ConnectionEvent::Removed {
            info: entry.info.clone(),
            reason,
        });

        Some(entry.info)
    }

    /// Tells every handler to close and empties the table.
    ///
    /// A handler that is already gone counts as a failed close; it is
    /// logged and the sweep carries on.
    fn handle_shutdown_all(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let mut ids: Vec<ClientId> = self.connections.keys().copied().collect();
        ids.sort_unstable();

        for id in ids {
            if let Some(entry) = self.connections.get(&id) {
                match entry.outbound.send(Outbound::Close) {
                    Ok(()) => report.closed += 1,
                    Err(_) => {
                        warn!(
                            client_id = %id,
                            peer = %entry.info.peer,
                            "Failed to close connection"
                        );
                        report.failed += 1;
                    }
                }
            }
            let _ = self.handle_remove(id, RemovalReason::Shutdown);
        }

        info!(
            closed = report.closed,
            failed = report.failed,
            "All connections closed"
        );

        report
    }

    fn handle_list(&self) -> Vec<ConnectionInfo> {
        let mut list: Vec<ConnectionInfo> = self
            .connections
            .values()
            .map(|entry| entry.info.clone())
            .collect();
        list.sort_by_key(|info| info.id);
        list
    }

    #[cfg(test)]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
