//! Connection handler for individual client connections.
//!
//! Each accepted stream is registered by the accept loop (so identities
//! follow accept order) and then handed to its own `ConnectionHandler` that:
//! - Forwards every inbound chunk to the registry for routing
//! - Writes whatever the registry queues for it (identity reply, echo)
//! - Removes itself from the registry when the stream ends
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::io;
use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use socktest_core::ClientId;
use socktest_protocol::ChunkCodec;

use crate::registry::{Outbound, OutboundReceiver, RegistryError, RegistryHandle, RouteOutcome};

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Framed stream yielding raw chunks
    framed: Framed<TcpStream, ChunkCodec>,

    /// Remote address of the peer
    peer: SocketAddr,

    /// Identity assigned at accept time
    id: ClientId,

    /// Data the registry queued for this connection
    outbound_rx: OutboundReceiver,

    /// Handle to the connection registry
    registry: RegistryHandle,
}

impl ConnectionHandler {
    /// Creates a handler for a stream already registered as `id`.
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        id: ClientId,
        outbound_rx: OutboundReceiver,
        registry: RegistryHandle,
    ) -> Self {
        Self {
            framed: Framed::new(stream, ChunkCodec::new()),
            peer,
            id,
            outbound_rx,
            registry,
        }
    }

    /// Runs the connection handler until the stream ends.
    ///
    /// Never fails: errors are logged and terminate only this connection.
    /// Returns the identity the connection held.
    pub async fn run(mut self) -> ClientId {
        let id = self.id;
        info!(
            client_id = %id,
            peer = %self.peer,
            "New client connected"
        );

        match self.process().await {
            Ok(()) => debug!(client_id = %id, "Connection finished"),
            Err(e) => warn!(client_id = %id, peer = %self.peer, error = %e, "Socket error"),
        }

        // Already gone after a server-wide shutdown
        if self.registry.remove(id).await.is_none() {
            debug!(client_id = %id, "Connection was removed by shutdown");
        }

        id
    }

    /// Main loop: inbound chunks go to the registry, queued outbound
    /// data goes to the peer.
    async fn process(&mut self) -> Result<(), ConnectionError> {
        let id = self.id;
        loop {
            tokio::select! {
                // Drain queued replies before reading more input
                biased;

                outbound = self.outbound_rx.recv() => {
                    match outbound {
                        Some(Outbound::Data(bytes)) => {
                            self.framed.send(bytes).await?;
                        }
                        Some(Outbound::Close) | None => {
                            debug!(client_id = %id, "Closing connection");
                            self.framed.close().await?;
                            return Ok(());
                        }
                    }
                }

                inbound = self.framed.next() => {
                    match inbound {
                        Some(Ok(chunk)) => match self.registry.route(id, chunk).await {
                            Ok(RouteOutcome::IdentitySent(id)) => {
                                debug!(client_id = %id, "Handshake answered");
                            }
                            Ok(RouteOutcome::Echoed(len)) => {
                                debug!(client_id = %id, bytes = len, "Echoed payload");
                            }
                            Err(e) => return Err(ConnectionError::Registry(e)),
                        },
                        Some(Err(e)) => return Err(ConnectionError::Io(e)),
                        None => {
                            debug!(client_id = %id, "Client sent EOF");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Errors that can occur on a single connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
