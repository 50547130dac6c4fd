//! TCP server for socktest.
//!
//! The server:
//! - Binds a TCP listener (bind failure is the only fatal error)
//! - Registers each accepted stream with the registry, in accept order
//! - Spawns a ConnectionHandler for each registered stream
//! - On cancellation, closes every live connection via the registry
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │◀────│  (route / echo) │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept and per-connection errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::registry::RegistryHandle;

/// TCP relay server.
pub struct RelayServer {
    /// Bound listener
    listener: TcpListener,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// Port 0 asks the OS for an ephemeral port; see [`Self::local_addr`].
    ///
    /// # Errors
    ///
    /// `ServerError::Bind` if the address cannot be resolved or bound.
    pub async fn bind(
        addr: &str,
        port: u16,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((addr, port))
            .await
            .map_err(|e| ServerError::Bind {
                addr: format!("{addr}:{port}"),
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            registry,
            cancel_token,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Io)
    }

    /// Runs the accept loop until the cancellation token fires, then
    /// closes every live connection.
    pub async fn run(self) -> Result<(), ServerError> {
        match self.listener.local_addr() {
            Ok(addr) => info!(address = %addr.ip(), port = addr.port(), "Listening"),
            Err(e) => warn!(error = %e, "Listening (local address unavailable)"),
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer).await,
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    /// Registers an accepted stream, then spawns its handler task.
    ///
    /// Registration is awaited here, before the next accept, so the k-th
    /// accepted connection always receives identity k.
    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let id = match self.registry.accept(peer, outbound_tx).await {
            Ok(id) => id,
            Err(e) => {
                // Dropping the stream closes it
                warn!(peer = %peer, error = %e, "Failed to register connection, dropping");
                return;
            }
        };

        let handler = ConnectionHandler::new(stream, peer, id, outbound_rx, self.registry.clone());
        tokio::spawn(handler.run());
    }

    /// Closes all connections; the listener is dropped with `self`.
    async fn cleanup(&self) {
        match self.registry.shutdown_all().await {
            Ok(report) => info!(
                closed = report.closed,
                failed = report.failed,
                "Server cleanup complete"
            ),
            Err(e) => warn!(error = %e, "Failed to close connections"),
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::spawn_registry;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:4242".to_string(),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1:4242"));
        assert!(err.to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = RelayServer::bind("127.0.0.1", 0, spawn_registry(), CancellationToken::new())
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = RelayServer::bind("127.0.0.1", 0, spawn_registry(), CancellationToken::new())
            .await
            .unwrap();
        let port = first.local_addr().unwrap().port();

        let second =
            RelayServer::bind("127.0.0.1", port, spawn_registry(), CancellationToken::new()).await;
        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_run_returns_after_cancel() {
        let cancel = CancellationToken::new();
        let server = RelayServer::bind("127.0.0.1", 0, spawn_registry(), cancel.clone())
            .await
            .unwrap();
        cancel.cancel();
        assert!(server.run().await.is_ok());
    }
}
