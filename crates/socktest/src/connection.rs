//! Per-attempt connection task.
//!
//! Each connect attempt spawns one task that opens the stream, then pumps
//! bytes in both directions until the stream ends. It never decides
//! anything: every outcome is reported to the session as a
//! [`SessionEvent`] tagged with the attempt number, so events from an
//! abandoned stream can be told apart from the current one.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` in this module.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use socktest_core::{Endpoint, SessionEvent, TransportErrorKind};
use socktest_protocol::{decode_text, ChunkCodec};

/// Sequence number of a connect attempt.
pub type AttemptId = u64;

/// What the session asks the stream to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCommand {
    /// Write bytes as-is.
    Data(Bytes),
    /// Shut down the write side; reading continues until the peer closes.
    Close,
}

/// Event reported by a connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub attempt: AttemptId,
    pub event: SessionEvent,
}

/// Sender half used by the session to drive a connection task.
pub type StreamCommandSender = mpsc::UnboundedSender<StreamCommand>;

/// Sender half connection tasks report events on.
pub type StreamEventSender = mpsc::UnboundedSender<StreamEvent>;

/// Spawns the connection task for `attempt` and returns its command sender.
pub fn spawn_connection(
    endpoint: Endpoint,
    attempt: AttemptId,
    events: StreamEventSender,
    cancel_token: CancellationToken,
) -> StreamCommandSender {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let task = ConnectionTask {
        endpoint,
        attempt,
        events,
        commands: command_rx,
        cancel_token,
    };
    tokio::spawn(task.run());
    command_tx
}

struct ConnectionTask {
    endpoint: Endpoint,
    attempt: AttemptId,
    events: StreamEventSender,
    commands: mpsc::UnboundedReceiver<StreamCommand>,
    cancel_token: CancellationToken,
}

impl ConnectionTask {
    async fn run(mut self) {
        let target = format!("{} {}", self.endpoint.addr(), self.endpoint.port());
        debug!(attempt = self.attempt, target = %target, "Opening stream");

        let connect = TcpStream::connect((self.endpoint.addr(), self.endpoint.port()));
        let stream = tokio::select! {
            _ = self.cancel_token.cancelled() => return,
            result = connect => result,
        };

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(attempt = self.attempt, target = %target, error = %e, "Connect failed");
                self.emit(SessionEvent::ConnectFailed {
                    target,
                    kind: TransportErrorKind::from_io(&e),
                });
                return;
            }
        };

        info!(attempt = self.attempt, target = %target, "Connected");
        self.emit(SessionEvent::Connected);

        let mut framed = Framed::new(stream, ChunkCodec::new());
        let mut write_open = true;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    debug!(attempt = self.attempt, "Connection task cancelled");
                    return;
                }

                command = self.commands.recv(), if write_open => {
                    let result = match command {
                        Some(StreamCommand::Data(bytes)) => framed.send(bytes).await,
                        Some(StreamCommand::Close) | None => {
                            write_open = false;
                            framed.close().await
                        }
                    };
                    if let Err(e) = result {
                        warn!(attempt = self.attempt, error = %e, "Write failed");
                        self.emit(SessionEvent::Errored(TransportErrorKind::from_io(&e)));
                        break;
                    }
                }

                inbound = framed.next() => match inbound {
                    Some(Ok(chunk)) => {
                        self.emit(SessionEvent::DataReceived(decode_text(&chunk)));
                    }
                    Some(Err(e)) => {
                        warn!(attempt = self.attempt, error = %e, "Read failed");
                        self.emit(SessionEvent::Errored(TransportErrorKind::from_io(&e)));
                        break;
                    }
                    None => {
                        debug!(attempt = self.attempt, "Server closed the stream");
                        break;
                    }
                },
            }
        }

        self.emit(SessionEvent::Closed);
    }

    fn emit(&self, event: SessionEvent) {
        let event = StreamEvent {
            attempt: self.attempt,
            event,
        };
        if self.events.send(event).is_err() {
            debug!(attempt = self.attempt, "Session gone, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> SessionEvent {
        let event = rx.recv().await.unwrap();
        assert_eq!(event.attempt, 7);
        event.event
    }

    #[tokio::test]
    async fn test_reports_connect_failure_with_target() {
        // Grab a free port, then release it so nothing listens there
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
        let _commands = spawn_connection(endpoint, 7, tx, CancellationToken::new());

        match next_event(&mut rx).await {
            SessionEvent::ConnectFailed { target, kind } => {
                assert_eq!(target, format!("127.0.0.1 {port}"));
                assert_eq!(kind, TransportErrorKind::Refused);
            }
            other => panic!("Expected ConnectFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pumps_data_and_reports_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
        let commands = spawn_connection(endpoint, 7, tx, CancellationToken::new());

        let (mut peer, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, SessionEvent::Connected);

        commands.send(StreamCommand::Data(Bytes::from_static(b"0"))).unwrap();
        let mut buf = [0u8; 8];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"0");

        peer.write_all(b"5").await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            SessionEvent::DataReceived("5".to_string())
        );

        // Close shuts down our write side; the peer sees EOF and hangs up
        commands.send(StreamCommand::Close).unwrap();
        assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
        drop(peer);

        assert_eq!(next_event(&mut rx).await, SessionEvent::Closed);
    }

    #[tokio::test]
    async fn test_cancel_stops_task_silently() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
        let _commands = spawn_connection(endpoint, 7, tx, cancel.clone());

        let (_peer, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, SessionEvent::Connected);

        cancel.cancel();
        // Task exits and drops its sender without emitting Closed
        assert!(rx.recv().await.is_none());
    }
}
