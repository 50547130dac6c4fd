//! Client session driver.
//!
//! `ClientSession` owns the [`SessionState`] and performs the effects the
//! pure state machine asks for: spawning the connection task, writing the
//! handshake token and operator lines, closing the stream. Operator calls
//! return their notices immediately; transport notices are collected with
//! [`ClientSession::next_notices`].
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A stream that vanished mid-write is reported through its own
//!   `Closed` event, never through a panic here

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use socktest_core::{ClientId, Effect, Endpoint, Notice, SessionEvent, SessionState};
use socktest_protocol::HANDSHAKE_TOKEN;

use crate::connection::{spawn_connection, AttemptId, StreamCommand, StreamCommandSender, StreamEvent};
use crate::error::Result;

/// Snapshot for the `/info` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub addr: String,
    pub port: u16,
    pub identity: Option<ClientId>,
}

/// Single-connection client session.
pub struct ClientSession {
    /// Target used by the next connect
    endpoint: Endpoint,

    state: SessionState,

    /// Number of the most recent connect attempt
    attempt: AttemptId,

    /// Command channel of the live connection task, if any
    stream: Option<StreamCommandSender>,

    events_tx: mpsc::UnboundedSender<StreamEvent>,
    events_rx: mpsc::UnboundedReceiver<StreamEvent>,

    /// Parent of every connection task's token
    cancel_token: CancellationToken,
}

impl ClientSession {
    /// Creates an idle session targeting `endpoint`.
    pub fn new(endpoint: Endpoint) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            endpoint,
            state: SessionState::Idle,
            attempt: 0,
            stream: None,
            events_tx,
            events_rx,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<ClientId> {
        self.state.identity()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            addr: self.endpoint.addr().to_string(),
            port: self.endpoint.port(),
            identity: self.identity(),
        }
    }

    /// Changes the target host. Takes effect on the next connect.
    pub fn set_addr(&mut self, addr: &str) -> Result<()> {
        self.endpoint.set_addr(addr)?;
        info!(addr = %self.endpoint.addr(), "Target address changed");
        Ok(())
    }

    /// Changes the target port. Takes effect on the next connect.
    pub fn set_port(&mut self, port: &str) -> Result<()> {
        self.endpoint.set_port_str(port)?;
        info!(port = self.endpoint.port(), "Target port changed");
        Ok(())
    }

    /// Opens a connection unless one is pending or open.
    pub fn connect(&mut self) -> Vec<Notice> {
        self.apply(SessionEvent::ConnectRequested)
    }

    /// Ends the current connection; `Disconnected` follows from the stream.
    pub fn disconnect(&mut self) -> Vec<Notice> {
        self.apply(SessionEvent::DisconnectRequested)
    }

    /// Sends `line` unchanged if the session is ready.
    pub fn send_line(&mut self, line: impl Into<String>) -> Vec<Notice> {
        self.apply(SessionEvent::SendRequested(line.into()))
    }

    /// Waits for the next transport event of the current attempt and
    /// returns the notices it produced (possibly none).
    ///
    /// Cancel-safe: an event is either fully applied or left queued.
    pub async fn next_notices(&mut self) -> Vec<Notice> {
        loop {
            // The session holds a sender, so the channel never closes
            let Some(StreamEvent { attempt, event }) = self.events_rx.recv().await else {
                return Vec::new();
            };

            if attempt != self.attempt {
                debug!(attempt, current = self.attempt, ?event, "Dropping event from stale attempt");
                continue;
            }

            return self.apply(event);
        }
    }

    /// Stops any connection task without waiting for the stream to close.
    pub fn shutdown(&mut self) {
        self.cancel_token.cancel();
        self.stream = None;
    }

    fn apply(&mut self, event: SessionEvent) -> Vec<Notice> {
        let from = self.state;
        let transition = from.on_event(event);
        self.state = transition.next;

        if from != self.state {
            debug!(from = from.label(), to = self.state.label(), "Session transition");
        }

        let mut notices = Vec::new();
        for effect in transition.effects {
            match effect {
                Effect::OpenStream => self.open_stream(),
                Effect::SendHandshake => {
                    self.write(StreamCommand::Data(Bytes::from_static(HANDSHAKE_TOKEN)));
                }
                Effect::Transmit(line) => self.write(StreamCommand::Data(Bytes::from(line))),
                Effect::CloseStream => self.write(StreamCommand::Close),
                Effect::Notify(notice) => notices.push(notice),
            }
        }

        if !self.state.has_connection() {
            self.stream = None;
        }

        notices
    }

    fn open_stream(&mut self) {
        self.attempt += 1;
        info!(attempt = self.attempt, endpoint = %self.endpoint, "Connecting");
        self.stream = Some(spawn_connection(
            self.endpoint.clone(),
            self.attempt,
            self.events_tx.clone(),
            self.cancel_token.child_token(),
        ));
    }

    fn write(&self, command: StreamCommand) {
        let Some(stream) = &self.stream else {
            debug!(?command, "No stream to write to");
            return;
        };
        if stream.send(command).is_err() {
            debug!("Connection task already finished");
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ClientSession {
        ClientSession::new(Endpoint::new("127.0.0.1", 4242).unwrap())
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = session();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(
            session.status(),
            SessionStatus {
                addr: "127.0.0.1".to_string(),
                port: 4242,
                identity: None,
            }
        );
    }

    #[test]
    fn test_send_before_connect_reports_not_connected() {
        let mut session = session();
        assert_eq!(session.send_line("hello"), vec![Notice::NotConnected]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_disconnect_when_idle_reports_not_connected() {
        let mut session = session();
        assert_eq!(session.disconnect(), vec![Notice::NotConnected]);
    }

    #[test]
    fn test_set_target() {
        let mut session = session();
        session.set_addr("localhost").unwrap();
        session.set_port("9000").unwrap();
        assert_eq!(session.endpoint().addr(), "localhost");
        assert_eq!(session.endpoint().port(), 9000);
    }

    #[test]
    fn test_set_invalid_port_keeps_previous() {
        let mut session = session();
        assert!(session.set_port("0").is_err());
        assert!(session.set_port("abc").is_err());
        assert_eq!(session.endpoint().port(), 4242);
    }

    #[tokio::test]
    async fn test_stale_events_are_ignored() {
        let mut session = session();
        // Pretend attempt 1 is current and Ready
        session.attempt = 1;
        session.state = SessionState::Ready(ClientId::new(3));

        session
            .events_tx
            .send(StreamEvent {
                attempt: 0,
                event: SessionEvent::Closed,
            })
            .unwrap();
        session
            .events_tx
            .send(StreamEvent {
                attempt: 1,
                event: SessionEvent::DataReceived("hi".to_string()),
            })
            .unwrap();

        assert_eq!(
            session.next_notices().await,
            vec![Notice::FromServer("hi".to_string())]
        );
        assert_eq!(session.identity(), Some(ClientId::new(3)));
    }
}
