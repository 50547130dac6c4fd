//! Client session state machine.
//!
//! The client side of the relay is modelled as an explicit finite-state
//! machine. Every input (operator request or transport event) is a
//! [`SessionEvent`]; [`SessionState::on_event`] is a pure function that
//! returns the next state together with the [`Effect`]s the driver must
//! perform. No I/O happens here.
//!
//! ```text
//!            connect              established            identity parsed
//!   Idle ─────────────▶ Connecting ───────────▶ Handshaking ─────────────▶ Ready
//!    ▲                      │                        │                      │
//!    │      connect failed  │                        │ closed / reset       │ closed / reset
//!    └──────────────────────┘                        ▼                      ▼
//!                                                  Closed ◀─────────────────┘
//! ```
//!
//! `Closed` accepts a new `connect` exactly like `Idle`.

use std::fmt;
use std::io;

use tracing::debug;

use crate::identity::ClientId;

// ============================================================================
// Transport Errors
// ============================================================================

/// Classification of transport failures reported to the operator.
///
/// Refused and reset are kept apart because they are reported with
/// different messages and a reset also drops the held identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Peer actively refused the connection.
    Refused,
    /// Peer reset an established connection.
    Reset,
    /// Host could not be resolved or the address is unusable.
    InvalidAddress(String),
    /// Anything else, with the OS message.
    Other(String),
}

impl TransportErrorKind {
    /// Maps an I/O error onto the operator-facing classification.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => Self::Reset,
            io::ErrorKind::InvalidInput | io::ErrorKind::AddrNotAvailable => {
                Self::InvalidAddress(err.to_string())
            }
            _ => Self::Other(err.to_string()),
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused => write!(f, "connection refused"),
            Self::Reset => write!(f, "connection reset"),
            Self::InvalidAddress(msg) => write!(f, "invalid address: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

// ============================================================================
// States, Events, Effects
// ============================================================================

/// Lifecycle of the client's single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection and none requested.
    #[default]
    Idle,
    /// Stream open in progress.
    Connecting,
    /// Stream open, identity request sent, waiting for the reply.
    Handshaking,
    /// Identity received; free-form relay.
    Ready(ClientId),
    /// Previous connection ended; a new connect is allowed.
    Closed,
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Operator asked to connect.
    ConnectRequested,
    /// Stream established.
    Connected,
    /// Stream could not be opened.
    ConnectFailed {
        /// Human-readable target, e.g. `127.0.0.1 4242`
        target: String,
        kind: TransportErrorKind,
    },
    /// A chunk of text arrived from the server.
    DataReceived(String),
    /// Operator typed a line to send.
    SendRequested(String),
    /// Operator asked to disconnect.
    DisconnectRequested,
    /// Established stream failed.
    Errored(TransportErrorKind),
    /// Stream ended.
    Closed,
}

/// Work the driver performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start opening the stream to the configured endpoint.
    OpenStream,
    /// Write the identity request token.
    SendHandshake,
    /// Write an operator line.
    Transmit(String),
    /// End the stream (write side first, close follows).
    CloseStream,
    /// Show something to the operator.
    Notify(Notice),
}

/// Operator-visible outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    AlreadyConnected,
    NotConnected,
    AssignedId(ClientId),
    /// First reply after connect was not an identity.
    ProtocolWarning {
        received: String,
    },
    FromServer(String),
    ConnectionRefused {
        target: String,
    },
    ConnectionReset,
    TransportError(String),
    Disconnected,
}

/// Result of feeding one event to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: SessionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn stay(state: SessionState) -> Self {
        Self::to(state, Vec::new())
    }

    fn notify(state: SessionState, notice: Notice) -> Self {
        Self::to(state, vec![Effect::Notify(notice)])
    }
}

impl SessionState {
    /// Identity held by the session, if the handshake completed.
    pub fn identity(&self) -> Option<ClientId> {
        match self {
            Self::Ready(id) => Some(*id),
            _ => None,
        }
    }

    /// True while a stream is pending or open.
    pub fn has_connection(&self) -> bool {
        matches!(self, Self::Connecting | Self::Handshaking | Self::Ready(_))
    }

    /// Short lowercase label for logs and status output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Ready(_) => "ready",
            Self::Closed => "closed",
        }
    }

    /// Computes the transition for `event` without performing any I/O.
    #[must_use]
    pub fn on_event(self, event: SessionEvent) -> Transition {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            // --- connect ---------------------------------------------------
            (S::Idle | S::Closed, E::ConnectRequested) => {
                Transition::to(S::Connecting, vec![Effect::OpenStream])
            }
            (state, E::ConnectRequested) => Transition::notify(state, Notice::AlreadyConnected),

            (S::Connecting, E::Connected) => {
                Transition::to(S::Handshaking, vec![Effect::SendHandshake])
            }

            (S::Connecting, E::ConnectFailed { target, kind }) => {
                Transition::notify(S::Idle, connect_failure_notice(target, kind))
            }

            // --- inbound data ----------------------------------------------
            (S::Handshaking, E::DataReceived(data)) => match data.parse::<ClientId>() {
                Ok(id) => Transition::notify(S::Ready(id), Notice::AssignedId(id)),
                Err(_) => Transition::notify(
                    S::Handshaking,
                    Notice::ProtocolWarning { received: data },
                ),
            },
            (S::Ready(id), E::DataReceived(data)) => {
                Transition::notify(S::Ready(id), Notice::FromServer(data))
            }

            // --- outbound data ---------------------------------------------
            (S::Ready(id), E::SendRequested(line)) => {
                Transition::to(S::Ready(id), vec![Effect::Transmit(line)])
            }
            (state, E::SendRequested(_)) => Transition::notify(state, Notice::NotConnected),

            // --- teardown --------------------------------------------------
            (state, E::DisconnectRequested) if state.has_connection() => {
                Transition::to(state, vec![Effect::CloseStream])
            }
            (state, E::DisconnectRequested) => Transition::notify(state, Notice::NotConnected),

            (S::Connecting, E::Errored(kind)) => Transition::notify(
                S::Idle,
                connect_failure_notice(String::new(), kind),
            ),
            (state, E::Errored(TransportErrorKind::Reset)) if state.has_connection() => {
                Transition::notify(S::Closed, Notice::ConnectionReset)
            }
            (state, E::Errored(kind)) if state.has_connection() => {
                Transition::notify(state, Notice::TransportError(kind.to_string()))
            }

            (state, E::Closed) if state.has_connection() => {
                Transition::notify(S::Closed, Notice::Disconnected)
            }

            // Events for a stream that is no longer ours
            (state, event) => {
                debug!(state = state.label(), ?event, "Ignoring event in current state");
                Transition::stay(state)
            }
        }
    }
}

fn connect_failure_notice(target: String, kind: TransportErrorKind) -> Notice {
    match kind {
        TransportErrorKind::Refused => Notice::ConnectionRefused { target },
        TransportErrorKind::Reset => Notice::ConnectionReset,
        other => Notice::TransportError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(id: u64) -> SessionState {
        SessionState::Ready(ClientId::new(id))
    }

    /// Drives `events` from Idle and returns the final state.
    fn run(events: Vec<SessionEvent>) -> SessionState {
        events
            .into_iter()
            .fold(SessionState::Idle, |state, event| state.on_event(event).next)
    }

    #[test]
    fn test_happy_path_reaches_ready() {
        let t = SessionState::Idle.on_event(SessionEvent::ConnectRequested);
        assert_eq!(t.next, SessionState::Connecting);
        assert_eq!(t.effects, vec![Effect::OpenStream]);

        let t = t.next.on_event(SessionEvent::Connected);
        assert_eq!(t.next, SessionState::Handshaking);
        assert_eq!(t.effects, vec![Effect::SendHandshake]);

        let t = t.next.on_event(SessionEvent::DataReceived("3".into()));
        assert_eq!(t.next, ready(3));
        assert_eq!(t.next.identity(), Some(ClientId::new(3)));
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notice::AssignedId(ClientId::new(3)))]
        );
    }

    #[test]
    fn test_connect_rejected_while_pending_or_open() {
        for state in [SessionState::Connecting, SessionState::Handshaking, ready(1)] {
            let t = state.on_event(SessionEvent::ConnectRequested);
            assert_eq!(t.next, state);
            assert_eq!(t.effects, vec![Effect::Notify(Notice::AlreadyConnected)]);
        }
    }

    #[test]
    fn test_connect_allowed_from_closed() {
        let t = SessionState::Closed.on_event(SessionEvent::ConnectRequested);
        assert_eq!(t.next, SessionState::Connecting);
        assert_eq!(t.effects, vec![Effect::OpenStream]);
    }

    #[test]
    fn test_connect_failure_returns_to_idle() {
        let t = SessionState::Connecting.on_event(SessionEvent::ConnectFailed {
            target: "127.0.0.1 4242".into(),
            kind: TransportErrorKind::Refused,
        });
        assert_eq!(t.next, SessionState::Idle);
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notice::ConnectionRefused {
                target: "127.0.0.1 4242".into()
            })]
        );
    }

    #[test]
    fn test_malformed_handshake_stays_handshaking() {
        let t = SessionState::Handshaking.on_event(SessionEvent::DataReceived("hello".into()));
        assert_eq!(t.next, SessionState::Handshaking);
        assert_eq!(t.next.identity(), None);
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notice::ProtocolWarning {
                received: "hello".into()
            })]
        );
    }

    #[test]
    fn test_ready_data_is_delivered_verbatim() {
        let t = ready(2).on_event(SessionEvent::DataReceived("42".into()));
        assert_eq!(t.next, ready(2));
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notice::FromServer("42".into()))]
        );
    }

    #[test]
    fn test_send_only_when_ready() {
        let t = ready(0).on_event(SessionEvent::SendRequested("ping".into()));
        assert_eq!(t.effects, vec![Effect::Transmit("ping".into())]);

        for state in [
            SessionState::Idle,
            SessionState::Connecting,
            SessionState::Handshaking,
            SessionState::Closed,
        ] {
            let t = state.on_event(SessionEvent::SendRequested("ping".into()));
            assert_eq!(t.next, state);
            assert_eq!(t.effects, vec![Effect::Notify(Notice::NotConnected)]);
        }
    }

    #[test]
    fn test_disconnect_then_close_clears_identity() {
        let t = ready(5).on_event(SessionEvent::DisconnectRequested);
        assert_eq!(t.next, ready(5));
        assert_eq!(t.effects, vec![Effect::CloseStream]);

        let t = t.next.on_event(SessionEvent::Closed);
        assert_eq!(t.next, SessionState::Closed);
        assert_eq!(t.next.identity(), None);
        assert_eq!(t.effects, vec![Effect::Notify(Notice::Disconnected)]);
    }

    #[test]
    fn test_disconnect_without_connection() {
        let t = SessionState::Idle.on_event(SessionEvent::DisconnectRequested);
        assert_eq!(t.next, SessionState::Idle);
        assert_eq!(t.effects, vec![Effect::Notify(Notice::NotConnected)]);
    }

    #[test]
    fn test_reset_clears_identity_and_swallows_close() {
        let t = ready(9).on_event(SessionEvent::Errored(TransportErrorKind::Reset));
        assert_eq!(t.next, SessionState::Closed);
        assert_eq!(t.effects, vec![Effect::Notify(Notice::ConnectionReset)]);

        let t = t.next.on_event(SessionEvent::Closed);
        assert_eq!(t.next, SessionState::Closed);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_other_error_keeps_state_until_close() {
        let t = ready(1).on_event(SessionEvent::Errored(TransportErrorKind::Other(
            "broken pipe".into(),
        )));
        assert_eq!(t.next, ready(1));
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notice::TransportError("broken pipe".into()))]
        );
    }

    #[test]
    fn test_stale_events_are_ignored() {
        let t = SessionState::Idle.on_event(SessionEvent::DataReceived("0".into()));
        assert_eq!(t.next, SessionState::Idle);
        assert!(t.effects.is_empty());

        let t = SessionState::Idle.on_event(SessionEvent::Connected);
        assert_eq!(t.next, SessionState::Idle);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_reconnect_after_close() {
        let state = run(vec![
            SessionEvent::ConnectRequested,
            SessionEvent::Connected,
            SessionEvent::DataReceived("0".into()),
            SessionEvent::Closed,
            SessionEvent::ConnectRequested,
            SessionEvent::Connected,
            SessionEvent::DataReceived("2".into()),
        ]);
        assert_eq!(state, ready(2));
    }

    #[test]
    fn test_transport_error_from_io() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(TransportErrorKind::from_io(&refused), TransportErrorKind::Refused);

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(TransportErrorKind::from_io(&reset), TransportErrorKind::Reset);

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(
            TransportErrorKind::from_io(&other),
            TransportErrorKind::Other("boom".into())
        );
    }
}
