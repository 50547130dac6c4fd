//! Handshake and relay message handling.

use bytes::Bytes;
use socktest_core::ClientId;

/// Token the client writes immediately after the stream opens.
pub const HANDSHAKE_TOKEN: &[u8] = b"0";

/// How the server must treat one inbound chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Reply with the connection's identity.
    IdentityRequest,
    /// Relay the bytes back unchanged.
    Payload(Bytes),
}

/// Per-connection position in the protocol, server side.
///
/// Only the very first chunk on a connection can be a handshake. After
/// that, even a chunk equal to [`HANDSHAKE_TOKEN`] is plain payload, so the
/// identity is sent at most once and always before any other data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayPhase {
    #[default]
    AwaitingHandshake,
    Relaying,
}

impl RelayPhase {
    /// Classifies `data` and advances the phase.
    pub fn classify(&mut self, data: Bytes) -> Inbound {
        match self {
            Self::AwaitingHandshake => {
                *self = Self::Relaying;
                if data.as_ref() == HANDSHAKE_TOKEN {
                    Inbound::IdentityRequest
                } else {
                    Inbound::Payload(data)
                }
            }
            Self::Relaying => Inbound::Payload(data),
        }
    }
}

/// Encodes the server's handshake reply: decimal digits, no terminator.
///
/// The client reads it back with `ClientId::from_str`.
pub fn identity_reply(id: ClientId) -> Bytes {
    Bytes::from(id.to_string())
}

/// Decodes a chunk as UTF-8, replacing invalid sequences.
///
/// A multi-byte character split across two reads comes out as two
/// replacement characters; chunks are displayed, never re-assembled.
pub fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_token_is_identity_request() {
        let mut phase = RelayPhase::default();
        assert_eq!(
            phase.classify(Bytes::from_static(b"0")),
            Inbound::IdentityRequest
        );
        assert_eq!(phase, RelayPhase::Relaying);
    }

    #[test]
    fn test_repeated_token_is_payload() {
        let mut phase = RelayPhase::default();
        let _ = phase.classify(Bytes::from_static(b"0"));
        assert_eq!(
            phase.classify(Bytes::from_static(b"0")),
            Inbound::Payload(Bytes::from_static(b"0"))
        );
    }

    #[test]
    fn test_non_token_first_chunk_ends_handshake_window() {
        let mut phase = RelayPhase::default();
        assert_eq!(
            phase.classify(Bytes::from_static(b"hello")),
            Inbound::Payload(Bytes::from_static(b"hello"))
        );
        assert_eq!(
            phase.classify(Bytes::from_static(b"0")),
            Inbound::Payload(Bytes::from_static(b"0"))
        );
    }

    #[test]
    fn test_token_with_newline_is_payload() {
        let mut phase = RelayPhase::default();
        assert_eq!(
            phase.classify(Bytes::from_static(b"0\n")),
            Inbound::Payload(Bytes::from_static(b"0\n"))
        );
    }

    #[test]
    fn test_identity_reply_is_decimal() {
        assert_eq!(identity_reply(ClientId::new(17)), Bytes::from_static(b"17"));
    }

    #[test]
    fn test_identity_reply_parses_back() {
        let reply = identity_reply(ClientId::new(42));
        let parsed: ClientId = decode_text(&reply).parse().unwrap();
        assert_eq!(parsed, ClientId::new(42));
    }

    #[test]
    fn test_decode_text_lossy() {
        assert_eq!(decode_text(b"hi"), "hi");
        assert_eq!(decode_text(&[0x68, 0xff]), "h\u{fffd}");
    }
}
