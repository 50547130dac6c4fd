//! socktest Protocol - Wire convention shared by client and server
//!
//! The byte stream carries exactly two message shapes, told apart only by
//! position on the connection:
//!
//! 1. Identity handshake: the client's first write is the one-byte token
//!    `"0"`; the server answers once with the decimal identity.
//! 2. Opaque relay: everything afterwards is unstructured text, echoed by
//!    the server to the connection it came from.

pub mod codec;
pub mod message;

pub use codec::{ChunkCodec, MAX_CHUNK_SIZE};
pub use message::{decode_text, identity_reply, Inbound, RelayPhase, HANDSHAKE_TOKEN};
