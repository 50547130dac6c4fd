//! Raw chunk codec for `tokio_util::codec::Framed`.
//!
//! The relay has no framing: whatever bytes one read returns form one
//! message, exactly like a socket `data` callback. The decoder therefore
//! hands back everything buffered (capped at [`MAX_CHUNK_SIZE`]) and the
//! encoder writes bytes through untouched.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Largest chunk surfaced by a single decode (64 KiB).
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Pass-through codec yielding the bytes of each read as one item.
#[derive(Debug, Clone, Copy)]
pub struct ChunkCodec {
    max_chunk: usize,
}

impl ChunkCodec {
    pub fn new() -> Self {
        Self {
            max_chunk: MAX_CHUNK_SIZE,
        }
    }

    /// Codec splitting buffered input into items of at most `max_chunk` bytes.
    #[cfg(test)]
    fn with_max_chunk(max_chunk: usize) -> Self {
        Self {
            max_chunk: max_chunk.max(1),
        }
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, io::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let len = src.len().min(self.max_chunk);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(item.len());
        dst.put(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::Framed;

    #[test]
    fn test_decode_returns_everything_buffered() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::from(&b"hello world"[..]);
        let item = codec.decode(&mut buf).unwrap();
        assert_eq!(item, Some(Bytes::from_static(b"hello world")));
        assert!(buf.is_empty());
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_respects_max_chunk() {
        let mut codec = ChunkCodec::with_max_chunk(4);
        let mut buf = BytesMut::from(&b"abcdefghij"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Bytes::from_static(b"abcd")));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Bytes::from_static(b"efgh")));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Bytes::from_static(b"ij")));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_zero_max_chunk_is_clamped() {
        let mut codec = ChunkCodec::with_max_chunk(0);
        let mut buf = BytesMut::from(&b"xy"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Bytes::from_static(b"x")));
    }

    #[test]
    fn test_encode_is_passthrough() {
        let mut codec = ChunkCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(Bytes::from_static(b"0"), &mut dst).unwrap();
        codec.encode(Bytes::from_static(b"ping"), &mut dst).unwrap();
        assert_eq!(&dst[..], b"0ping");
    }

    #[tokio::test]
    async fn test_framed_over_duplex() {
        let (a, b) = tokio::io::duplex(256);
        let mut left = Framed::new(a, ChunkCodec::new());
        let mut right = Framed::new(b, ChunkCodec::new());

        left.send(Bytes::from_static(b"hello")).await.unwrap();
        let got = right.next().await.unwrap().unwrap();
        assert_eq!(got, Bytes::from_static(b"hello"));

        drop(left);
        assert!(right.next().await.is_none());
    }
}
