// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Varint length-prefixed framing over a muxed stream, the `MuxedStreamLike`
//! counterpart of `security::framed_io`'s raw-connection framing: a muxed
//! stream's `read` hands back whatever chunk the multiplexer happened to
//! deliver, not necessarily a whole message, so frames are reassembled
//! from an internal buffer instead of being read directly off the wire.

use crate::muxed::{MuxedConnError, MuxedStreamLike};
use crate::mux::MuxError;
use crate::varint;

/// Reject a declared frame length this large outright, rather than
/// buffering an unbounded amount of attacker-controlled data.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Buffers chunks off a muxed stream and reassembles varint
/// length-prefixed frames, matching what [`write_frame`] produces.
pub struct FrameIo<'a> {
    stream: &'a mut dyn MuxedStreamLike,
    buf: Vec<u8>,
}

impl<'a> FrameIo<'a> {
    pub fn new(stream: &'a mut dyn MuxedStreamLike) -> Self {
        Self { stream, buf: Vec::new() }
    }

    async fn fill(&mut self) -> Result<(), MuxedConnError> {
        let chunk = self.stream.read().await?;
        if chunk.is_empty() {
            return Err(MuxedConnError::Mux(MuxError::ConnectionClosed));
        }
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    /// Read the next complete frame, blocking on further stream reads
    /// until one is available.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, MuxedConnError> {
        loop {
            if let Ok((len, consumed)) = varint::decode(&self.buf) {
                let len = len as usize;
                if len > MAX_FRAME_LEN {
                    return Err(MuxedConnError::Mux(MuxError::ConnectionClosed));
                }
                if self.buf.len() >= consumed + len {
                    let frame = self.buf[consumed..consumed + len].to_vec();
                    self.buf.drain(0..consumed + len);
                    return Ok(frame);
                }
            }
            self.fill().await?;
        }
    }

    /// Write `payload` as one varint length-prefixed frame.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), MuxedConnError> {
        let mut out = Vec::with_capacity(payload.len() + 2);
        varint::encode_into(payload.len() as u64, &mut out);
        out.extend_from_slice(payload);
        self.stream.write(&out).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// A `MuxedStreamLike` stand-in that replays pre-seeded inbound
    /// chunks and records outbound writes, for exercising `FrameIo` in
    /// isolation from the real muxer.
    struct FakeStream {
        inbound: VecDeque<Vec<u8>>,
        outbound: Vec<Vec<u8>>,
    }

    #[async_trait]
    impl MuxedStreamLike for FakeStream {
        async fn read(&mut self) -> Result<Vec<u8>, MuxedConnError> {
            Ok(self.inbound.pop_front().unwrap_or_default())
        }
        async fn write(&mut self, data: &[u8]) -> Result<(), MuxedConnError> {
            self.outbound.push(data.to_vec());
            Ok(())
        }
        async fn close_write(&mut self) -> Result<(), MuxedConnError> {
            Ok(())
        }
        async fn close(&mut self) -> Result<(), MuxedConnError> {
            Ok(())
        }
        async fn reset(&mut self) -> Result<(), MuxedConnError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn single_write_reassembled_from_fragmented_chunks() {
        let mut framed = Vec::new();
        varint::encode_into(5, &mut framed);
        framed.extend_from_slice(b"hello");

        // Deliver the frame split across three arbitrarily sized chunks.
        let mut inbound = VecDeque::new();
        inbound.push_back(framed[..1].to_vec());
        inbound.push_back(framed[1..3].to_vec());
        inbound.push_back(framed[3..].to_vec());

        let mut stream = FakeStream { inbound, outbound: Vec::new() };
        let mut io = FrameIo::new(&mut stream);
        assert_eq!(io.read_frame().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn two_frames_in_one_chunk_are_read_separately() {
        let mut framed = Vec::new();
        varint::encode_into(1, &mut framed);
        framed.push(b'a');
        varint::encode_into(1, &mut framed);
        framed.push(b'b');

        let mut inbound = VecDeque::new();
        inbound.push_back(framed);
        let mut stream = FakeStream { inbound, outbound: Vec::new() };
        let mut io = FrameIo::new(&mut stream);
        assert_eq!(io.read_frame().await.unwrap(), b"a");
        assert_eq!(io.read_frame().await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn write_frame_prefixes_with_a_varint_length() {
        let mut stream = FakeStream { inbound: VecDeque::new(), outbound: Vec::new() };
        let mut io = FrameIo::new(&mut stream);
        io.write_frame(b"hi").await.unwrap();
        drop(io);
        let (len, consumed) = varint::decode(&stream.outbound[0]).unwrap();
        assert_eq!(len, 2);
        assert_eq!(&stream.outbound[0][consumed..], b"hi");
    }

    #[tokio::test]
    async fn empty_read_signals_connection_closed() {
        let mut stream = FakeStream { inbound: VecDeque::new(), outbound: Vec::new() };
        let mut io = FrameIo::new(&mut stream);
        assert!(matches!(
            io.read_frame().await.unwrap_err(),
            MuxedConnError::Mux(MuxError::ConnectionClosed)
        ));
    }
}
