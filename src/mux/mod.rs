// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Stream multiplexer over a secured connection: a yamux-shaped framing
//! with per-stream flow-controlled windows.

pub mod connection;
pub mod frame;
pub mod stream;

pub use connection::{MuxedConnection, Role};
pub use stream::MuxedStream;

use thiserror::Error;

/// Default initial send window per stream, in bytes.
pub const DEFAULT_WINDOW: u32 = 256 * 1024;

/// Muxer protocol ids this crate offers during multistream-select, in
/// preference order.
pub const SUPPORTED_MUXER_PROTOCOLS: &[&str] = &["/yamux/1.0.0"];

/// Multiplexer errors.
#[derive(Debug, Error)]
pub enum MuxError {
    /// The underlying secured connection failed.
    #[error("secured connection error: {0}")]
    Secured(#[from] crate::security::SecurityError),
    /// A frame carried a malformed header.
    #[error("frame error: {0}")]
    Frame(#[from] frame::FrameError),
    /// The connection (or the stream) has already been closed.
    #[error("connection closed")]
    ConnectionClosed,
    /// The stream was reset, locally or by the remote; irrecoverable.
    #[error("stream reset")]
    StreamReset,
}
