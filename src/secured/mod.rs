// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Self-secured transports: QUIC and WebRTC-Direct embed security and
//! multiplexing natively, so `dial_secured`/`listen_secured` hand back a
//! [`MuxedConn`](crate::muxed::MuxedConn) directly rather than going
//! through the raw-transport → security-upgrade → muxer pipeline of
//! C9/C10.

#[cfg(any(feature = "quic", feature = "webrtc"))]
pub mod cert;
#[cfg(feature = "quic")]
pub mod quic;
#[cfg(feature = "webrtc")]
pub mod webrtc;

use std::time::Duration;
use thiserror::Error;

/// How long a self-secured transport will wait for the inner TLS/DTLS
/// handshake to complete before giving up.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors shared by the self-secured transports.
#[derive(Debug, Error)]
pub enum SecuredTransportError {
    #[error("failed to build or parse a self-signed certificate")]
    Certificate,
    #[error("certificate is missing the libp2p identity extension")]
    MissingIdentityExtension,
    #[error("the remote's certificate key does not authenticate the claimed peer id")]
    HandshakeFailed,
    #[error("certificate hash does not match the address's certhash component")]
    CerthashMismatch,
    #[error("peer id does not match the address's p2p component")]
    PeerIdMismatch,
    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("address is not supported by this transport")]
    UnsupportedAddress,
}
