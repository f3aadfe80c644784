// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Raw, unauthenticated, unmultiplexed byte transports. Everything above
//! this layer (security, multiplexing) is built by composing these.

pub mod memory;
pub mod tcp;
pub mod udp;

use crate::multiaddr::Multiaddr;
use async_trait::async_trait;
use thiserror::Error;

/// Raw transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// This transport cannot dial or listen on the given address.
    #[error("unsupported address: {0}")]
    UnsupportedAddress(String),
    /// The operation is not supported by this transport at all.
    #[error("unsupported operation")]
    UnsupportedOperation,
    /// The listener was closed while a caller was waiting on it.
    #[error("listener closed")]
    ListenerClosed,
    /// An in-memory dial targeted an id with no active listener.
    #[error("no listener for address")]
    NoSuchListener,
    /// A listen was attempted on an address already bound.
    #[error("address in use")]
    AddressInUse,
    /// A second read was attempted while one was already pending.
    #[error("concurrent read not supported")]
    ConcurrentRead,
    /// The connection was closed, locally or by the remote.
    #[error("connection closed")]
    ConnectionClosed,
    /// The underlying OS/network primitive failed.
    #[error("io error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::IoError(e.to_string())
    }
}

/// An open, raw, unframed byte connection.
#[async_trait]
pub trait RawConn: Send + Sync {
    /// Read into `buf`, returning the number of bytes read (0 = EOF).
    /// May return fewer bytes than a single remote write produced;
    /// callers are responsible for framing.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write all of `buf`.
    async fn write(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Close both halves of the connection.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// The remote's address, if known.
    fn remote_address(&self) -> Option<Multiaddr>;

    /// The local address this connection is bound to, if known.
    fn local_address(&self) -> Option<Multiaddr>;
}

/// Accepts inbound raw connections on a bound address.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Wait for the next inbound connection, or [`TransportError::ListenerClosed`]
    /// once the listener has been shut down.
    async fn accept(&mut self) -> Result<Box<dyn RawConn>, TransportError>;

    /// The address actually bound (useful when the caller requested an
    /// ephemeral port).
    fn local_address(&self) -> Multiaddr;

    /// Stop accepting; any waiter is woken with [`TransportError::ListenerClosed`].
    async fn close(&mut self);
}

/// Opens outbound raw connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Whether this transport can dial `addr` at all.
    fn can_dial(&self, addr: &Multiaddr) -> bool;

    /// Open a raw connection to `addr`.
    async fn dial(&self, addr: &Multiaddr) -> Result<Box<dyn RawConn>, TransportError>;
}

/// Binds a listener on `addr`.
#[async_trait]
pub trait Listenable: Send + Sync {
    /// Whether this transport can listen on `addr` at all.
    fn can_listen(&self, addr: &Multiaddr) -> bool;

    /// Bind and begin accepting on `addr`.
    async fn listen(&self, addr: &Multiaddr) -> Result<Box<dyn Listener>, TransportError>;
}
