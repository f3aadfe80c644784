// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! The common surface every flavor of multiplexed connection presents to
//! the upgrade orchestrator: the bundled yamux-shaped muxer over a
//! security-upgraded raw connection (`mux::MuxedConnection`), and the
//! self-secured transports of `secured/`, whose native streams are
//! adapted to the same shape so the orchestrator does not need to care
//! which one it got.

use async_trait::async_trait;
use thiserror::Error;

use crate::mux::MuxError;
use crate::peer_id::PeerId;
use crate::security::SecurityError;
use crate::transport::TransportError;

/// Errors common to every muxed-connection flavor.
#[derive(Debug, Error)]
pub enum MuxedConnError {
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("handshake did not complete within the configured deadline")]
    HandshakeTimeout,
    #[error("the remote's certificate key does not hash to the expected peer id")]
    PeerIdMismatch,
    #[error("no configured transport can dial this address")]
    NoTransportForAddress,
}

/// A connection to a single remote peer capable of opening and accepting
/// bidirectional streams, regardless of whether multiplexing is our own
/// yamux-shaped framing or a transport's native stream support.
#[async_trait]
pub trait MuxedConn: Send + Sync {
    async fn open_stream(&self) -> Result<Box<dyn MuxedStreamLike>, MuxedConnError>;
    async fn accept_stream(&self) -> Result<Box<dyn MuxedStreamLike>, MuxedConnError>;
    async fn close(&self) -> Result<(), MuxedConnError>;
    fn remote_peer_id(&self) -> PeerId;
}

/// One bidirectional stream of a [`MuxedConn`].
#[async_trait]
pub trait MuxedStreamLike: Send + Sync {
    async fn read(&mut self) -> Result<Vec<u8>, MuxedConnError>;
    async fn write(&mut self, data: &[u8]) -> Result<(), MuxedConnError>;
    async fn close_write(&mut self) -> Result<(), MuxedConnError>;
    async fn close(&mut self) -> Result<(), MuxedConnError>;
    async fn reset(&mut self) -> Result<(), MuxedConnError>;
}

// `open_stream` takes `self: &Arc<Self>`, so only `Arc<MuxedConnection>`
// (not a bare `MuxedConnection`) can implement the trait.
#[async_trait]
impl MuxedConn for std::sync::Arc<crate::mux::MuxedConnection> {
    async fn open_stream(&self) -> Result<Box<dyn MuxedStreamLike>, MuxedConnError> {
        let stream = crate::mux::MuxedConnection::open_stream(self).await?;
        Ok(Box::new(stream))
    }

    async fn accept_stream(&self) -> Result<Box<dyn MuxedStreamLike>, MuxedConnError> {
        let stream = crate::mux::MuxedConnection::accept_stream(self).await?;
        Ok(Box::new(stream))
    }

    async fn close(&self) -> Result<(), MuxedConnError> {
        Ok(crate::mux::MuxedConnection::close(self).await?)
    }

    fn remote_peer_id(&self) -> PeerId {
        crate::mux::MuxedConnection::remote_peer_id(self).clone()
    }
}

#[async_trait]
impl MuxedStreamLike for crate::mux::MuxedStream {
    async fn read(&mut self) -> Result<Vec<u8>, MuxedConnError> {
        Ok(crate::mux::MuxedStream::read(self).await?)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), MuxedConnError> {
        Ok(crate::mux::MuxedStream::write(self, data).await?)
    }

    async fn close_write(&mut self) -> Result<(), MuxedConnError> {
        Ok(crate::mux::MuxedStream::close_write(self).await?)
    }

    async fn close(&mut self) -> Result<(), MuxedConnError> {
        Ok(crate::mux::MuxedStream::close(self).await?)
    }

    async fn reset(&mut self) -> Result<(), MuxedConnError> {
        Ok(crate::mux::MuxedStream::reset(self).await?)
    }
}
