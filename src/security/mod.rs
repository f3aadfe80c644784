// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Security upgrader: negotiates `/noise` or `/plaintext/2.0.0` over a
//! raw connection via multistream-select, then authenticates the remote
//! and yields a framed, encrypted byte stream.

pub mod framed_io;
pub mod multistream;
pub mod noise;
pub mod plaintext;

use crate::keypair::Keypair;
use crate::peer_id::PeerId;
use crate::transport::RawConn;
use async_trait::async_trait;
use thiserror::Error;

/// Security-upgrade errors.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// multistream-select did not converge on a common protocol.
    #[error("security protocol negotiation failed")]
    NegotiationFailed,
    /// The chosen protocol's handshake failed cryptographically.
    #[error("handshake failed")]
    HandshakeFailed,
    /// The handshake did not complete within the configured deadline.
    #[error("handshake timed out")]
    HandshakeTimeout,
    /// The remote's authenticated key did not hash to the expected peer id.
    #[error("peer id mismatch: expected {expected}, got {actual}")]
    PeerIdMismatch { expected: PeerId, actual: PeerId },
    /// Underlying transport I/O failed mid-handshake.
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),
}

/// An authenticated, encrypted, framed byte stream produced by a
/// security upgrade.
#[async_trait]
pub trait SecuredConn: Send + Sync {
    /// Read one decrypted application-data frame.
    async fn read(&mut self) -> Result<Vec<u8>, SecurityError>;

    /// Encrypt and send one application-data frame.
    async fn write(&mut self, payload: &[u8]) -> Result<(), SecurityError>;

    /// Close the underlying connection.
    async fn close(&mut self) -> Result<(), SecurityError>;

    /// The authenticated remote peer id.
    fn remote_peer_id(&self) -> PeerId;
}

const NOISE_PROTOCOL_ID: &str = "/noise";
const PLAINTEXT_PROTOCOL_ID: &str = "/plaintext/2.0.0";

/// Protocols this crate offers, in preference order (Noise first).
pub const SUPPORTED_SECURITY_PROTOCOLS: &[&str] = &[NOISE_PROTOCOL_ID, PLAINTEXT_PROTOCOL_ID];

/// Negotiate and run the outbound (dialer) side of the security upgrade.
/// `expected_peer` is checked against the address's `p2p` component, if any.
pub async fn upgrade_outbound(
    mut conn: Box<dyn RawConn>,
    keypair: &Keypair,
    expected_peer: Option<&PeerId>,
) -> Result<Box<dyn SecuredConn>, SecurityError> {
    let chosen = multistream::negotiate_outbound(conn.as_mut(), SUPPORTED_SECURITY_PROTOCOLS).await?;
    let secured: Box<dyn SecuredConn> = match chosen.as_str() {
        NOISE_PROTOCOL_ID => Box::new(noise::NoiseSecuredConn::upgrade_outbound(conn, keypair).await?),
        PLAINTEXT_PROTOCOL_ID => {
            Box::new(plaintext::PlaintextSecuredConn::upgrade_outbound(conn, keypair).await?)
        }
        _ => return Err(SecurityError::NegotiationFailed),
    };
    if let Some(expected) = expected_peer {
        let actual = secured.remote_peer_id();
        if &actual != expected {
            return Err(SecurityError::PeerIdMismatch {
                expected: expected.clone(),
                actual,
            });
        }
    }
    Ok(secured)
}

/// Negotiate and run the inbound (listener) side of the security upgrade.
pub async fn upgrade_inbound(
    mut conn: Box<dyn RawConn>,
    keypair: &Keypair,
) -> Result<Box<dyn SecuredConn>, SecurityError> {
    let chosen = multistream::negotiate_inbound(conn.as_mut(), SUPPORTED_SECURITY_PROTOCOLS).await?;
    match chosen.as_str() {
        NOISE_PROTOCOL_ID => Ok(Box::new(noise::NoiseSecuredConn::upgrade_inbound(conn, keypair).await?)),
        PLAINTEXT_PROTOCOL_ID => {
            Ok(Box::new(plaintext::PlaintextSecuredConn::upgrade_inbound(conn, keypair).await?))
        }
        _ => Err(SecurityError::NegotiationFailed),
    }
}
