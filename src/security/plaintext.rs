// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! `/plaintext/2.0.0`: exchange identity handshake payloads with no
//! encryption. Used only by in-memory/testing transports, never for
//! anything that crosses an untrusted network.

use super::framed_io::{read_frame, write_frame};
use super::{SecuredConn, SecurityError};
use crate::keypair::{Keypair, PublicKey};
use crate::peer_id::PeerId;
use crate::protobuf_lite::{self, Encoder};
use crate::transport::RawConn;
use async_trait::async_trait;

const FIELD_PEER_ID: u64 = 1;
const FIELD_PUBLIC_KEY: u64 = 2;

fn encode_exchange(peer_id: &PeerId, public_key: &PublicKey) -> Vec<u8> {
    Encoder::new()
        .field(FIELD_PEER_ID, &peer_id.to_bytes())
        .field(FIELD_PUBLIC_KEY, &public_key.canonical_encode())
        .into_bytes()
}

fn decode_exchange(bytes: &[u8]) -> Result<(PeerId, PublicKey), SecurityError> {
    let fields = protobuf_lite::decode(bytes).map_err(|_| SecurityError::HandshakeFailed)?;
    let peer_id_bytes =
        protobuf_lite::field(&fields, FIELD_PEER_ID).ok_or(SecurityError::HandshakeFailed)?;
    let pubkey_bytes =
        protobuf_lite::field(&fields, FIELD_PUBLIC_KEY).ok_or(SecurityError::HandshakeFailed)?;
    let declared_peer = PeerId::from_bytes(peer_id_bytes).map_err(|_| SecurityError::HandshakeFailed)?;
    let public_key =
        PublicKey::from_canonical_encode(pubkey_bytes).map_err(|_| SecurityError::HandshakeFailed)?;
    if public_key.derive_peer_id() != declared_peer {
        return Err(SecurityError::HandshakeFailed);
    }
    Ok((declared_peer, public_key))
}

/// An unencrypted "secured" connection, authenticated only by the
/// exchanged identity handshake payload.
pub struct PlaintextSecuredConn {
    conn: Box<dyn RawConn>,
    remote_peer: PeerId,
}

impl PlaintextSecuredConn {
    pub async fn upgrade_outbound(
        mut conn: Box<dyn RawConn>,
        keypair: &Keypair,
    ) -> Result<Self, SecurityError> {
        let local_peer = keypair.derive_peer_id();
        let payload = encode_exchange(&local_peer, &keypair.public());
        write_frame(conn.as_mut(), &payload).await?;
        let remote_payload = read_frame(conn.as_mut()).await?;
        let (remote_peer, _remote_key) = decode_exchange(&remote_payload)?;
        Ok(Self { conn, remote_peer })
    }

    pub async fn upgrade_inbound(
        mut conn: Box<dyn RawConn>,
        keypair: &Keypair,
    ) -> Result<Self, SecurityError> {
        let remote_payload = read_frame(conn.as_mut()).await?;
        let (remote_peer, _remote_key) = decode_exchange(&remote_payload)?;
        let local_peer = keypair.derive_peer_id();
        let payload = encode_exchange(&local_peer, &keypair.public());
        write_frame(conn.as_mut(), &payload).await?;
        Ok(Self { conn, remote_peer })
    }
}

#[async_trait]
impl SecuredConn for PlaintextSecuredConn {
    async fn read(&mut self) -> Result<Vec<u8>, SecurityError> {
        Ok(read_frame(self.conn.as_mut()).await?)
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), SecurityError> {
        write_frame(self.conn.as_mut(), payload).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SecurityError> {
        self.conn.close().await?;
        Ok(())
    }

    fn remote_peer_id(&self) -> PeerId {
        self.remote_peer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiaddr::Multiaddr;
    use crate::transport::memory::MemoryTransport;
    use crate::transport::{Dialer, Listenable};

    #[tokio::test]
    async fn handshake_authenticates_both_sides() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(9101);
        let mut listener = transport.listen(&addr).await.unwrap();

        let server_keypair = Keypair::generate_ed25519().unwrap();
        let server_peer = server_keypair.derive_peer_id();
        let server_task = tokio::spawn(async move {
            let conn = listener.accept().await.unwrap();
            PlaintextSecuredConn::upgrade_inbound(conn, &server_keypair).await
        });

        let client_keypair = Keypair::generate_ed25519().unwrap();
        let client_peer = client_keypair.derive_peer_id();
        let client_conn = transport.dial(&addr).await.unwrap();
        let mut client_secured =
            PlaintextSecuredConn::upgrade_outbound(client_conn, &client_keypair).await.unwrap();

        let mut server_secured = server_task.await.unwrap().unwrap();
        assert_eq!(client_secured.remote_peer_id(), server_peer);
        assert_eq!(server_secured.remote_peer_id(), client_peer);

        client_secured.write(b"hi").await.unwrap();
        let got = server_secured.read().await.unwrap();
        assert_eq!(got, b"hi");
    }
}
