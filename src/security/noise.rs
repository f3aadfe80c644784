// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! `/noise`: the XX handshake pattern over `snow`'s state machine,
//! `Noise_XX_25519_ChaChaPoly_SHA256`, with a signed identity payload
//! binding the ephemeral Noise static key to the caller's long-term
//! [`Keypair`].

use super::framed_io::{read_frame, write_frame};
use super::{SecuredConn, SecurityError};
use crate::keypair::{Keypair, PublicKey};
use crate::peer_id::PeerId;
use crate::protobuf_lite::{self, Encoder};
use crate::transport::RawConn;
use async_trait::async_trait;

const NOISE_PARAMS: &str = "Noise_XX_25519_ChaChaPoly_SHA256";
const STATIC_KEY_SIGNATURE_PREFIX: &[u8] = b"noise-libp2p-static-key:";
const FIELD_IDENTITY_KEY: u64 = 1;
const FIELD_IDENTITY_SIG: u64 = 2;

/// Maximum plaintext payload this crate will send in a single noise
/// transport message (well under the 65535-byte Noise message ceiling
/// once the 16-byte Poly1305 tag is added).
const MAX_TRANSPORT_PAYLOAD: usize = 65000;

fn encode_payload(identity_key: &PublicKey, identity_sig: &[u8]) -> Vec<u8> {
    Encoder::new()
        .field(FIELD_IDENTITY_KEY, &identity_key.canonical_encode())
        .field(FIELD_IDENTITY_SIG, identity_sig)
        .into_bytes()
}

fn decode_payload(bytes: &[u8]) -> Result<(PublicKey, Vec<u8>), SecurityError> {
    let fields = protobuf_lite::decode(bytes).map_err(|_| SecurityError::HandshakeFailed)?;
    let key_bytes =
        protobuf_lite::field(&fields, FIELD_IDENTITY_KEY).ok_or(SecurityError::HandshakeFailed)?;
    let sig_bytes =
        protobuf_lite::field(&fields, FIELD_IDENTITY_SIG).ok_or(SecurityError::HandshakeFailed)?;
    let key = PublicKey::from_canonical_encode(key_bytes).map_err(|_| SecurityError::HandshakeFailed)?;
    Ok((key, sig_bytes.to_vec()))
}

fn verify_remote_payload(
    payload_bytes: &[u8],
    remote_static_noise_key: &[u8],
) -> Result<PeerId, SecurityError> {
    let (identity_key, identity_sig) = decode_payload(payload_bytes)?;
    let mut signed = Vec::with_capacity(STATIC_KEY_SIGNATURE_PREFIX.len() + remote_static_noise_key.len());
    signed.extend_from_slice(STATIC_KEY_SIGNATURE_PREFIX);
    signed.extend_from_slice(remote_static_noise_key);
    identity_key
        .verify(&signed, &identity_sig)
        .map_err(|_| SecurityError::HandshakeFailed)?;
    Ok(identity_key.derive_peer_id())
}

fn local_payload(keypair: &Keypair, local_static_noise_key: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let mut signed = Vec::with_capacity(STATIC_KEY_SIGNATURE_PREFIX.len() + local_static_noise_key.len());
    signed.extend_from_slice(STATIC_KEY_SIGNATURE_PREFIX);
    signed.extend_from_slice(local_static_noise_key);
    let sig = keypair.sign(&signed).map_err(|_| SecurityError::HandshakeFailed)?;
    Ok(encode_payload(&keypair.public(), &sig))
}

fn new_builder() -> snow::Builder<'static> {
    let params: snow::params::NoiseParams = NOISE_PARAMS.parse().expect("static noise params string");
    snow::Builder::new(params)
}

/// A Noise-secured, ChaCha20-Poly1305-framed authenticated connection.
pub struct NoiseSecuredConn {
    conn: Box<dyn RawConn>,
    transport: snow::TransportState,
    remote_peer: PeerId,
}

impl NoiseSecuredConn {
    pub async fn upgrade_outbound(
        mut conn: Box<dyn RawConn>,
        keypair: &Keypair,
    ) -> Result<Self, SecurityError> {
        let static_keys = new_builder().generate_keypair().map_err(|_| SecurityError::HandshakeFailed)?;
        let mut handshake = new_builder()
            .local_private_key(&static_keys.private)
            .build_initiator()
            .map_err(|_| SecurityError::HandshakeFailed)?;

        // -> e
        let mut buf = vec![0u8; 1024];
        let len = handshake.write_message(&[], &mut buf).map_err(|_| SecurityError::HandshakeFailed)?;
        write_frame(conn.as_mut(), &buf[..len]).await?;

        // <- e, ee, s, es (carries the responder's identity payload)
        let msg2 = read_frame(conn.as_mut()).await?;
        let mut payload_buf = vec![0u8; msg2.len()];
        let payload_len = handshake
            .read_message(&msg2, &mut payload_buf)
            .map_err(|_| SecurityError::HandshakeFailed)?;
        let remote_static = handshake
            .get_remote_static()
            .ok_or(SecurityError::HandshakeFailed)?
            .to_vec();
        let remote_peer = verify_remote_payload(&payload_buf[..payload_len], &remote_static)?;

        // -> s, se (carries our identity payload)
        let payload = local_payload(keypair, &static_keys.public)?;
        let mut buf = vec![0u8; payload.len() + 256];
        let len = handshake
            .write_message(&payload, &mut buf)
            .map_err(|_| SecurityError::HandshakeFailed)?;
        write_frame(conn.as_mut(), &buf[..len]).await?;

        let transport = handshake.into_transport_mode().map_err(|_| SecurityError::HandshakeFailed)?;
        Ok(Self { conn, transport, remote_peer })
    }

    pub async fn upgrade_inbound(
        mut conn: Box<dyn RawConn>,
        keypair: &Keypair,
    ) -> Result<Self, SecurityError> {
        let static_keys = new_builder().generate_keypair().map_err(|_| SecurityError::HandshakeFailed)?;
        let mut handshake = new_builder()
            .local_private_key(&static_keys.private)
            .build_responder()
            .map_err(|_| SecurityError::HandshakeFailed)?;

        // <- e
        let msg1 = read_frame(conn.as_mut()).await?;
        let mut discard = vec![0u8; msg1.len()];
        handshake.read_message(&msg1, &mut discard).map_err(|_| SecurityError::HandshakeFailed)?;

        // -> e, ee, s, es (carries our identity payload)
        let payload = local_payload(keypair, &static_keys.public)?;
        let mut buf = vec![0u8; payload.len() + 256];
        let len = handshake
            .write_message(&payload, &mut buf)
            .map_err(|_| SecurityError::HandshakeFailed)?;
        write_frame(conn.as_mut(), &buf[..len]).await?;

        // <- s, se (carries the initiator's identity payload)
        let msg3 = read_frame(conn.as_mut()).await?;
        let mut payload_buf = vec![0u8; msg3.len()];
        let payload_len = handshake
            .read_message(&msg3, &mut payload_buf)
            .map_err(|_| SecurityError::HandshakeFailed)?;
        let remote_static = handshake
            .get_remote_static()
            .ok_or(SecurityError::HandshakeFailed)?
            .to_vec();
        let remote_peer = verify_remote_payload(&payload_buf[..payload_len], &remote_static)?;

        let transport = handshake.into_transport_mode().map_err(|_| SecurityError::HandshakeFailed)?;
        Ok(Self { conn, transport, remote_peer })
    }
}

#[async_trait]
impl SecuredConn for NoiseSecuredConn {
    async fn read(&mut self) -> Result<Vec<u8>, SecurityError> {
        let ciphertext = read_frame(self.conn.as_mut()).await?;
        let mut plaintext = vec![0u8; ciphertext.len()];
        let len = self
            .transport
            .read_message(&ciphertext, &mut plaintext)
            .map_err(|_| SecurityError::HandshakeFailed)?;
        plaintext.truncate(len);
        Ok(plaintext)
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), SecurityError> {
        if payload.len() > MAX_TRANSPORT_PAYLOAD {
            return Err(SecurityError::HandshakeFailed);
        }
        let mut buf = vec![0u8; payload.len() + 16];
        let len = self
            .transport
            .write_message(payload, &mut buf)
            .map_err(|_| SecurityError::HandshakeFailed)?;
        write_frame(self.conn.as_mut(), &buf[..len]).await?;
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
    async fn handshake_authenticates_and_encrypts() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(9201);
        let mut listener = transport.listen(&addr).await.unwrap();

        let server_keypair = Keypair::generate_ed25519().unwrap();
        let server_peer = server_keypair.derive_peer_id();
        let server_task = tokio::spawn(async move {
            let conn = listener.accept().await.unwrap();
            NoiseSecuredConn::upgrade_inbound(conn, &server_keypair).await
        });

        let client_keypair = Keypair::generate_ed25519().unwrap();
        let client_peer = client_keypair.derive_peer_id();
        let client_conn = transport.dial(&addr).await.unwrap();
        let mut client_secured = NoiseSecuredConn::upgrade_outbound(client_conn, &client_keypair)
            .await
            .unwrap();

        let mut server_secured = server_task.await.unwrap().unwrap();
        assert_eq!(client_secured.remote_peer_id(), server_peer);
        assert_eq!(server_secured.remote_peer_id(), client_peer);

        client_secured.write(b"secret").await.unwrap();
        let got = server_secured.read().await.unwrap();
        assert_eq!(got, b"secret");
    }
}
