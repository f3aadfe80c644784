// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! QUIC self-secured transport: TLS 1.3 via `quinn`/`rustls`, mutually
//! authenticated by the libp2p identity certificate of [`super::cert`]
//! instead of a certificate-authority chain. QUIC's own stream support
//! stands in for C10's muxer entirely.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use quinn::{ClientConfig, Endpoint, RecvStream, SendStream, ServerConfig};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};

use super::cert::{build_self_signed_cert, verify_peer_certificate};
use super::{SecuredTransportError, HANDSHAKE_TIMEOUT};
use crate::keypair::Keypair;
use crate::multiaddr::Multiaddr;
use crate::muxed::{MuxedConn, MuxedConnError, MuxedStreamLike};
use crate::peer_id::PeerId;

/// Accepts any certificate chain of length one whose libp2p identity
/// extension verifies; there is no certificate authority in this model,
/// authentication rests entirely on the extension's embedded signature.
#[derive(Debug)]
struct LibP2pCertVerifier;

impl ServerCertVerifier for LibP2pCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        verify_peer_certificate(end_entity.as_ref())
            .map(|_| ServerCertVerified::assertion())
            .map_err(|_| rustls::Error::General("libp2p certificate verification failed".into()))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

impl ClientCertVerifier for LibP2pCertVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        verify_peer_certificate(end_entity.as_ref())
            .map(|_| ClientCertVerified::assertion())
            .map_err(|_| rustls::Error::General("libp2p certificate verification failed".into()))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

fn socket_addr_of(addr: &Multiaddr) -> Result<SocketAddr, SecuredTransportError> {
    let ip: std::net::IpAddr = addr
        .ip_address()
        .and_then(|s| s.parse().ok())
        .ok_or(SecuredTransportError::UnsupportedAddress)?;
    let port = addr.udp_port().ok_or(SecuredTransportError::UnsupportedAddress)?;
    Ok(SocketAddr::new(ip, port))
}

fn build_rustls_configs(
    identity: &Keypair,
) -> Result<(rustls::ServerConfig, rustls::ClientConfig), SecuredTransportError> {
    let signed = build_self_signed_cert(identity)?;
    let cert_der = rustls::pki_types::CertificateDer::from(signed.cert_der);
    let key_der = rustls::pki_types::PrivateKeyDer::try_from(signed.key_pair.serialize_der())
        .map_err(|_| SecuredTransportError::Certificate)?;

    let mut server_config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(Arc::new(LibP2pCertVerifier))
        .with_single_cert(vec![cert_der.clone()], key_der.clone_key())
        .map_err(|_| SecuredTransportError::Certificate)?;
    server_config.alpn_protocols = vec![b"libp2p".to_vec()];

    let mut client_config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(LibP2pCertVerifier))
        .with_client_auth_cert(vec![cert_der], key_der)
        .map_err(|_| SecuredTransportError::Certificate)?;
    client_config.alpn_protocols = vec![b"libp2p".to_vec()];

    Ok((server_config, client_config))
}

/// QUIC transport: `can_dial`/`dial_secured` for outbound, `listen_secured`
/// for inbound, both bypassing C9/C10 entirely.
pub struct QuicTransport {
    identity: Arc<Keypair>,
}

impl QuicTransport {
    pub fn new(identity: Arc<Keypair>) -> Self {
        Self { identity }
    }

    pub fn can_dial(&self, addr: &Multiaddr) -> bool {
        addr.is_quic() && socket_addr_of(addr).is_ok()
    }

    /// Dial `addr`, authenticate the remote, and optionally check it
    /// against `expected_peer` (the address's own `p2p` component).
    pub async fn dial_secured(
        &self,
        addr: &Multiaddr,
        expected_peer: Option<&PeerId>,
    ) -> Result<Arc<QuicMuxedConnection>, MuxedConnError> {
        let socket_addr = socket_addr_of(addr).map_err(|_| MuxedConnError::NoTransportForAddress)?;
        let (_server_config, client_config) = build_rustls_configs(&self.identity)
            .map_err(|_| MuxedConnError::NoTransportForAddress)?;
        let quic_client_config = quinn::crypto::rustls::QuicClientConfig::try_from(client_config)
            .map_err(|_| MuxedConnError::NoTransportForAddress)?;

        let mut endpoint =
            Endpoint::client("0.0.0.0:0".parse().unwrap()).map_err(SecuredTransportError::Io)?;
        endpoint.set_default_client_config(ClientConfig::new(Arc::new(quic_client_config)));

        let connecting = endpoint
            .connect(socket_addr, "libp2p")
            .map_err(|_| MuxedConnError::NoTransportForAddress)?;
        let connection = tokio::time::timeout(HANDSHAKE_TIMEOUT, connecting)
            .await
            .map_err(|_| MuxedConnError::HandshakeTimeout)?
            .map_err(|_| MuxedConnError::HandshakeTimeout)?;

        let remote_cert = remote_certificate(&connection)?;
        let (remote_peer, _certhash) = verify_peer_certificate(&remote_cert)
            .map_err(|_| MuxedConnError::PeerIdMismatch)?;
        if let Some(expected) = expected_peer {
            if &remote_peer != expected {
                return Err(MuxedConnError::PeerIdMismatch);
            }
        }

        Ok(Arc::new(QuicMuxedConnection { connection, remote_peer, _endpoint: endpoint }))
    }

    /// Bind a listening endpoint at `addr`.
    pub async fn listen_secured(&self, addr: &Multiaddr) -> Result<QuicListener, SecuredTransportError> {
        let socket_addr = socket_addr_of(addr)?;
        let (server_config, _client_config) = build_rustls_configs(&self.identity)?;
        let quic_server_config = quinn::crypto::rustls::QuicServerConfig::try_from(server_config)
            .map_err(|_| SecuredTransportError::Certificate)?;
        let endpoint = Endpoint::server(ServerConfig::with_crypto(Arc::new(quic_server_config)), socket_addr)?;
        Ok(QuicListener { endpoint })
    }
}

fn remote_certificate(connection: &quinn::Connection) -> Result<Vec<u8>, MuxedConnError> {
    let identity = connection
        .peer_identity()
        .ok_or(MuxedConnError::PeerIdMismatch)?;
    let certs = identity
        .downcast::<Vec<rustls::pki_types::CertificateDer<'static>>>()
        .map_err(|_| MuxedConnError::PeerIdMismatch)?;
    certs.first().map(|c| c.as_ref().to_vec()).ok_or(MuxedConnError::PeerIdMismatch)
}

pub struct QuicListener {
    endpoint: Endpoint,
}

impl QuicListener {
    pub async fn accept(&mut self) -> Result<Arc<QuicMuxedConnection>, MuxedConnError> {
        let incoming = self.endpoint.accept().await.ok_or(MuxedConnError::NoTransportForAddress)?;
        let connecting = incoming.accept().map_err(|_| MuxedConnError::HandshakeTimeout)?;
        let connection = tokio::time::timeout(HANDSHAKE_TIMEOUT, connecting)
            .await
            .map_err(|_| MuxedConnError::HandshakeTimeout)?
            .map_err(|_| MuxedConnError::HandshakeTimeout)?;
        let remote_cert = remote_certificate(&connection)?;
        let (remote_peer, _certhash) =
            verify_peer_certificate(&remote_cert).map_err(|_| MuxedConnError::PeerIdMismatch)?;
        Ok(Arc::new(QuicMuxedConnection {
            connection,
            remote_peer,
            _endpoint: self.endpoint.clone(),
        }))
    }
}

/// A QUIC connection, its own multiplexing standing in for C10's muxer.
pub struct QuicMuxedConnection {
    connection: quinn::Connection,
    remote_peer: PeerId,
    _endpoint: Endpoint,
}

#[async_trait]
impl MuxedConn for QuicMuxedConnection {
    async fn open_stream(&self) -> Result<Box<dyn MuxedStreamLike>, MuxedConnError> {
        let (send, recv) = self
            .connection
            .open_bi()
            .await
            .map_err(|_| MuxedConnError::NoTransportForAddress)?;
        Ok(Box::new(QuicMuxedStream { send, recv }))
    }

    async fn accept_stream(&self) -> Result<Box<dyn MuxedStreamLike>, MuxedConnError> {
        let (send, recv) = self
            .connection
            .accept_bi()
            .await
            .map_err(|_| MuxedConnError::NoTransportForAddress)?;
        Ok(Box::new(QuicMuxedStream { send, recv }))
    }

    async fn close(&self) -> Result<(), MuxedConnError> {
        self.connection.close(0u32.into(), b"closed");
        Ok(())
    }

    fn remote_peer_id(&self) -> PeerId {
        self.remote_peer.clone()
    }
}

/// A single QUIC bidirectional stream.
pub struct QuicMuxedStream {
    send: SendStream,
    recv: RecvStream,
}

const READ_CHUNK: usize = 64 * 1024;

#[async_trait]
impl MuxedStreamLike for QuicMuxedStream {
    async fn read(&mut self) -> Result<Vec<u8>, MuxedConnError> {
        let mut buf = vec![0u8; READ_CHUNK];
        match self.recv.read(&mut buf).await {
            Ok(Some(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Ok(None) => Ok(Vec::new()),
            Err(_) => Err(MuxedConnError::NoTransportForAddress),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), MuxedConnError> {
        self.send.write_all(data).await.map_err(|_| MuxedConnError::NoTransportForAddress)
    }

    async fn close_write(&mut self) -> Result<(), MuxedConnError> {
        self.send.finish().map_err(|_| MuxedConnError::NoTransportForAddress)
    }

    async fn close(&mut self) -> Result<(), MuxedConnError> {
        let _ = self.send.finish();
        self.recv.stop(0u32.into()).ok();
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), MuxedConnError> {
        self.send.reset(0u32.into()).ok();
        self.recv.stop(0u32.into()).ok();
        Ok(())
    }
}
