// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! multistream-select: a line-oriented protocol-id exchange over
//! whole frames, shared by the security upgrader (C9, over a raw byte
//! connection) and the muxer negotiation (C10, over an already-secured
//! connection).

use super::framed_io::{read_frame, write_frame};
use super::{SecuredConn, SecurityError};
use crate::transport::RawConn;
use async_trait::async_trait;

const MULTISTREAM_HEADER: &str = "/multistream/1.0.0\n";
const NOT_AVAILABLE: &str = "na\n";

fn protocol_line(id: &str) -> String {
    format!("{id}\n")
}

/// One whole multistream-select frame in or out. `RawConn` needs
/// length-prefix framing of its own (`framed_io`); `SecuredConn` already
/// hands back one decrypted application-data record per `read`/`write`.
#[async_trait]
trait FrameIo {
    async fn read_frame(&mut self) -> Result<Vec<u8>, SecurityError>;
    async fn write_frame(&mut self, payload: &[u8]) -> Result<(), SecurityError>;
}

struct RawConnFrames<'a>(&'a mut dyn RawConn);

#[async_trait]
impl<'a> FrameIo for RawConnFrames<'a> {
    async fn read_frame(&mut self) -> Result<Vec<u8>, SecurityError> {
        read_frame(self.0).await.map_err(|_| SecurityError::NegotiationFailed)
    }

    async fn write_frame(&mut self, payload: &[u8]) -> Result<(), SecurityError> {
        write_frame(self.0, payload).await.map_err(|_| SecurityError::NegotiationFailed)
    }
}

struct SecuredConnFrames<'a>(&'a mut dyn SecuredConn);

#[async_trait]
impl<'a> FrameIo for SecuredConnFrames<'a> {
    async fn read_frame(&mut self) -> Result<Vec<u8>, SecurityError> {
        self.0.read().await
    }

    async fn write_frame(&mut self, payload: &[u8]) -> Result<(), SecurityError> {
        self.0.write(payload).await
    }
}

async fn negotiate_outbound_io(io: &mut dyn FrameIo, proposals: &[&str]) -> Result<String, SecurityError> {
    io.write_frame(MULTISTREAM_HEADER.as_bytes()).await?;
    let echoed = io.read_frame().await?;
    if echoed != MULTISTREAM_HEADER.as_bytes() {
        return Err(SecurityError::NegotiationFailed);
    }

    for &id in proposals {
        io.write_frame(protocol_line(id).as_bytes()).await?;
        let response = io.read_frame().await?;
        if response == protocol_line(id).as_bytes() {
            return Ok(id.to_string());
        }
        if response != NOT_AVAILABLE.as_bytes() {
            return Err(SecurityError::NegotiationFailed);
        }
    }
    Err(SecurityError::NegotiationFailed)
}

async fn negotiate_inbound_io(io: &mut dyn FrameIo, supported: &[&str]) -> Result<String, SecurityError> {
    let header = io.read_frame().await?;
    if header != MULTISTREAM_HEADER.as_bytes() {
        return Err(SecurityError::NegotiationFailed);
    }
    io.write_frame(MULTISTREAM_HEADER.as_bytes()).await?;

    loop {
        let proposed = io.read_frame().await?;
        let proposed = String::from_utf8(proposed).map_err(|_| SecurityError::NegotiationFailed)?;
        let id = proposed.strip_suffix('\n').ok_or(SecurityError::NegotiationFailed)?;
        if supported.contains(&id) {
            io.write_frame(protocol_line(id).as_bytes()).await?;
            return Ok(id.to_string());
        }
        io.write_frame(NOT_AVAILABLE.as_bytes()).await?;
    }
}

/// Propose `proposals` in order over `conn`, returning the first one the
/// remote accepts.
pub async fn negotiate_outbound(
    conn: &mut dyn RawConn,
    proposals: &[&str],
) -> Result<String, SecurityError> {
    negotiate_outbound_io(&mut RawConnFrames(conn), proposals).await
}

/// Accept the first proposal the remote sends that is in `supported`.
pub async fn negotiate_inbound(
    conn: &mut dyn RawConn,
    supported: &[&str],
) -> Result<String, SecurityError> {
    negotiate_inbound_io(&mut RawConnFrames(conn), supported).await
}

/// Propose `proposals` in order over an already-secured connection (used
/// to agree a muxer id after the security handshake completes).
pub async fn negotiate_outbound_secured(
    conn: &mut dyn SecuredConn,
    proposals: &[&str],
) -> Result<String, SecurityError> {
    negotiate_outbound_io(&mut SecuredConnFrames(conn), proposals).await
}

/// Accept the first muxer id the remote proposes that is in `supported`,
/// over an already-secured connection.
pub async fn negotiate_inbound_secured(
    conn: &mut dyn SecuredConn,
    supported: &[&str],
) -> Result<String, SecurityError> {
    negotiate_inbound_io(&mut SecuredConnFrames(conn), supported).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryTransport;
    use crate::transport::{Dialer, Listenable};
    use crate::multiaddr::Multiaddr;

    #[tokio::test]
    async fn negotiates_first_mutually_supported_protocol() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(9001);
        let mut listener = transport.listen(&addr).await.unwrap();

        let server_task = tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            negotiate_inbound(conn.as_mut(), &["/noise", "/plaintext/2.0.0"]).await
        });
        let mut client = transport.dial(&addr).await.unwrap();
        let chosen = negotiate_outbound(client.as_mut(), &["/plaintext/2.0.0", "/noise"])
            .await
            .unwrap();

        let server_chosen = server_task.await.unwrap().unwrap();
        assert_eq!(chosen, "/plaintext/2.0.0");
        assert_eq!(server_chosen, "/plaintext/2.0.0");
    }

    #[tokio::test]
    async fn falls_through_to_second_proposal_when_first_unsupported() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(9002);
        let mut listener = transport.listen(&addr).await.unwrap();

        let server_task = tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            negotiate_inbound(conn.as_mut(), &["/noise"]).await
        });
        let mut client = transport.dial(&addr).await.unwrap();
        let chosen = negotiate_outbound(client.as_mut(), &["/plaintext/2.0.0", "/noise"])
            .await
            .unwrap();
        assert_eq!(chosen, "/noise");
        assert_eq!(server_task.await.unwrap().unwrap(), "/noise");
    }

    #[tokio::test]
    async fn negotiates_a_muxer_over_an_already_secured_connection() {
        use super::super::plaintext::PlaintextSecuredConn;
        use crate::keypair::Keypair;

        let transport = MemoryTransport;
        let addr = Multiaddr::memory(9003);
        let listener_keypair = Keypair::generate_ed25519().unwrap();
        let dialer_keypair = Keypair::generate_ed25519().unwrap();
        let mut listener = transport.listen(&addr).await.unwrap();

        let server_task = tokio::spawn(async move {
            let conn = listener.accept().await.unwrap();
            let mut secured = PlaintextSecuredConn::upgrade_inbound(conn, &listener_keypair).await.unwrap();
            let chosen = negotiate_inbound_secured(&mut secured, &["/yamux/1.0.0"]).await.unwrap();
            chosen
        });

        let client = transport.dial(&addr).await.unwrap();
        let mut secured = PlaintextSecuredConn::upgrade_outbound(client, &dialer_keypair).await.unwrap();
        let chosen = negotiate_outbound_secured(&mut secured, &["/yamux/1.0.0"]).await.unwrap();

        assert_eq!(chosen, "/yamux/1.0.0");
        assert_eq!(server_task.await.unwrap(), "/yamux/1.0.0");
    }
}
