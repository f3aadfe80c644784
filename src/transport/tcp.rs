// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! TCP raw transport.

use super::{Dialer, Listenable, Listener as ListenerTrait, RawConn, TransportError};
use crate::multiaddr::{Component, Multiaddr};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn socket_addr_of(addr: &Multiaddr) -> Option<std::net::SocketAddr> {
    let ip: std::net::IpAddr = addr.ip_address()?.parse().ok()?;
    let port = addr.tcp_port()?;
    Some(std::net::SocketAddr::new(ip, port))
}

/// A TCP connection wrapping a `tokio::net::TcpStream`.
pub struct TcpConn {
    stream: TcpStream,
    remote: Multiaddr,
    local: Multiaddr,
    read_pending: bool,
}

impl TcpConn {
    fn new(stream: TcpStream) -> Self {
        let remote = stream
            .peer_addr()
            .ok()
            .map(socket_addr_to_multiaddr)
            .unwrap_or_else(Multiaddr::empty);
        let local = stream
            .local_addr()
            .ok()
            .map(socket_addr_to_multiaddr)
            .unwrap_or_else(Multiaddr::empty);
        Self { stream, remote, local, read_pending: false }
    }
}

fn socket_addr_to_multiaddr(sa: std::net::SocketAddr) -> Multiaddr {
    let ip_component = match sa.ip() {
        std::net::IpAddr::V4(v4) => Component::Ip4(v4),
        std::net::IpAddr::V6(v6) => Component::Ip6(v6),
    };
    Multiaddr::from_components(vec![ip_component, Component::Tcp(sa.port())])
        .expect("two components is always within bounds")
}

#[async_trait]
impl RawConn for TcpConn {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.read_pending {
            return Err(TransportError::ConcurrentRead);
        }
        self.read_pending = true;
        let result = self.stream.read(buf).await.map_err(TransportError::from);
        self.read_pending = false;
        result
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(buf).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn remote_address(&self) -> Option<Multiaddr> {
        Some(self.remote.clone())
    }

    fn local_address(&self) -> Option<Multiaddr> {
        Some(self.local.clone())
    }
}

/// The TCP `Dialer`/`Listenable` implementation.
#[derive(Clone, Copy, Default)]
pub struct TcpTransport;

#[async_trait]
impl Dialer for TcpTransport {
    fn can_dial(&self, addr: &Multiaddr) -> bool {
        socket_addr_of(addr).is_some()
    }

    async fn dial(&self, addr: &Multiaddr) -> Result<Box<dyn RawConn>, TransportError> {
        let sa = socket_addr_of(addr)
            .ok_or_else(|| TransportError::UnsupportedAddress(addr.to_text()))?;
        let stream = TcpStream::connect(sa).await?;
        stream.set_nodelay(true).ok();
        Ok(Box::new(TcpConn::new(stream)))
    }
}

/// A bound TCP listener.
pub struct TcpListenerHandle {
    listener: TcpListener,
    local: Multiaddr,
}

#[async_trait]
impl ListenerTrait for TcpListenerHandle {
    async fn accept(&mut self) -> Result<Box<dyn RawConn>, TransportError> {
        let (stream, _) = self.listener.accept().await?;
        stream.set_nodelay(true).ok();
        Ok(Box::new(TcpConn::new(stream)))
    }

    fn local_address(&self) -> Multiaddr {
        self.local.clone()
    }

    async fn close(&mut self) {
        // tokio::net::TcpListener has no explicit close; dropping it frees
        // the socket. Callers stop polling `accept` after this returns.
    }
}

#[async_trait]
impl Listenable for TcpTransport {
    fn can_listen(&self, addr: &Multiaddr) -> bool {
        socket_addr_of(addr).is_some()
    }

    async fn listen(&self, addr: &Multiaddr) -> Result<Box<dyn ListenerTrait>, TransportError> {
        let sa = socket_addr_of(addr)
            .ok_or_else(|| TransportError::UnsupportedAddress(addr.to_text()))?;
        let listener = TcpListener::bind(sa).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                TransportError::AddressInUse
            } else {
                TransportError::from(e)
            }
        })?;
        let bound = listener.local_addr()?;
        Ok(Box::new(TcpListenerHandle {
            listener,
            local: socket_addr_to_multiaddr(bound),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dial_and_accept_round_trip() {
        let transport = TcpTransport;
        let listen_addr = Multiaddr::tcp(std::net::Ipv4Addr::LOCALHOST, 0);
        let mut listener = transport.listen(&listen_addr).await.unwrap();
        let bound = listener.local_address();

        let accept_task = tokio::spawn(async move { listener.accept().await });
        let mut client = transport.dial(&bound).await.unwrap();
        client.write(b"hello").await.unwrap();

        let mut server = accept_task.await.unwrap().unwrap();
        let mut buf = [0u8; 5];
        let mut read = 0;
        while read < 5 {
            read += server.read(&mut buf[read..]).await.unwrap();
        }
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn duplicate_listen_on_same_port_fails() {
        let transport = TcpTransport;
        let listen_addr = Multiaddr::tcp(std::net::Ipv4Addr::LOCALHOST, 0);
        let listener = transport.listen(&listen_addr).await.unwrap();
        let bound = listener.local_address();
        let err = transport.listen(&bound).await.unwrap_err();
        assert!(matches!(err, TransportError::AddressInUse));
    }
}
