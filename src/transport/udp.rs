// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! A thin UDP adapter shared by the self-secured transports (QUIC,
//! WebRTC-Direct): a single bound socket with a demultiplexing table
//! keyed by the remote `(ip, port)` tuple, so one socket can back many
//! logical connections.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};

const DEMUX_CHANNEL_CAPACITY: usize = 64;
const MAX_DATAGRAM_SIZE: usize = 65535;

/// A UDP socket shared across many logical connections, demultiplexing
/// inbound datagrams by sender address.
pub struct UdpAdapter {
    socket: Arc<UdpSocket>,
    routes: Arc<Mutex<HashMap<SocketAddr, mpsc::Sender<Vec<u8>>>>>,
}

impl UdpAdapter {
    /// Bind a new adapter. Port 0 yields an ephemeral port, matching the
    /// dialer convention; listeners pass their configured port.
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let adapter = Self {
            socket,
            routes: Arc::new(Mutex::new(HashMap::new())),
        };
        adapter.spawn_demux_loop();
        Ok(adapter)
    }

    /// The bound local address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn spawn_demux_loop(&self) {
        let socket = self.socket.clone();
        let routes = self.routes.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                let (n, from) = match socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                let routes = routes.lock().await;
                if let Some(tx) = routes.get(&from) {
                    let _ = tx.try_send(buf[..n].to_vec());
                }
                // Datagrams from unknown senders are dropped; a listener
                // accept loop registers a route before traffic can arrive
                // for a fresh remote.
            }
        });
    }

    /// Register interest in datagrams from `remote`, returning a receiver
    /// fed by the demux loop. Overwrites any previous registration for
    /// the same remote.
    pub async fn register(&self, remote: SocketAddr) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(DEMUX_CHANNEL_CAPACITY);
        self.routes.lock().await.insert(remote, tx);
        rx
    }

    /// Stop routing datagrams from `remote` to any receiver.
    pub async fn unregister(&self, remote: &SocketAddr) {
        self.routes.lock().await.remove(remote);
    }

    /// Send one datagram to `remote`.
    pub async fn send_to(&self, buf: &[u8], remote: SocketAddr) -> std::io::Result<usize> {
        self.socket.send_to(buf, remote).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_remote_receives_demuxed_datagrams() {
        let a = UdpAdapter::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpAdapter::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();

        let mut rx = a.register(b_addr).await;
        b.send_to(b"hello", a_addr).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn unregistered_remote_is_dropped_silently() {
        let a = UdpAdapter::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpAdapter::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let a_addr = a.local_addr().unwrap();

        b.send_to(b"nobody-home", a_addr).await.unwrap();
        // No registration exists; nothing to assert beyond "doesn't panic".
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}
