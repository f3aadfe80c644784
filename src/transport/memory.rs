// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! In-memory transport: a process-wide hub of listeners keyed by a
//! `/memory/<id>` address, useful for tests and for the plaintext
//! security upgrader's happy path.

use super::{Dialer, Listenable, Listener as ListenerTrait, RawConn, TransportError};
use crate::multiaddr::{Component, Multiaddr};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tokio::sync::mpsc;

fn memory_id(addr: &Multiaddr) -> Option<u64> {
    addr.components().iter().find_map(|c| match c {
        Component::Memory(id) => Some(*id),
        _ => None,
    })
}

struct Hub {
    listeners: Mutex<HashMap<u64, mpsc::Sender<PendingDial>>>,
}

fn hub() -> &'static Hub {
    static HUB: OnceLock<Hub> = OnceLock::new();
    HUB.get_or_init(|| Hub { listeners: Mutex::new(HashMap::new()) })
}

struct PendingDial {
    conn: MemoryConn,
}

const CHANNEL_CAPACITY: usize = 16;

/// One half of an in-memory duplex pipe.
pub struct MemoryConn {
    addr: Multiaddr,
    peer_addr: Multiaddr,
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
    read_buf: Vec<u8>,
    read_pending: bool,
}

#[async_trait]
impl RawConn for MemoryConn {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.read_pending {
            return Err(TransportError::ConcurrentRead);
        }
        self.read_pending = true;
        if self.read_buf.is_empty() {
            match self.rx.recv().await {
                Some(chunk) => self.read_buf = chunk,
                None => {
                    self.read_pending = false;
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.read_buf.len());
        buf[..n].copy_from_slice(&self.read_buf[..n]);
        self.read_buf.drain(..n);
        self.read_pending = false;
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(buf.to_vec())
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn remote_address(&self) -> Option<Multiaddr> {
        Some(self.peer_addr.clone())
    }

    fn local_address(&self) -> Option<Multiaddr> {
        Some(self.addr.clone())
    }
}

fn duplex_pair(dialer_addr: Multiaddr, listener_addr: Multiaddr) -> (MemoryConn, MemoryConn) {
    let (a_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (b_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let dial_side = MemoryConn {
        addr: dialer_addr.clone(),
        peer_addr: listener_addr.clone(),
        tx: a_tx,
        rx: a_rx,
        read_buf: Vec::new(),
        read_pending: false,
    };
    let listen_side = MemoryConn {
        addr: listener_addr,
        peer_addr: dialer_addr,
        tx: b_tx,
        rx: b_rx,
        read_buf: Vec::new(),
        read_pending: false,
    };
    (dial_side, listen_side)
}

/// The in-memory `Dialer`/`Listenable` implementation.
#[derive(Clone, Copy, Default)]
pub struct MemoryTransport;

impl MemoryTransport {
    /// Drop every registered listener from the process-wide hub. Intended
    /// for test teardown between cases that reuse the same memory ids.
    pub fn reset(&self) {
        hub().listeners.lock().unwrap().clear();
    }
}

#[async_trait]
impl Dialer for MemoryTransport {
    fn can_dial(&self, addr: &Multiaddr) -> bool {
        memory_id(addr).is_some()
    }

    async fn dial(&self, addr: &Multiaddr) -> Result<Box<dyn RawConn>, TransportError> {
        let id = memory_id(addr).ok_or_else(|| TransportError::UnsupportedAddress(addr.to_text()))?;
        let sender = hub()
            .listeners
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(TransportError::NoSuchListener)?;
        // Arbitrary dialer-side address; memory addresses carry no
        // identity of their own beyond the shared id.
        let dialer_addr = Multiaddr::memory(id);
        let (dial_side, listen_side) = duplex_pair(dialer_addr, addr.clone());
        sender
            .send(PendingDial { conn: listen_side })
            .await
            .map_err(|_| TransportError::NoSuchListener)?;
        Ok(Box::new(dial_side))
    }
}

/// A bound in-memory listener.
pub struct MemoryListenerHandle {
    id: u64,
    addr: Multiaddr,
    rx: mpsc::Receiver<PendingDial>,
}

#[async_trait]
impl ListenerTrait for MemoryListenerHandle {
    async fn accept(&mut self) -> Result<Box<dyn RawConn>, TransportError> {
        match self.rx.recv().await {
            Some(pending) => Ok(Box::new(pending.conn)),
            None => Err(TransportError::ListenerClosed),
        }
    }

    fn local_address(&self) -> Multiaddr {
        self.addr.clone()
    }

    async fn close(&mut self) {
        hub().listeners.lock().unwrap().remove(&self.id);
        self.rx.close();
    }
}

#[async_trait]
impl Listenable for MemoryTransport {
    fn can_listen(&self, addr: &Multiaddr) -> bool {
        memory_id(addr).is_some()
    }

    async fn listen(&self, addr: &Multiaddr) -> Result<Box<dyn ListenerTrait>, TransportError> {
        let id = memory_id(addr).ok_or_else(|| TransportError::UnsupportedAddress(addr.to_text()))?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut listeners = hub().listeners.lock().unwrap();
        if listeners.contains_key(&id) {
            return Err(TransportError::AddressInUse);
        }
        listeners.insert(id, tx);
        drop(listeners);
        Ok(Box::new(MemoryListenerHandle { id, addr: addr.clone(), rx }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dial_and_accept_round_trip() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(101);
        let mut listener = transport.listen(&addr).await.unwrap();

        let accept_task = tokio::spawn(async move { listener.accept().await });
        let mut client = transport.dial(&addr).await.unwrap();
        client.write(b"ping").await.unwrap();

        let mut server = accept_task.await.unwrap().unwrap();
        let mut buf = [0u8; 4];
        let mut read = 0;
        while read < 4 {
            read += server.read(&mut buf[read..]).await.unwrap();
        }
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn dial_without_listener_fails() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(202);
        let err = transport.dial(&addr).await.unwrap_err();
        assert!(matches!(err, TransportError::NoSuchListener));
    }

    #[tokio::test]
    async fn duplicate_listen_fails() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(303);
        let _listener = transport.listen(&addr).await.unwrap();
        let err = transport.listen(&addr).await.unwrap_err();
        assert!(matches!(err, TransportError::AddressInUse));
    }

    #[tokio::test]
    async fn closed_listener_wakes_waiter_with_listener_closed() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(404);
        let mut listener = transport.listen(&addr).await.unwrap();
        listener.close().await;
        let err = listener.accept().await.unwrap_err();
        assert!(matches!(err, TransportError::ListenerClosed));
    }

    #[tokio::test]
    async fn reset_frees_an_address_without_closing_the_listener_handle() {
        let transport = MemoryTransport;
        let addr = Multiaddr::memory(505);
        let _listener = transport.listen(&addr).await.unwrap();
        assert!(matches!(
            transport.listen(&addr).await.unwrap_err(),
            TransportError::AddressInUse
        ));

        transport.reset();

        // The id is free again; a fresh listen succeeds.
        let _listener = transport.listen(&addr).await.unwrap();
    }
}
