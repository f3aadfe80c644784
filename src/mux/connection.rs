// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! The multiplexed connection: a single background task owns the
//! underlying [`SecuredConn`] and fans inbound frames out to per-stream
//! channels while serializing outbound frames from every open stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};

use super::frame::{Frame, FrameType, FLAG_FIN, FLAG_RST, FLAG_SYN};
use super::stream::{MuxedStream, SendWindow};
use super::{MuxError, DEFAULT_WINDOW};
use crate::peer_id::PeerId;
use crate::security::SecuredConn;

/// Which side of the multistream-select negotiation opened this
/// connection; determines stream-id parity, mirroring yamux's
/// odd-for-client / even-for-server convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

pub(super) struct StreamEntry {
    /// `None` once the remote has sent `FIN`: the write-side bookkeeping
    /// (`send_window`) stays in the map for local writes and incoming
    /// `WINDOW_UPDATE`s, but there is no inbound sender left to feed, so
    /// the reader's next `recv()` already returns `None` (EOF).
    pub inbound_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    pub send_window: Arc<SendWindow>,
    pub reset: Arc<AtomicBool>,
}

pub(super) struct ConnState {
    pub(super) streams: HashMap<u32, StreamEntry>,
}

pub(super) enum Command {
    Send(Vec<u8>),
    Shutdown,
}

/// A stream-multiplexed connection to a single remote peer.
pub struct MuxedConnection {
    local_peer: PeerId,
    remote_peer: PeerId,
    role: Role,
    next_id_offset: AtomicU32,
    outbound_tx: mpsc::UnboundedSender<Command>,
    state: Arc<AsyncMutex<ConnState>>,
    accept_rx: AsyncMutex<mpsc::Receiver<MuxedStream>>,
    closed: Arc<AtomicBool>,
    actor: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

const ACCEPT_QUEUE_CAPACITY: usize = 128;

impl MuxedConnection {
    /// Wrap a freshly security-upgraded connection and spawn its reader
    /// actor. `local_peer` is this node's own identity; the remote's is
    /// read off `secured` itself.
    pub fn new(secured: Box<dyn SecuredConn>, role: Role, local_peer: PeerId) -> Arc<Self> {
        let remote_peer = secured.remote_peer_id();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (accept_tx, accept_rx) = mpsc::channel(ACCEPT_QUEUE_CAPACITY);
        let state = Arc::new(AsyncMutex::new(ConnState { streams: HashMap::new() }));
        let closed = Arc::new(AtomicBool::new(false));

        let conn = Arc::new(Self {
            local_peer,
            remote_peer,
            role,
            next_id_offset: AtomicU32::new(0),
            outbound_tx,
            state: state.clone(),
            accept_rx: AsyncMutex::new(accept_rx),
            closed: closed.clone(),
            actor: AsyncMutex::new(None),
        });

        let actor_state = state;
        let actor_closed = closed;
        let handle = tokio::spawn(run_actor(secured, actor_state, actor_closed, accept_tx, outbound_rx, conn.outbound_tx.clone()));

        // Stash the handle; best-effort since we just constructed `conn`
        // and hold the only strong reference so far.
        if let Ok(mut guard) = conn.actor.try_lock() {
            *guard = Some(handle);
        }
        conn
    }

    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn remote_peer_id(&self) -> &PeerId {
        &self.remote_peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_stream_id(&self) -> u32 {
        let offset = self.next_id_offset.fetch_add(1, Ordering::SeqCst);
        let base = match self.role {
            Role::Client => 1,
            Role::Server => 2,
        };
        base + offset * 2
    }

    async fn register_stream(self: &Arc<Self>, id: u32) -> MuxedStream {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let send_window = Arc::new(SendWindow::new(DEFAULT_WINDOW));
        let reset = Arc::new(AtomicBool::new(false));
        self.state.lock().await.streams.insert(
            id,
            StreamEntry { inbound_tx: Some(inbound_tx), send_window: send_window.clone(), reset: reset.clone() },
        );
        MuxedStream::new(id, inbound_rx, self.outbound_tx.clone(), send_window, reset, self.state.clone())
    }

    /// Open a new outbound stream, announced to the remote with a `SYN`
    /// frame carrying no payload.
    pub async fn open_stream(self: &Arc<Self>) -> Result<MuxedStream, MuxError> {
        if self.is_closed() {
            return Err(MuxError::ConnectionClosed);
        }
        let id = self.next_stream_id();
        let mut stream = self.register_stream(id).await;
        stream.send_raw(id, FLAG_SYN, Vec::new())?;
        Ok(stream)
    }

    /// Wait for the next remotely-opened stream.
    pub async fn accept_stream(&self) -> Result<MuxedStream, MuxError> {
        self.accept_rx.lock().await.recv().await.ok_or(MuxError::ConnectionClosed)
    }

    /// Close the connection: stop the reader actor and close the
    /// underlying secured connection.
    pub async fn close(&self) -> Result<(), MuxError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.outbound_tx.send(Command::Shutdown);
        if let Some(handle) = self.actor.lock().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

async fn run_actor(
    mut secured: Box<dyn SecuredConn>,
    state: Arc<AsyncMutex<ConnState>>,
    closed: Arc<AtomicBool>,
    accept_tx: mpsc::Sender<MuxedStream>,
    mut outbound_rx: mpsc::UnboundedReceiver<Command>,
    outbound_tx_for_new_streams: mpsc::UnboundedSender<Command>,
) {
    loop {
        tokio::select! {
            incoming = secured.read() => {
                match incoming {
                    Ok(bytes) => {
                        if handle_inbound(&bytes, &state, &accept_tx, &outbound_tx_for_new_streams).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            cmd = outbound_rx.recv() => {
                match cmd {
                    Some(Command::Send(bytes)) => {
                        if secured.write(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                }
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    let _ = secured.close().await;
    let mut guard = state.lock().await;
    for (_, entry) in guard.streams.drain() {
        entry.reset.store(true, Ordering::SeqCst);
        // Dropping the sender wakes any pending `recv()` with `None`.
        drop(entry.inbound_tx);
    }
}

async fn handle_inbound(
    bytes: &[u8],
    state: &Arc<AsyncMutex<ConnState>>,
    accept_tx: &mpsc::Sender<MuxedStream>,
    outbound_tx_for_new_streams: &mpsc::UnboundedSender<Command>,
) -> Result<(), MuxError> {
    let (stream_id, flags, frame_type, length) = Frame::decode_header(bytes)?;
    match frame_type {
        FrameType::WindowUpdate => {
            let guard = state.lock().await;
            if let Some(entry) = guard.streams.get(&stream_id) {
                entry.send_window.add(length).await;
            }
            Ok(())
        }
        FrameType::Data => {
            if flags & FLAG_RST != 0 {
                let mut guard = state.lock().await;
                if let Some(entry) = guard.streams.remove(&stream_id) {
                    entry.reset.store(true, Ordering::SeqCst);
                    drop(entry.inbound_tx);
                }
                return Ok(());
            }

            let payload_start = super::frame::HEADER_LEN;
            let payload_end = payload_start
                .checked_add(length as usize)
                .filter(|&end| end <= bytes.len())
                .ok_or(MuxError::Frame(super::frame::FrameError::TruncatedHeader))?;
            let payload = bytes[payload_start..payload_end].to_vec();
            let mut guard = state.lock().await;
            if !guard.streams.contains_key(&stream_id) {
                drop(guard);
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let send_window = Arc::new(SendWindow::new(DEFAULT_WINDOW));
                let reset = Arc::new(AtomicBool::new(false));
                {
                    let mut guard = state.lock().await;
                    guard.streams.insert(
                        stream_id,
                        StreamEntry {
                            inbound_tx: Some(inbound_tx.clone()),
                            send_window: send_window.clone(),
                            reset: reset.clone(),
                        },
                    );
                }
                let new_stream = MuxedStream::new(
                    stream_id,
                    inbound_rx,
                    outbound_tx_for_new_streams.clone(),
                    send_window,
                    reset,
                    state.clone(),
                );
                if !payload.is_empty() {
                    let _ = inbound_tx.send(payload);
                }
                if flags & FLAG_FIN != 0 {
                    let mut guard = state.lock().await;
                    if let Some(entry) = guard.streams.get_mut(&stream_id) {
                        entry.inbound_tx = None;
                    }
                }
                let _ = accept_tx.send(new_stream).await;
            } else {
                let entry = guard.streams.get(&stream_id).expect("checked above");
                if !payload.is_empty() {
                    if let Some(tx) = &entry.inbound_tx {
                        let _ = tx.send(payload);
                    }
                }
                if flags & FLAG_FIN != 0 {
                    // Peer is done writing; drop the inbound sender so the
                    // stream's next `recv()` sees `None` (EOF) instead of
                    // blocking. `send_window` stays in the map for local
                    // writes and incoming `WINDOW_UPDATE`s.
                    if let Some(entry) = guard.streams.get_mut(&stream_id) {
                        entry.inbound_tx = None;
                    }
                }
            }
            Ok(())
        }
    }
}
