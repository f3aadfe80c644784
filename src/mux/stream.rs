// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! A single multiplexed stream: flow-controlled writes chunked to a
//! bounded size so one busy stream cannot starve its siblings on the
//! same connection, and a channel-backed read side fed by the
//! connection's reader actor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};

use super::connection::{Command, ConnState};
use super::frame::{Frame, FLAG_FIN, FLAG_RST};
use super::MuxError;

/// The most this crate will put in a single `Data` frame's payload, so a
/// large write is chunked across several frames rather than monopolizing
/// the connection's single outbound queue.
const MAX_DATA_CHUNK: u32 = 16 * 1024;

/// A stream's remaining send budget, replenished by `WINDOW_UPDATE`
/// frames from the remote.
pub(super) struct SendWindow {
    remaining: AsyncMutex<u32>,
    notify: Notify,
}

impl SendWindow {
    pub(super) fn new(initial: u32) -> Self {
        Self { remaining: AsyncMutex::new(initial), notify: Notify::new() }
    }

    async fn acquire(&self, want: u32) -> u32 {
        loop {
            let notified = self.notify.notified();
            {
                let mut guard = self.remaining.lock().await;
                if *guard > 0 {
                    let grant = want.min(*guard).min(MAX_DATA_CHUNK);
                    *guard -= grant;
                    return grant;
                }
            }
            notified.await;
        }
    }

    pub(super) async fn add(&self, amount: u32) {
        let mut guard = self.remaining.lock().await;
        *guard = guard.saturating_add(amount);
        drop(guard);
        self.notify.notify_waiters();
    }
}

/// One end of a multiplexed stream, handed out by
/// [`super::MuxedConnection::open_stream`] or
/// [`super::MuxedConnection::accept_stream`].
pub struct MuxedStream {
    id: u32,
    inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound_tx: mpsc::UnboundedSender<Command>,
    send_window: Arc<SendWindow>,
    reset: Arc<AtomicBool>,
    conn_state: Arc<AsyncMutex<ConnState>>,
    fin_sent: bool,
}

impl MuxedStream {
    pub(super) fn new(
        id: u32,
        inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        outbound_tx: mpsc::UnboundedSender<Command>,
        send_window: Arc<SendWindow>,
        reset: Arc<AtomicBool>,
        conn_state: Arc<AsyncMutex<ConnState>>,
    ) -> Self {
        Self { id, inbound_rx, outbound_tx, send_window, reset, conn_state, fin_sent: false }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub(super) fn send_raw(&self, stream_id: u32, flags: u16, payload: Vec<u8>) -> Result<(), MuxError> {
        let frame = Frame::data(stream_id, flags, payload);
        self.outbound_tx.send(Command::Send(frame.encode())).map_err(|_| MuxError::ConnectionClosed)
    }

    /// Read the next chunk of application data, or an empty vector on a
    /// clean remote half-close (FIN, then no more data buffered).
    pub async fn read(&mut self) -> Result<Vec<u8>, MuxError> {
        match self.inbound_rx.recv().await {
            Some(chunk) => {
                if !chunk.is_empty() {
                    self.send_window_update(chunk.len() as u32)?;
                }
                Ok(chunk)
            }
            None => {
                if self.reset.load(Ordering::SeqCst) {
                    Err(MuxError::StreamReset)
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    fn send_window_update(&self, consumed: u32) -> Result<(), MuxError> {
        let frame = Frame::window_update(self.id, 0, consumed);
        self.outbound_tx.send(Command::Send(frame.encode())).map_err(|_| MuxError::ConnectionClosed)
    }

    /// Write `data`, chunked to respect the remote's advertised window.
    pub async fn write(&mut self, mut data: &[u8]) -> Result<(), MuxError> {
        if self.reset.load(Ordering::SeqCst) {
            return Err(MuxError::StreamReset);
        }
        while !data.is_empty() {
            let grant = self.send_window.acquire(data.len() as u32).await;
            let (chunk, rest) = data.split_at(grant as usize);
            self.send_raw(self.id, 0, chunk.to_vec())?;
            data = rest;
        }
        Ok(())
    }

    /// Half-close the write side: send `FIN`, no further writes allowed.
    pub async fn close_write(&mut self) -> Result<(), MuxError> {
        if self.fin_sent {
            return Ok(());
        }
        self.fin_sent = true;
        self.send_raw(self.id, FLAG_FIN, Vec::new())
    }

    /// Half-close the read side: stop delivering buffered inbound data.
    pub fn close_read(&mut self) {
        self.inbound_rx.close();
    }

    /// Close both halves and forget this stream's bookkeeping entry.
    pub async fn close(&mut self) -> Result<(), MuxError> {
        self.close_write().await?;
        self.close_read();
        self.conn_state.lock().await.streams.remove(&self.id);
        Ok(())
    }

    /// Abort the stream immediately: send `RST`, drop all buffered state.
    pub async fn reset(&mut self) -> Result<(), MuxError> {
        self.reset.store(true, Ordering::SeqCst);
        let result = self.send_raw(self.id, FLAG_RST, Vec::new());
        self.conn_state.lock().await.streams.remove(&self.id);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_window_grants_up_to_available_budget() {
        let window = Arc::new(SendWindow::new(10));
        let grant = window.acquire(100).await;
        assert_eq!(grant, 10);

        let waiter_window = window.clone();
        let waiter = tokio::spawn(async move { waiter_window.acquire(5).await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        window.add(5).await;
        let grant = waiter.await.unwrap();
        assert_eq!(grant, 5);
    }
}
