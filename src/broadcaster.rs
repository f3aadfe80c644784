// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! A generic multi-consumer fan-out used by the mDNS observation source
//! and the DCUtR state machine to publish events to however many
//! listeners currently care.

use std::sync::Mutex;

use tokio::sync::broadcast;

/// Multi-consumer fan-out over values of type `T`. `subscribe` hands back
/// an independent receiver that only sees values emitted after it was
/// created; `emit` delivers to every receiver still alive.
pub struct Broadcaster<T> {
    tx: Mutex<Option<broadcast::Sender<T>>>,
    capacity: usize,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    /// Build a broadcaster. `capacity` bounds how far a slow subscriber
    /// may lag before it starts missing values (see
    /// [`broadcast::error::RecvError::Lagged`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx: Mutex::new(Some(tx)), capacity }
    }

    /// Subscribe for future emissions. Returns `None` once the
    /// broadcaster has been shut down.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<T>> {
        self.tx.lock().unwrap().as_ref().map(|tx| tx.subscribe())
    }

    /// Deliver `value` to every subscriber currently alive. A no-op
    /// after shutdown, or if there are no subscribers.
    pub fn emit(&self, value: T) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(value);
        }
    }

    /// How many subscribers are currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.tx.lock().unwrap().as_ref().map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    /// Close every outstanding subscription. Receivers that have not yet
    /// drained already-emitted values still observe them before seeing
    /// the channel close.
    pub fn shutdown(&self) {
        self.tx.lock().unwrap().take();
    }
}

impl<T: Clone + Send + 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

const DEFAULT_CAPACITY: usize = 128;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_only_sees_values_emitted_after_it_joined() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(DEFAULT_CAPACITY);
        broadcaster.emit(1);

        let mut rx = broadcaster.subscribe().unwrap();
        broadcaster.emit(2);
        broadcaster.emit(3);

        assert_eq!(rx.recv().await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn every_live_subscriber_gets_every_emission() {
        let broadcaster: Broadcaster<&'static str> = Broadcaster::new(DEFAULT_CAPACITY);
        let mut a = broadcaster.subscribe().unwrap();
        let mut b = broadcaster.subscribe().unwrap();

        broadcaster.emit("hello");

        assert_eq!(a.recv().await.unwrap(), "hello");
        assert_eq!(b.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn dropping_a_subscriber_lowers_the_count() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(DEFAULT_CAPACITY);
        let rx = broadcaster.subscribe().unwrap();
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(rx);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_outstanding_subscriptions_and_future_subscribes() {
        let broadcaster: Broadcaster<u32> = Broadcaster::new(DEFAULT_CAPACITY);
        let mut rx = broadcaster.subscribe().unwrap();

        broadcaster.shutdown();

        assert!(broadcaster.subscribe().is_none());
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
