// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Resource-tracked stream wrapper: decorates a muxed stream so that the
//! first of `close`, `reset`, or drop releases its resource-manager
//! reservation exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::muxed::{MuxedConnError, MuxedStreamLike};
use crate::peer_id::PeerId;
use crate::resource::{Direction, ResourceManager};

/// A muxed stream whose `reserve_stream`/`release_stream` accounting on
/// [`ResourceManager`] is guaranteed single-shot regardless of how the
/// stream is torn down.
pub struct TrackedStream {
    inner: Box<dyn MuxedStreamLike>,
    manager: Arc<ResourceManager>,
    peer: PeerId,
    direction: Direction,
    released: AtomicBool,
}

impl TrackedStream {
    /// Wrap `inner`, assuming the caller has already successfully called
    /// `reserve_stream(peer, direction)` on `manager`.
    pub fn new(
        inner: Box<dyn MuxedStreamLike>,
        manager: Arc<ResourceManager>,
        peer: PeerId,
        direction: Direction,
    ) -> Self {
        Self { inner, manager, peer, direction, released: AtomicBool::new(false) }
    }

    fn release_once(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.manager.release_stream(&self.peer, self.direction);
        }
    }
}

#[async_trait]
impl MuxedStreamLike for TrackedStream {
    async fn read(&mut self) -> Result<Vec<u8>, MuxedConnError> {
        self.inner.read().await
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), MuxedConnError> {
        self.inner.write(data).await
    }

    async fn close_write(&mut self) -> Result<(), MuxedConnError> {
        self.inner.close_write().await
    }

    async fn close(&mut self) -> Result<(), MuxedConnError> {
        let result = self.inner.close().await;
        self.release_once();
        result
    }

    async fn reset(&mut self) -> Result<(), MuxedConnError> {
        let result = self.inner.reset().await;
        self.release_once();
        result
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.release_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::config::ResourceLimitsConfiguration;

    struct NullStream;

    #[async_trait]
    impl MuxedStreamLike for NullStream {
        async fn read(&mut self) -> Result<Vec<u8>, MuxedConnError> {
            Ok(Vec::new())
        }
        async fn write(&mut self, _data: &[u8]) -> Result<(), MuxedConnError> {
            Ok(())
        }
        async fn close_write(&mut self) -> Result<(), MuxedConnError> {
            Ok(())
        }
        async fn close(&mut self) -> Result<(), MuxedConnError> {
            Ok(())
        }
        async fn reset(&mut self) -> Result<(), MuxedConnError> {
            Ok(())
        }
    }

    fn manager() -> Arc<ResourceManager> {
        Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default()))
    }

    #[tokio::test]
    async fn close_releases_exactly_once_even_if_called_twice() {
        let manager = manager();
        let peer = crate::keypair::Keypair::generate_ed25519().unwrap().derive_peer_id();
        manager.reserve_stream(&peer, Direction::Inbound).unwrap();

        let mut tracked = TrackedStream::new(Box::new(NullStream), manager.clone(), peer.clone(), Direction::Inbound);
        tracked.close().await.unwrap();
        tracked.close().await.unwrap();

        let snapshot = manager.snapshot();
        assert!(snapshot.peers.get(&peer).map(|s| s.total_streams()).unwrap_or(0) == 0);
    }

    #[tokio::test]
    async fn drop_without_explicit_close_still_releases() {
        let manager = manager();
        let peer = crate::keypair::Keypair::generate_ed25519().unwrap().derive_peer_id();
        manager.reserve_stream(&peer, Direction::Outbound).unwrap();

        {
            let _tracked =
                TrackedStream::new(Box::new(NullStream), manager.clone(), peer.clone(), Direction::Outbound);
        }

        let snapshot = manager.snapshot();
        assert!(snapshot.peers.get(&peer).map(|s| s.total_streams()).unwrap_or(0) == 0);
    }
}
