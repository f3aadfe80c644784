// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Upgrade orchestrator: picks a transport for an address, runs whatever
//! security/multiplexing negotiation that transport requires, and
//! reserves the connection against the resource manager around the
//! whole attempt.

use std::sync::Arc;

use thiserror::Error;

#[cfg(feature = "quic")]
use crate::secured::quic::{QuicListener, QuicMuxedConnection, QuicTransport};
#[cfg(feature = "webrtc")]
use crate::secured::webrtc::WebRtcDirectTransport;
use crate::secured::SecuredTransportError;

use crate::keypair::Keypair;
use crate::multiaddr::Multiaddr;
use crate::mux::{MuxError, MuxedConnection, Role, SUPPORTED_MUXER_PROTOCOLS};
use crate::muxed::{MuxedConn, MuxedConnError};
use crate::peer_id::PeerId;
use crate::resource::{Direction, ResourceError, ResourceManager};
use crate::security::multistream::{negotiate_inbound_secured, negotiate_outbound_secured};
use crate::security::{upgrade_inbound, upgrade_outbound, SecurityError};
use crate::tracked_stream::TrackedStream;
use crate::transport::memory::MemoryTransport;
use crate::transport::tcp::TcpTransport;
use crate::transport::{Dialer, Listenable, Listener, RawConn, TransportError};

/// Errors from dialing, listening, or accepting through the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No configured transport could dial or listen on the address.
    #[error("no transport can dial or listen on this address")]
    NoTransportForAddress,
    /// A dial address must carry a `/p2p/<peer>` component; without one
    /// there is no peer id to reserve resources against or authenticate.
    #[error("dial address is missing a p2p component naming the expected peer")]
    MissingPeerId,
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error(transparent)]
    MuxedConn(#[from] MuxedConnError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    SelfSecured(#[from] SecuredTransportError),
}

enum ConnectionInner {
    Muxed(Arc<MuxedConnection>),
    #[cfg(feature = "quic")]
    Quic(Arc<QuicMuxedConnection>),
}

/// A connection that has completed whichever upgrade path its transport
/// required (raw + security + muxer, or a self-secured handshake).
/// Streams opened or accepted through it are resource-tracked (C15).
pub struct UpgradedConnection {
    inner: ConnectionInner,
    resources: Arc<ResourceManager>,
    peer: PeerId,
    direction: Direction,
}

impl UpgradedConnection {
    /// The authenticated remote peer id.
    pub fn remote_peer_id(&self) -> PeerId {
        self.peer.clone()
    }

    /// Open an outbound stream, reserving it against the resource
    /// manager and wrapping it for single-shot release.
    pub async fn open_stream(&self) -> Result<TrackedStream, OrchestratorError> {
        self.resources.reserve_stream(&self.peer, Direction::Outbound)?;
        let stream = match &self.inner {
            ConnectionInner::Muxed(c) => <Arc<MuxedConnection> as MuxedConn>::open_stream(c).await,
            #[cfg(feature = "quic")]
            ConnectionInner::Quic(c) => MuxedConn::open_stream(c.as_ref()).await,
        };
        match stream {
            Ok(s) => Ok(TrackedStream::new(s, self.resources.clone(), self.peer.clone(), Direction::Outbound)),
            Err(e) => {
                self.resources.release_stream(&self.peer, Direction::Outbound);
                Err(e.into())
            }
        }
    }

    /// Accept the next inbound stream on this connection, likewise
    /// resource-tracked.
    pub async fn accept_stream(&self) -> Result<TrackedStream, OrchestratorError> {
        self.resources.reserve_stream(&self.peer, Direction::Inbound)?;
        let stream = match &self.inner {
            ConnectionInner::Muxed(c) => <Arc<MuxedConnection> as MuxedConn>::accept_stream(c).await,
            #[cfg(feature = "quic")]
            ConnectionInner::Quic(c) => MuxedConn::accept_stream(c.as_ref()).await,
        };
        match stream {
            Ok(s) => Ok(TrackedStream::new(s, self.resources.clone(), self.peer.clone(), Direction::Inbound)),
            Err(e) => {
                self.resources.release_stream(&self.peer, Direction::Inbound);
                Err(e.into())
            }
        }
    }

    /// Close the connection and release its connection-scope reservation.
    pub async fn close(&self) -> Result<(), OrchestratorError> {
        let result = match &self.inner {
            ConnectionInner::Muxed(c) => <Arc<MuxedConnection> as MuxedConn>::close(c).await,
            #[cfg(feature = "quic")]
            ConnectionInner::Quic(c) => MuxedConn::close(c.as_ref()).await,
        };
        self.resources.release_conn(&self.peer, self.direction);
        Ok(result?)
    }
}

/// A bound listener awaiting inbound connections.
pub enum UpgradedListener {
    Raw(Box<dyn Listener>),
    #[cfg(feature = "quic")]
    Quic(QuicListener),
}

impl UpgradedListener {
    /// The address actually bound, where the underlying transport
    /// exposes one.
    pub fn local_address(&self) -> Option<Multiaddr> {
        match self {
            UpgradedListener::Raw(l) => Some(l.local_address()),
            #[cfg(feature = "quic")]
            UpgradedListener::Quic(_) => None,
        }
    }

    /// Stop accepting; any pending or future `accept` wakes with
    /// `TransportError::ListenerClosed` (QUIC listeners report this
    /// through their own close path instead).
    pub async fn close(&mut self) {
        match self {
            UpgradedListener::Raw(l) => l.close().await,
            #[cfg(feature = "quic")]
            UpgradedListener::Quic(_) => {}
        }
    }
}

/// Selects a transport per address, runs its upgrade path, and reserves
/// connections/streams against a shared [`ResourceManager`].
pub struct Orchestrator {
    identity: Arc<Keypair>,
    resources: Arc<ResourceManager>,
    tcp: TcpTransport,
    memory: MemoryTransport,
    #[cfg(feature = "quic")]
    quic: QuicTransport,
    #[cfg(feature = "webrtc")]
    webrtc: tokio::sync::OnceCell<Arc<WebRtcDirectTransport>>,
}

impl Orchestrator {
    /// Build an orchestrator for the given identity and resource budget.
    pub fn new(identity: Arc<Keypair>, resources: Arc<ResourceManager>) -> Self {
        Self {
            #[cfg(feature = "quic")]
            quic: QuicTransport::new(identity.clone()),
            identity,
            resources,
            tcp: TcpTransport,
            memory: MemoryTransport,
            #[cfg(feature = "webrtc")]
            webrtc: tokio::sync::OnceCell::new(),
        }
    }

    #[cfg(feature = "webrtc")]
    async fn webrtc_dial_transport(&self) -> Result<Arc<WebRtcDirectTransport>, OrchestratorError> {
        let identity = self.identity.clone();
        let transport = self
            .webrtc
            .get_or_try_init(|| async move {
                let addr = Multiaddr::webrtc_direct(std::net::Ipv4Addr::UNSPECIFIED, 0);
                WebRtcDirectTransport::bind(&addr, identity).await.map(Arc::new)
            })
            .await?;
        Ok(transport.clone())
    }

    /// Dial `addr`, which must carry a `/p2p/<peer>` component. Reserves
    /// the outbound connection before attempting anything, and releases
    /// it again if the attempt fails at any later step.
    pub async fn dial(&self, addr: &Multiaddr) -> Result<UpgradedConnection, OrchestratorError> {
        let peer = addr.peer_id().ok_or(OrchestratorError::MissingPeerId)?;
        self.resources.reserve_outbound_conn(&peer)?;
        match self.dial_inner(addr, &peer).await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                self.resources.release_conn(&peer, Direction::Outbound);
                Err(e)
            }
        }
    }

    async fn dial_inner(&self, addr: &Multiaddr, peer: &PeerId) -> Result<UpgradedConnection, OrchestratorError> {
        #[cfg(feature = "quic")]
        if self.quic.can_dial(addr) {
            let conn = self.quic.dial_secured(addr, Some(peer)).await?;
            return Ok(UpgradedConnection {
                inner: ConnectionInner::Quic(conn),
                resources: self.resources.clone(),
                peer: peer.clone(),
                direction: Direction::Outbound,
            });
        }
        #[cfg(feature = "webrtc")]
        if addr.is_webrtc_direct() {
            let transport = self.webrtc_dial_transport().await?;
            let conn = transport.dial_secured(addr, Some(peer)).await?;
            return Ok(UpgradedConnection {
                inner: ConnectionInner::Muxed(conn),
                resources: self.resources.clone(),
                peer: peer.clone(),
                direction: Direction::Outbound,
            });
        }
        if self.tcp.can_dial(addr) {
            let raw = self.tcp.dial(addr).await?;
            return self.finish_raw_dial(raw, peer).await;
        }
        if self.memory.can_dial(addr) {
            let raw = self.memory.dial(addr).await?;
            return self.finish_raw_dial(raw, peer).await;
        }
        Err(OrchestratorError::NoTransportForAddress)
    }

    async fn finish_raw_dial(
        &self,
        raw: Box<dyn RawConn>,
        peer: &PeerId,
    ) -> Result<UpgradedConnection, OrchestratorError> {
        let mut secured = upgrade_outbound(raw, &self.identity, Some(peer)).await?;
        negotiate_outbound_secured(secured.as_mut(), SUPPORTED_MUXER_PROTOCOLS).await?;
        let conn = MuxedConnection::new(secured, Role::Client, self.identity.derive_peer_id());
        Ok(UpgradedConnection {
            inner: ConnectionInner::Muxed(conn),
            resources: self.resources.clone(),
            peer: peer.clone(),
            direction: Direction::Outbound,
        })
    }

    /// Bind a listener on `addr`.
    pub async fn listen(&self, addr: &Multiaddr) -> Result<UpgradedListener, OrchestratorError> {
        #[cfg(feature = "quic")]
        if addr.is_quic() {
            let listener = self.quic.listen_secured(addr).await?;
            return Ok(UpgradedListener::Quic(listener));
        }
        if self.tcp.can_listen(addr) {
            return Ok(UpgradedListener::Raw(self.tcp.listen(addr).await?));
        }
        if self.memory.can_listen(addr) {
            return Ok(UpgradedListener::Raw(self.memory.listen(addr).await?));
        }
        Err(OrchestratorError::NoTransportForAddress)
    }

    /// Accept the next inbound connection from `listener`, reserving it
    /// against the resource manager after the upgrade completes.
    pub async fn accept(&self, listener: &mut UpgradedListener) -> Result<UpgradedConnection, OrchestratorError> {
        match listener {
            UpgradedListener::Raw(l) => {
                let raw = l.accept().await?;
                let mut secured = upgrade_inbound(raw, &self.identity).await?;
                let peer = secured.remote_peer_id();
                negotiate_inbound_secured(secured.as_mut(), SUPPORTED_MUXER_PROTOCOLS).await?;
                self.resources.reserve_inbound_conn(&peer)?;
                let conn = MuxedConnection::new(secured, Role::Server, self.identity.derive_peer_id());
                Ok(UpgradedConnection {
                    inner: ConnectionInner::Muxed(conn),
                    resources: self.resources.clone(),
                    peer,
                    direction: Direction::Inbound,
                })
            }
            #[cfg(feature = "quic")]
            UpgradedListener::Quic(l) => {
                let conn = l.accept().await?;
                let peer = MuxedConn::remote_peer_id(conn.as_ref());
                self.resources.reserve_inbound_conn(&peer)?;
                Ok(UpgradedConnection {
                    inner: ConnectionInner::Quic(conn),
                    resources: self.resources.clone(),
                    peer,
                    direction: Direction::Inbound,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::config::ResourceLimitsConfiguration;

    fn orchestrator() -> Orchestrator {
        let identity = Arc::new(Keypair::generate_ed25519().unwrap());
        let resources = Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default()));
        Orchestrator::new(identity, resources)
    }

    #[tokio::test]
    async fn dial_without_p2p_component_is_rejected() {
        let orchestrator = orchestrator();
        let addr = Multiaddr::memory(1);
        let err = orchestrator.dial(&addr).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingPeerId));
    }

    #[tokio::test]
    async fn dial_with_no_matching_transport_is_rejected() {
        let orchestrator = orchestrator();
        let peer = Keypair::generate_ed25519().unwrap().derive_peer_id();
        // A bare p2p component: enough to satisfy the MissingPeerId check,
        // but no transport component any Dialer recognizes.
        let addr = Multiaddr::from_components(vec![crate::multiaddr::Component::P2p(peer)]).unwrap();
        let err = orchestrator.dial(&addr).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoTransportForAddress));
    }

    #[tokio::test]
    async fn in_memory_dial_and_accept_establish_a_muxed_connection() {
        let listener_identity = Arc::new(Keypair::generate_ed25519().unwrap());
        let listener_peer = listener_identity.derive_peer_id();
        let listener_orchestrator =
            Orchestrator::new(listener_identity, Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default())));

        let listen_addr = Multiaddr::memory(777);
        let mut listener = listener_orchestrator.listen(&listen_addr).await.unwrap();

        let accept_task = tokio::spawn(async move {
            let orchestrator = listener_orchestrator;
            orchestrator.accept(&mut listener).await.map(|c| c.remote_peer_id())
        });

        let dialer = orchestrator();
        let dial_addr = listen_addr.append(crate::multiaddr::Component::P2p(listener_peer.clone())).unwrap();
        let dial_conn = dialer.dial(&dial_addr).await.unwrap();

        let accepted_peer = accept_task.await.unwrap().unwrap();
        assert_eq!(dial_conn.remote_peer_id(), listener_peer);
        assert_ne!(accepted_peer, listener_peer);
    }
}
