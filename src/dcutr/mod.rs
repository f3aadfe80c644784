// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! DCUtR: direct connection upgrade through relay. Two peers already
//! connected via a relay exchange their observed public addresses over
//! a dedicated stream, then simultaneously dial each other so both
//! NATs see an outbound packet toward the other peer at roughly the
//! same moment. Reuses [`Orchestrator::dial`] for the actual punch
//! attempts; this module only runs the coordination handshake and the
//! retry/backoff policy around it.

mod framed;
mod wire;

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use thiserror::Error;
use tracing::{debug, warn};

use crate::broadcaster::Broadcaster;
use crate::multiaddr::{Component, Multiaddr};
use crate::muxed::MuxedConnError;
use crate::orchestrator::{Orchestrator, OrchestratorError, UpgradedConnection};
use crate::peer_id::PeerId;

use framed::FrameIo;
use wire::{HolePunch, WireError};

const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors from a single hole-punch attempt or the retry loop around it.
#[derive(Debug, Error)]
pub enum DcutrError {
    #[error("peer sent a message of the wrong type")]
    ProtocolViolation,
    #[error("peer offered no observed addresses")]
    NoAddresses,
    #[error("every candidate dial failed")]
    AllDialsFailed,
    #[error("dcutr operation timed out")]
    Timeout,
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Muxed(#[from] MuxedConnError),
    #[error(transparent)]
    Relay(#[from] OrchestratorError),
    #[error("maximum attempts exceeded: {0}")]
    MaxAttemptsExceeded(Box<DcutrError>),
}

/// Observable lifecycle events, mirroring the named stages a hole punch
/// passes through.
#[derive(Debug, Clone)]
pub enum DcutrEvent {
    HolePunchAttemptStarted { peer: PeerId, attempt: u32 },
    AddressExchangeCompleted { peer: PeerId, rtt: Duration },
    DirectConnectionEstablished { peer: PeerId, addr: Multiaddr },
    HolePunchAttemptFailed { peer: PeerId, attempt: u32, max: u32 },
    HolePunchFailed { peer: PeerId, reason: String },
}

/// Tunables for the retry loop and per-step deadlines.
#[derive(Debug, Clone)]
pub struct HolePunchConfig {
    pub max_attempts: u32,
    pub per_message_timeout: Duration,
    pub per_dial_timeout: Duration,
    pub backoff_cap: Duration,
}

impl Default for HolePunchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_message_timeout: Duration::from_secs(5),
            per_dial_timeout: Duration::from_secs(10),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

async fn with_timeout<T, E>(
    dur: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, DcutrError>
where
    DcutrError: From<E>,
{
    match tokio::time::timeout(dur, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(DcutrError::Timeout),
    }
}

fn ipv6_is_unique_local(ip: &std::net::Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn ipv6_is_unicast_link_local(ip: &std::net::Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Discard loopback, unspecified, and private-range candidates; only an
/// address with a globally routable IP is worth dialing.
fn is_publicly_dialable(addr: &Multiaddr) -> bool {
    let ip = addr.components().iter().find_map(|c| match c {
        Component::Ip4(ip) => Some(IpAddr::V4(*ip)),
        Component::Ip6(ip) => Some(IpAddr::V6(*ip)),
        _ => None,
    });
    match ip {
        Some(IpAddr::V4(v4)) => {
            !v4.is_loopback() && !v4.is_unspecified() && !v4.is_private() && !v4.is_link_local()
        }
        Some(IpAddr::V6(v6)) => {
            !v6.is_loopback()
                && !v6.is_unspecified()
                && !ipv6_is_unique_local(&v6)
                && !ipv6_is_unicast_link_local(&v6)
        }
        None => false,
    }
}

fn append_peer_if_missing(addr: Multiaddr, peer: &PeerId) -> Multiaddr {
    if addr.peer_id().is_some() {
        return addr;
    }
    addr.append(Component::P2p(peer.clone())).unwrap_or(addr)
}

type BoxDialFuture<'a> = Pin<Box<dyn Future<Output = Result<(Multiaddr, UpgradedConnection), DcutrError>> + Send + 'a>>;

/// Dial every candidate in parallel; the first to succeed wins and the
/// rest are dropped (cancelling their in-flight dials).
async fn dial_candidates<'a>(
    orchestrator: &'a Orchestrator,
    per_dial_timeout: Duration,
    candidates: Vec<Multiaddr>,
) -> Result<(Multiaddr, UpgradedConnection), DcutrError> {
    if candidates.is_empty() {
        return Err(DcutrError::AllDialsFailed);
    }
    let futures: Vec<BoxDialFuture<'a>> = candidates
        .into_iter()
        .map(|addr| {
            let fut: BoxDialFuture<'a> = Box::pin(async move {
                match tokio::time::timeout(per_dial_timeout, orchestrator.dial(&addr)).await {
                    Ok(Ok(conn)) => Ok((addr, conn)),
                    Ok(Err(e)) => {
                        debug!(%addr, error = %e, "dcutr candidate dial failed");
                        Err(DcutrError::AllDialsFailed)
                    }
                    Err(_) => {
                        debug!(%addr, "dcutr candidate dial timed out");
                        Err(DcutrError::AllDialsFailed)
                    }
                }
            });
            fut
        })
        .collect();

    let (winner, _still_running) =
        future::select_ok(futures).await.map_err(|_| DcutrError::AllDialsFailed)?;
    Ok(winner)
}

/// Coordinates hole-punch attempts over relayed connections. One
/// service can drive any number of concurrent punches; each borrows the
/// relayed [`UpgradedConnection`] to open (or accept) its own stream.
pub struct DcutrService {
    orchestrator: Arc<Orchestrator>,
    events: Arc<Broadcaster<DcutrEvent>>,
    config: HolePunchConfig,
}

impl DcutrService {
    pub fn new(orchestrator: Arc<Orchestrator>, config: HolePunchConfig) -> Self {
        Self { orchestrator, events: Arc::new(Broadcaster::new(DEFAULT_EVENT_CHANNEL_CAPACITY)), config }
    }

    /// Subscribe to lifecycle events, or `None` if the broadcaster has
    /// been shut down.
    pub fn events(&self) -> Option<tokio::sync::broadcast::Receiver<DcutrEvent>> {
        self.events.subscribe()
    }

    /// Run the initiator side of the protocol, retrying up to
    /// `max_attempts` times with exponential backoff. `NoAddresses` and
    /// `ProtocolViolation` are not retried.
    pub async fn initiate(
        &self,
        relay: &UpgradedConnection,
        local_public_addresses: &[Multiaddr],
    ) -> Result<Multiaddr, DcutrError> {
        let peer = relay.remote_peer_id();
        let mut last_err: Option<DcutrError> = None;

        for attempt in 1..=self.config.max_attempts {
            self.events.emit(DcutrEvent::HolePunchAttemptStarted { peer: peer.clone(), attempt });
            match self.attempt_initiate(relay, local_public_addresses).await {
                Ok(addr) => {
                    self.events.emit(DcutrEvent::DirectConnectionEstablished {
                        peer: peer.clone(),
                        addr: addr.clone(),
                    });
                    return Ok(addr);
                }
                Err(e @ (DcutrError::NoAddresses | DcutrError::ProtocolViolation)) => {
                    self.events.emit(DcutrEvent::HolePunchFailed {
                        peer: peer.clone(),
                        reason: e.to_string(),
                    });
                    return Err(e);
                }
                Err(e) => {
                    self.events.emit(DcutrEvent::HolePunchAttemptFailed {
                        peer: peer.clone(),
                        attempt,
                        max: self.config.max_attempts,
                    });
                    last_err = Some(e);
                    if attempt < self.config.max_attempts {
                        let backoff = Duration::from_secs(1u64 << (attempt - 1)).min(self.config.backoff_cap);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        let inner = last_err.unwrap_or(DcutrError::AllDialsFailed);
        self.events.emit(DcutrEvent::HolePunchFailed {
            peer,
            reason: format!("max attempts exceeded ({})", self.config.max_attempts),
        });
        Err(DcutrError::MaxAttemptsExceeded(Box::new(inner)))
    }

    async fn attempt_initiate(
        &self,
        relay: &UpgradedConnection,
        local_public_addresses: &[Multiaddr],
    ) -> Result<Multiaddr, DcutrError> {
        let peer = relay.remote_peer_id();
        let mut stream = relay.open_stream().await?;
        let t0 = tokio::time::Instant::now();

        let obs_addrs: Vec<Vec<u8>> = local_public_addresses.iter().map(|a| a.to_bytes()).collect();
        {
            let mut io = FrameIo::new(&mut stream);
            with_timeout(self.config.per_message_timeout, io.write_frame(&HolePunch::connect(obs_addrs).encode()))
                .await?;

            let reply_bytes = with_timeout(self.config.per_message_timeout, io.read_frame()).await?;
            let reply = HolePunch::decode(&reply_bytes)?;
            if !reply.is_connect() {
                return Err(DcutrError::ProtocolViolation);
            }
            if reply.obs_addrs.is_empty() {
                return Err(DcutrError::NoAddresses);
            }

            let rtt = t0.elapsed();
            self.events.emit(DcutrEvent::AddressExchangeCompleted { peer: peer.clone(), rtt });

            with_timeout(self.config.per_message_timeout, io.write_frame(&HolePunch::sync().encode())).await?;
            tokio::time::sleep(rtt / 2).await;

            let candidates = filter_and_label(&reply.obs_addrs, &peer);
            drop(io);
            let _ = stream.close().await;
            let (addr, _conn) = dial_candidates(&self.orchestrator, self.config.per_dial_timeout, candidates).await?;
            Ok(addr)
        }
    }

    /// Run the responder side on an already-accepted DCUtR stream
    /// (`relay.accept_stream()` is expected to hand back exactly the
    /// stream the initiator opened for this protocol). A dial failure
    /// here is not surfaced as an error — the initiator may still
    /// succeed from its own side — it is reported only as an event.
    pub async fn respond(
        &self,
        relay: &UpgradedConnection,
        local_public_addresses: &[Multiaddr],
    ) -> Result<Option<Multiaddr>, DcutrError> {
        let peer = relay.remote_peer_id();
        let mut stream = relay.accept_stream().await?;
        let mut io = FrameIo::new(&mut stream);

        let connect_bytes = with_timeout(self.config.per_message_timeout, io.read_frame()).await?;
        let connect = HolePunch::decode(&connect_bytes)?;
        if !connect.is_connect() {
            return Err(DcutrError::ProtocolViolation);
        }

        let obs_addrs: Vec<Vec<u8>> = local_public_addresses.iter().map(|a| a.to_bytes()).collect();
        with_timeout(self.config.per_message_timeout, io.write_frame(&HolePunch::connect(obs_addrs).encode()))
            .await?;

        let sync_bytes = with_timeout(self.config.per_message_timeout, io.read_frame()).await?;
        let sync = HolePunch::decode(&sync_bytes)?;
        if !sync.is_sync() {
            return Err(DcutrError::ProtocolViolation);
        }

        let candidates = filter_and_label(&connect.obs_addrs, &peer);
        drop(io);
        let _ = stream.close().await;

        match dial_candidates(&self.orchestrator, self.config.per_dial_timeout, candidates).await {
            Ok((addr, _conn)) => {
                self.events.emit(DcutrEvent::DirectConnectionEstablished { peer, addr: addr.clone() });
                Ok(Some(addr))
            }
            Err(_) => {
                self.events.emit(DcutrEvent::HolePunchFailed { peer, reason: "hole punch failed".to_string() });
                warn!("dcutr responder could not establish a direct connection; the initiator may still succeed");
                Ok(None)
            }
        }
    }
}

fn filter_and_label(raw_obs_addrs: &[Vec<u8>], peer: &PeerId) -> Vec<Multiaddr> {
    raw_obs_addrs
        .iter()
        .filter_map(|b| Multiaddr::decode(b).ok())
        .filter(is_publicly_dialable)
        .map(|a| append_peer_if_missing(a, peer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn loopback_and_private_addresses_are_filtered() {
        assert!(!is_publicly_dialable(&Multiaddr::tcp(Ipv4Addr::new(127, 0, 0, 1), 4001)));
        assert!(!is_publicly_dialable(&Multiaddr::tcp(Ipv4Addr::new(10, 0, 0, 5), 4001)));
        assert!(!is_publicly_dialable(&Multiaddr::tcp(Ipv4Addr::new(172, 16, 3, 3), 4001)));
        assert!(!is_publicly_dialable(&Multiaddr::tcp(Ipv4Addr::new(192, 168, 1, 1), 4001)));
        assert!(!is_publicly_dialable(&Multiaddr::tcp(Ipv4Addr::new(169, 254, 1, 1), 4001)));
        assert!(!is_publicly_dialable(&Multiaddr::tcp(Ipv4Addr::UNSPECIFIED, 4001)));
        assert!(is_publicly_dialable(&Multiaddr::tcp(Ipv4Addr::new(203, 0, 113, 7), 4001)));
    }

    #[test]
    fn ipv6_unique_local_and_link_local_are_filtered() {
        let addr_from = |ip: Ipv6Addr| Multiaddr::from_components(vec![Component::Ip6(ip), Component::Tcp(4001)]).unwrap();
        assert!(!is_publicly_dialable(&addr_from(Ipv6Addr::LOCALHOST)));
        assert!(!is_publicly_dialable(&addr_from(Ipv6Addr::UNSPECIFIED)));
        assert!(!is_publicly_dialable(&addr_from("fc00::1".parse().unwrap())));
        assert!(!is_publicly_dialable(&addr_from("fe80::1".parse().unwrap())));
        assert!(is_publicly_dialable(&addr_from("2001:db8::1".parse().unwrap())));
    }

    #[test]
    fn peer_component_is_appended_only_when_absent() {
        let peer = crate::keypair::Keypair::generate_ed25519().unwrap().derive_peer_id();
        let bare = Multiaddr::tcp(Ipv4Addr::new(203, 0, 113, 7), 4001);
        let labeled = append_peer_if_missing(bare.clone(), &peer);
        assert_eq!(labeled.peer_id(), Some(peer.clone()));

        let already_labeled = labeled.clone();
        assert_eq!(append_peer_if_missing(already_labeled.clone(), &peer), already_labeled);
    }

    use crate::keypair::Keypair;
    use crate::resource::config::ResourceLimitsConfiguration;
    use crate::resource::ResourceManager;

    async fn relay_pair(memory_id: u64) -> (UpgradedConnection, UpgradedConnection, PeerId) {
        let listener_identity = Arc::new(Keypair::generate_ed25519().unwrap());
        let listener_peer = listener_identity.derive_peer_id();
        let listener_orchestrator = Arc::new(Orchestrator::new(
            listener_identity,
            Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default())),
        ));

        let listen_addr = Multiaddr::memory(memory_id);
        let mut listener = listener_orchestrator.listen(&listen_addr).await.unwrap();

        let accept_orchestrator = listener_orchestrator.clone();
        let accept_task =
            tokio::spawn(async move { accept_orchestrator.accept(&mut listener).await.unwrap() });

        let dialer_identity = Arc::new(Keypair::generate_ed25519().unwrap());
        let dialer_orchestrator = Arc::new(Orchestrator::new(
            dialer_identity,
            Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default())),
        ));
        let dial_addr = listen_addr.append(Component::P2p(listener_peer.clone())).unwrap();
        let dial_conn = dialer_orchestrator.dial(&dial_addr).await.unwrap();
        let accept_conn = accept_task.await.unwrap();

        (dial_conn, accept_conn, listener_peer)
    }

    #[tokio::test]
    async fn initiator_fails_fast_on_empty_observed_addresses() {
        let (initiator_relay, responder_relay, _listener_peer) = relay_pair(90010).await;

        let responder_task = tokio::spawn(async move {
            let mut stream = responder_relay.accept_stream().await.unwrap();
            let mut io = FrameIo::new(&mut stream);
            let bytes = io.read_frame().await.unwrap();
            let msg = HolePunch::decode(&bytes).unwrap();
            assert!(msg.is_connect());
            io.write_frame(&HolePunch::connect(Vec::new()).encode()).await.unwrap();
        });

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(Keypair::generate_ed25519().unwrap()),
            Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default())),
        ));
        let service = DcutrService::new(orchestrator, HolePunchConfig::default());
        let result = service.initiate(&initiator_relay, &[]).await;
        assert!(matches!(result, Err(DcutrError::NoAddresses)));
        responder_task.await.unwrap();
    }

    #[tokio::test]
    async fn initiator_retries_then_reports_max_attempts_exceeded() {
        let (initiator_relay, responder_relay, listener_peer) = relay_pair(90020).await;

        let unreachable = Multiaddr::tcp(Ipv4Addr::new(203, 0, 113, 1), 9);
        let their_addr = unreachable.to_bytes();

        let responder_task = tokio::spawn(async move {
            let mut stream = responder_relay.accept_stream().await.unwrap();
            let mut io = FrameIo::new(&mut stream);
            let bytes = io.read_frame().await.unwrap();
            let msg = HolePunch::decode(&bytes).unwrap();
            assert!(msg.is_connect());
            io.write_frame(&HolePunch::connect(vec![their_addr]).encode()).await.unwrap();
            let sync_bytes = io.read_frame().await.unwrap();
            assert!(HolePunch::decode(&sync_bytes).unwrap().is_sync());
        });

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(Keypair::generate_ed25519().unwrap()),
            Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default())),
        ));
        let config = HolePunchConfig {
            max_attempts: 2,
            per_message_timeout: Duration::from_millis(200),
            per_dial_timeout: Duration::from_millis(50),
            backoff_cap: Duration::from_millis(1),
        };
        let service = DcutrService::new(orchestrator, config);
        let result = service.initiate(&initiator_relay, &[]).await;
        assert!(matches!(result, Err(DcutrError::MaxAttemptsExceeded(_))));
        let _ = listener_peer;
        // The responder only ever answers the first attempt's stream; the
        // second attempt's stream has nobody on the other end and times out.
        responder_task.await.unwrap();
    }
}
