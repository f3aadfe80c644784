// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Hierarchical resource accounting: connections, streams, and memory
//! tracked across system, peer, protocol, and service scopes, with
//! atomic multi-scope admission.

pub mod config;

use crate::peer_id::PeerId;
use config::ResourceLimitsConfiguration;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Which scope an admission check or limit applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    System,
    Peer(PeerId),
    Protocol(String),
    Service(String),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::System => write!(f, "system"),
            Scope::Peer(p) => write!(f, "peer:{p}"),
            Scope::Protocol(p) => write!(f, "protocol:{p}"),
            Scope::Service(s) => write!(f, "service:{s}"),
        }
    }
}

/// Which counter a limit violation was against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    InboundConnections,
    OutboundConnections,
    TotalConnections,
    InboundStreams,
    OutboundStreams,
    TotalStreams,
    Memory,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::InboundConnections => "inbound_conns",
            ResourceKind::OutboundConnections => "outbound_conns",
            ResourceKind::TotalConnections => "total_connections",
            ResourceKind::InboundStreams => "inbound_streams",
            ResourceKind::OutboundStreams => "outbound_streams",
            ResourceKind::TotalStreams => "total_streams",
            ResourceKind::Memory => "memory_bytes",
        };
        write!(f, "{s}")
    }
}

/// Resource manager errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// An admission would have exceeded `resource`'s bound within `scope`.
    /// No state was mutated.
    #[error("limit exceeded in scope {scope} for resource {resource}")]
    LimitExceeded { scope: Scope, resource: ResourceKind },
}

/// A direction for a connection or stream reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Point-in-time counters for one scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceStat {
    pub inbound_conns: u64,
    pub outbound_conns: u64,
    pub inbound_streams: u64,
    pub outbound_streams: u64,
    pub memory_bytes: u64,
}

impl ResourceStat {
    /// `inbound_conns + outbound_conns`.
    pub fn total_connections(&self) -> u64 {
        self.inbound_conns + self.outbound_conns
    }

    /// `inbound_streams + outbound_streams`.
    pub fn total_streams(&self) -> u64 {
        self.inbound_streams + self.outbound_streams
    }

    /// Whether every counter is zero.
    pub fn is_zero(&self) -> bool {
        self.inbound_conns == 0
            && self.outbound_conns == 0
            && self.inbound_streams == 0
            && self.outbound_streams == 0
            && self.memory_bytes == 0
    }

    fn saturating_release(&mut self, field: ResourceKind, amount: u64) {
        let counter = match field {
            ResourceKind::InboundConnections => &mut self.inbound_conns,
            ResourceKind::OutboundConnections => &mut self.outbound_conns,
            ResourceKind::InboundStreams => &mut self.inbound_streams,
            ResourceKind::OutboundStreams => &mut self.outbound_streams,
            ResourceKind::Memory => &mut self.memory_bytes,
            ResourceKind::TotalConnections | ResourceKind::TotalStreams => return,
        };
        *counter = counter.saturating_sub(amount);
    }
}

/// Independent optional upper bounds for one scope; `None` is unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScopeLimits {
    pub max_inbound_conns: Option<u64>,
    pub max_outbound_conns: Option<u64>,
    pub max_inbound_streams: Option<u64>,
    pub max_outbound_streams: Option<u64>,
    pub max_memory_bytes: Option<u64>,
    pub max_total_connections: Option<u64>,
    pub max_total_streams: Option<u64>,
}

impl ScopeLimits {
    /// Check whether `stat` plus the proposed connection increment would
    /// stay within bounds; returns the first violated resource, if any.
    fn check_conn(&self, stat: &ResourceStat, direction: Direction) -> Option<ResourceKind> {
        match direction {
            Direction::Inbound => {
                if exceeds(stat.inbound_conns, 1, self.max_inbound_conns) {
                    return Some(ResourceKind::InboundConnections);
                }
            }
            Direction::Outbound => {
                if exceeds(stat.outbound_conns, 1, self.max_outbound_conns) {
                    return Some(ResourceKind::OutboundConnections);
                }
            }
        }
        if exceeds(stat.total_connections(), 1, self.max_total_connections) {
            return Some(ResourceKind::TotalConnections);
        }
        None
    }

    fn check_stream(&self, stat: &ResourceStat, direction: Direction) -> Option<ResourceKind> {
        match direction {
            Direction::Inbound => {
                if exceeds(stat.inbound_streams, 1, self.max_inbound_streams) {
                    return Some(ResourceKind::InboundStreams);
                }
            }
            Direction::Outbound => {
                if exceeds(stat.outbound_streams, 1, self.max_outbound_streams) {
                    return Some(ResourceKind::OutboundStreams);
                }
            }
        }
        if exceeds(stat.total_streams(), 1, self.max_total_streams) {
            return Some(ResourceKind::TotalStreams);
        }
        None
    }

    fn check_memory(&self, stat: &ResourceStat, bytes: u64) -> Option<ResourceKind> {
        if exceeds(stat.memory_bytes, bytes, self.max_memory_bytes) {
            Some(ResourceKind::Memory)
        } else {
            None
        }
    }
}

fn exceeds(current: u64, increment: u64, limit: Option<u64>) -> bool {
    match limit {
        Some(max) => current.saturating_add(increment) > max,
        None => false,
    }
}

struct Inner {
    system_limits: ScopeLimits,
    system_stat: ResourceStat,
    default_peer_limits: ScopeLimits,
    peer_overrides: HashMap<PeerId, ScopeLimits>,
    peer_stats: HashMap<PeerId, ResourceStat>,
    default_protocol_limits: ScopeLimits,
    protocol_overrides: HashMap<String, ScopeLimits>,
    protocol_stats: HashMap<String, ResourceStat>,
    default_service_limits: ScopeLimits,
    service_overrides: HashMap<String, ScopeLimits>,
    service_stats: HashMap<String, ResourceStat>,
}

impl Inner {
    fn peer_limits(&self, peer: &PeerId) -> ScopeLimits {
        self.peer_overrides
            .get(peer)
            .copied()
            .unwrap_or(self.default_peer_limits)
    }

    fn protocol_limits(&self, protocol_id: &str) -> ScopeLimits {
        self.protocol_overrides
            .get(protocol_id)
            .copied()
            .unwrap_or(self.default_protocol_limits)
    }

    fn service_limits(&self, service_id: &str) -> ScopeLimits {
        self.service_overrides
            .get(service_id)
            .copied()
            .unwrap_or(self.default_service_limits)
    }
}

/// A point-in-time copy of every tracked scope's counters.
#[derive(Clone, Debug, Default)]
pub struct ResourceSnapshot {
    pub system: ResourceStat,
    pub peers: HashMap<PeerId, ResourceStat>,
    pub protocols: HashMap<String, ResourceStat>,
    pub services: HashMap<String, ResourceStat>,
}

/// Authoritative admission control for connections, streams, and memory.
pub struct ResourceManager {
    inner: Mutex<Inner>,
}

impl ResourceManager {
    /// Build a manager from a loaded configuration. This is the sole
    /// entry point used by the orchestrator and by `main`.
    pub fn new(config: ResourceLimitsConfiguration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                system_limits: config.system.into(),
                system_stat: ResourceStat::default(),
                default_peer_limits: config.default_peer.into(),
                peer_overrides: config
                    .peer_overrides
                    .into_iter()
                    .filter_map(|(k, v)| {
                        crate::peer_id::PeerId::from_str_any(&k).ok().map(|p| (p, v.into()))
                    })
                    .collect(),
                peer_stats: HashMap::new(),
                default_protocol_limits: config.default_protocol.into(),
                protocol_overrides: config
                    .protocol_overrides
                    .into_iter()
                    .map(|(k, v)| (k, v.into()))
                    .collect(),
                protocol_stats: HashMap::new(),
                default_service_limits: config.default_service.into(),
                service_overrides: config
                    .service_overrides
                    .into_iter()
                    .map(|(k, v)| (k, v.into()))
                    .collect(),
                service_stats: HashMap::new(),
            }),
        }
    }

    /// Reserve one inbound connection against system and peer scopes.
    pub fn reserve_inbound_conn(&self, peer: &PeerId) -> Result<(), ResourceError> {
        self.reserve_conn(peer, Direction::Inbound)
    }

    /// Reserve one outbound connection against system and peer scopes.
    pub fn reserve_outbound_conn(&self, peer: &PeerId) -> Result<(), ResourceError> {
        self.reserve_conn(peer, Direction::Outbound)
    }

    fn reserve_conn(&self, peer: &PeerId, direction: Direction) -> Result<(), ResourceError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(kind) = inner.system_limits.check_conn(&inner.system_stat, direction) {
            return Err(ResourceError::LimitExceeded { scope: Scope::System, resource: kind });
        }
        let peer_limits = inner.peer_limits(peer);
        let peer_stat = inner.peer_stats.get(peer).copied().unwrap_or_default();
        if let Some(kind) = peer_limits.check_conn(&peer_stat, direction) {
            return Err(ResourceError::LimitExceeded {
                scope: Scope::Peer(peer.clone()),
                resource: kind,
            });
        }

        apply_conn(&mut inner.system_stat, direction, 1);
        let entry = inner.peer_stats.entry(peer.clone()).or_default();
        apply_conn(entry, direction, 1);
        Ok(())
    }

    /// Release one connection previously reserved for `peer`, saturating
    /// at zero; removes the peer record if its stat becomes zero.
    pub fn release_conn(&self, peer: &PeerId, direction: Direction) {
        let mut inner = self.inner.lock().unwrap();
        release_conn(&mut inner.system_stat, direction);
        if let Some(stat) = inner.peer_stats.get_mut(peer) {
            release_conn(stat, direction);
            if stat.is_zero() {
                inner.peer_stats.remove(peer);
            }
        }
    }

    /// Reserve one stream against system and peer scopes.
    pub fn reserve_stream(&self, peer: &PeerId, direction: Direction) -> Result<(), ResourceError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(kind) = inner.system_limits.check_stream(&inner.system_stat, direction) {
            return Err(ResourceError::LimitExceeded { scope: Scope::System, resource: kind });
        }
        let peer_limits = inner.peer_limits(peer);
        let peer_stat = inner.peer_stats.get(peer).copied().unwrap_or_default();
        if let Some(kind) = peer_limits.check_stream(&peer_stat, direction) {
            return Err(ResourceError::LimitExceeded {
                scope: Scope::Peer(peer.clone()),
                resource: kind,
            });
        }

        apply_stream(&mut inner.system_stat, direction, 1);
        let entry = inner.peer_stats.entry(peer.clone()).or_default();
        apply_stream(entry, direction, 1);
        Ok(())
    }

    /// Reserve one stream for `protocol_id`, additionally checking the
    /// protocol scope.
    pub fn reserve_protocol_stream(
        &self,
        protocol_id: &str,
        peer: &PeerId,
        direction: Direction,
    ) -> Result<(), ResourceError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(kind) = inner.system_limits.check_stream(&inner.system_stat, direction) {
            return Err(ResourceError::LimitExceeded { scope: Scope::System, resource: kind });
        }
        let peer_limits = inner.peer_limits(peer);
        let peer_stat = inner.peer_stats.get(peer).copied().unwrap_or_default();
        if let Some(kind) = peer_limits.check_stream(&peer_stat, direction) {
            return Err(ResourceError::LimitExceeded {
                scope: Scope::Peer(peer.clone()),
                resource: kind,
            });
        }
        let protocol_limits = inner.protocol_limits(protocol_id);
        let protocol_stat = inner.protocol_stats.get(protocol_id).copied().unwrap_or_default();
        if let Some(kind) = protocol_limits.check_stream(&protocol_stat, direction) {
            return Err(ResourceError::LimitExceeded {
                scope: Scope::Protocol(protocol_id.to_string()),
                resource: kind,
            });
        }

        apply_stream(&mut inner.system_stat, direction, 1);
        apply_stream(inner.peer_stats.entry(peer.clone()).or_default(), direction, 1);
        apply_stream(
            inner.protocol_stats.entry(protocol_id.to_string()).or_default(),
            direction,
            1,
        );
        Ok(())
    }

    /// Release one stream previously reserved via [`Self::reserve_stream`].
    pub fn release_stream(&self, peer: &PeerId, direction: Direction) {
        let mut inner = self.inner.lock().unwrap();
        release_stream(&mut inner.system_stat, direction);
        if let Some(stat) = inner.peer_stats.get_mut(peer) {
            release_stream(stat, direction);
            if stat.is_zero() {
                inner.peer_stats.remove(peer);
            }
        }
    }

    /// Release one stream previously reserved via
    /// [`Self::reserve_protocol_stream`].
    pub fn release_protocol_stream(&self, protocol_id: &str, peer: &PeerId, direction: Direction) {
        let mut inner = self.inner.lock().unwrap();
        release_stream(&mut inner.system_stat, direction);
        if let Some(stat) = inner.peer_stats.get_mut(peer) {
            release_stream(stat, direction);
            if stat.is_zero() {
                inner.peer_stats.remove(peer);
            }
        }
        if let Some(stat) = inner.protocol_stats.get_mut(protocol_id) {
            release_stream(stat, direction);
            if stat.is_zero() {
                inner.protocol_stats.remove(protocol_id);
            }
        }
    }

    /// Reserve `bytes` of memory against system and peer scopes.
    pub fn reserve_memory(&self, bytes: u64, peer: &PeerId) -> Result<(), ResourceError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(kind) = inner.system_limits.check_memory(&inner.system_stat, bytes) {
            return Err(ResourceError::LimitExceeded { scope: Scope::System, resource: kind });
        }
        let peer_limits = inner.peer_limits(peer);
        let peer_stat = inner.peer_stats.get(peer).copied().unwrap_or_default();
        if let Some(kind) = peer_limits.check_memory(&peer_stat, bytes) {
            return Err(ResourceError::LimitExceeded {
                scope: Scope::Peer(peer.clone()),
                resource: kind,
            });
        }
        inner.system_stat.memory_bytes += bytes;
        inner.peer_stats.entry(peer.clone()).or_default().memory_bytes += bytes;
        Ok(())
    }

    /// Reserve `bytes` of memory against system and service scopes.
    pub fn reserve_service_memory(&self, bytes: u64, service: &str) -> Result<(), ResourceError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(kind) = inner.system_limits.check_memory(&inner.system_stat, bytes) {
            return Err(ResourceError::LimitExceeded { scope: Scope::System, resource: kind });
        }
        let service_limits = inner.service_limits(service);
        let service_stat = inner.service_stats.get(service).copied().unwrap_or_default();
        if let Some(kind) = service_limits.check_memory(&service_stat, bytes) {
            return Err(ResourceError::LimitExceeded {
                scope: Scope::Service(service.to_string()),
                resource: kind,
            });
        }
        inner.system_stat.memory_bytes += bytes;
        inner.service_stats.entry(service.to_string()).or_default().memory_bytes += bytes;
        Ok(())
    }

    /// Release `bytes` of memory previously reserved for `peer`, saturating
    /// at zero.
    pub fn release_memory(&self, bytes: u64, peer: &PeerId) {
        let mut inner = self.inner.lock().unwrap();
        inner.system_stat.saturating_release(ResourceKind::Memory, bytes);
        if let Some(stat) = inner.peer_stats.get_mut(peer) {
            stat.saturating_release(ResourceKind::Memory, bytes);
            if stat.is_zero() {
                inner.peer_stats.remove(peer);
            }
        }
    }

    /// Release `bytes` of memory previously reserved for `service`.
    pub fn release_service_memory(&self, bytes: u64, service: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.system_stat.saturating_release(ResourceKind::Memory, bytes);
        if let Some(stat) = inner.service_stats.get_mut(service) {
            stat.saturating_release(ResourceKind::Memory, bytes);
            if stat.is_zero() {
                inner.service_stats.remove(service);
            }
        }
    }

    /// A point-in-time copy of every tracked scope.
    pub fn snapshot(&self) -> ResourceSnapshot {
        let inner = self.inner.lock().unwrap();
        ResourceSnapshot {
            system: inner.system_stat,
            peers: inner.peer_stats.clone(),
            protocols: inner.protocol_stats.clone(),
            services: inner.service_stats.clone(),
        }
    }
}

fn apply_conn(stat: &mut ResourceStat, direction: Direction, n: u64) {
    match direction {
        Direction::Inbound => stat.inbound_conns += n,
        Direction::Outbound => stat.outbound_conns += n,
    }
}

fn release_conn(stat: &mut ResourceStat, direction: Direction) {
    match direction {
        Direction::Inbound => stat.saturating_release(ResourceKind::InboundConnections, 1),
        Direction::Outbound => stat.saturating_release(ResourceKind::OutboundConnections, 1),
    }
}

fn apply_stream(stat: &mut ResourceStat, direction: Direction, n: u64) {
    match direction {
        Direction::Inbound => stat.inbound_streams += n,
        Direction::Outbound => stat.outbound_streams += n,
    }
}

fn release_stream(stat: &mut ResourceStat, direction: Direction) {
    match direction {
        Direction::Inbound => stat.saturating_release(ResourceKind::InboundStreams, 1),
        Direction::Outbound => stat.saturating_release(ResourceKind::OutboundStreams, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{ResourceLimitsConfiguration, ScopeLimitsConfig};

    fn peer(seed: u8) -> PeerId {
        PeerId::from_public_key_bytes(&[seed; 8])
    }

    #[test]
    fn reserve_and_release_round_trip() {
        let mgr = ResourceManager::new(ResourceLimitsConfiguration::default());
        let p = peer(1);
        mgr.reserve_inbound_conn(&p).unwrap();
        let snap = mgr.snapshot();
        assert_eq!(snap.system.inbound_conns, 1);
        assert_eq!(snap.peers.get(&p).unwrap().inbound_conns, 1);
        mgr.release_conn(&p, Direction::Inbound);
        let snap = mgr.snapshot();
        assert_eq!(snap.system.inbound_conns, 0);
        assert!(!snap.peers.contains_key(&p));
    }

    #[test]
    fn system_limit_blocks_admission_atomically() {
        let mut config = ResourceLimitsConfiguration::default();
        config.system.max_inbound_conns = Some(1);
        let mgr = ResourceManager::new(config);
        let p1 = peer(1);
        let p2 = peer(2);
        mgr.reserve_inbound_conn(&p1).unwrap();
        let err = mgr.reserve_inbound_conn(&p2).unwrap_err();
        assert_eq!(
            err,
            ResourceError::LimitExceeded {
                scope: Scope::System,
                resource: ResourceKind::InboundConnections
            }
        );
        // No partial state: p2's record must not have been created.
        let snap = mgr.snapshot();
        assert!(!snap.peers.contains_key(&p2));
    }

    #[test]
    fn peer_override_limit_is_enforced_independently() {
        let mut config = ResourceLimitsConfiguration::default();
        let p = peer(3);
        config.peer_overrides.insert(
            p.to_base58(),
            ScopeLimitsConfig {
                max_total_connections: Some(1),
                ..Default::default()
            },
        );
        let mgr = ResourceManager::new(config);
        mgr.reserve_inbound_conn(&p).unwrap();
        let err = mgr.reserve_outbound_conn(&p).unwrap_err();
        assert_eq!(
            err,
            ResourceError::LimitExceeded {
                scope: Scope::Peer(p),
                resource: ResourceKind::TotalConnections
            }
        );
    }

    #[test]
    fn release_saturates_at_zero() {
        let mgr = ResourceManager::new(ResourceLimitsConfiguration::default());
        let p = peer(4);
        mgr.release_conn(&p, Direction::Inbound);
        let snap = mgr.snapshot();
        assert_eq!(snap.system.inbound_conns, 0);
        assert!(!snap.peers.contains_key(&p));
    }

    #[test]
    fn protocol_stream_scope_enforced() {
        let mut config = ResourceLimitsConfiguration::default();
        config.protocol_overrides.insert(
            "/echo/1.0.0".to_string(),
            ScopeLimitsConfig {
                max_total_streams: Some(1),
                ..Default::default()
            },
        );
        let mgr = ResourceManager::new(config);
        let p = peer(5);
        mgr.reserve_protocol_stream("/echo/1.0.0", &p, Direction::Inbound).unwrap();
        let err = mgr
            .reserve_protocol_stream("/echo/1.0.0", &p, Direction::Outbound)
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::LimitExceeded {
                scope: Scope::Protocol("/echo/1.0.0".to_string()),
                resource: ResourceKind::TotalStreams
            }
        );
    }

    #[test]
    fn memory_reservation_checked_and_released() {
        let mut config = ResourceLimitsConfiguration::default();
        config.system.max_memory_bytes = Some(100);
        let mgr = ResourceManager::new(config);
        let p = peer(6);
        mgr.reserve_memory(60, &p).unwrap();
        let err = mgr.reserve_memory(50, &p).unwrap_err();
        assert_eq!(
            err,
            ResourceError::LimitExceeded {
                scope: Scope::System,
                resource: ResourceKind::Memory
            }
        );
        mgr.release_memory(60, &p);
        mgr.reserve_memory(50, &p).unwrap();
    }

    #[test]
    fn peer_record_removed_when_all_counters_zero() {
        let mgr = ResourceManager::new(ResourceLimitsConfiguration::default());
        let p = peer(7);
        mgr.reserve_inbound_conn(&p).unwrap();
        mgr.reserve_stream(&p, Direction::Inbound).unwrap();
        mgr.release_conn(&p, Direction::Inbound);
        assert!(mgr.snapshot().peers.contains_key(&p));
        mgr.release_stream(&p, Direction::Inbound);
        assert!(!mgr.snapshot().peers.contains_key(&p));
    }
}
