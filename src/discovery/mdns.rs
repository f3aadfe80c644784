// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! mDNS observation source. Advertises this node under a `_p2p._udp.local`
//! PTR/TXT record carrying `dnsaddr=<multiaddr>` attributes, and browses
//! for the same from other peers on the local network. Never dials or
//! opens a connection itself; it only publishes [`Observation`]s.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use super::dns_wire::{build_announcement, parse_answers, Answer};
use crate::broadcaster::Broadcaster;
use crate::multiaddr::{Component, Multiaddr};
use crate::peer_id::PeerId;

const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MULTICAST_PORT: u16 = 5353;
const SERVICE_TYPE: &str = "_p2p._udp.local";
const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(60);
const OBSERVATION_CHANNEL_CAPACITY: usize = 256;

/// One resolved peer sighting: the peer id when it could be determined,
/// and whatever addresses were recovered for it.
#[derive(Debug, Clone)]
pub struct Observation {
    pub peer: Option<PeerId>,
    pub addresses: Vec<Multiaddr>,
}

fn instance_name(local_peer: &PeerId) -> String {
    format!("{}.{}", local_peer.to_base58(), SERVICE_TYPE)
}

/// Build the TXT strings advertising `addrs`, appending a `/p2p/<peer>`
/// component to any address that lacks one.
fn txt_strings_for(local_peer: &PeerId, addrs: &[Multiaddr]) -> Vec<String> {
    addrs
        .iter()
        .filter_map(|addr| {
            let with_peer = if addr.peer_id().is_some() {
                addr.clone()
            } else {
                addr.append(Component::P2p(local_peer.clone())).ok()?
            };
            Some(format!("dnsaddr={}", with_peer.to_text()))
        })
        .collect()
}

/// Parse the peer id encoded in an instance name, if the local node
/// advertised its real peer id rather than a random `p2p-<uuid>` name.
fn peer_id_from_instance_name(name: &str) -> Option<PeerId> {
    let label = name.strip_suffix(&format!(".{SERVICE_TYPE}"))?;
    PeerId::from_str_any(label).ok()
}

/// Turn one resolved response packet into an observation, applying the
/// dnsaddr-preferred / legacy-reconstruction / silent-skip rules.
fn observation_from_answers(answers: &[Answer], resolved_from: SocketAddr) -> Option<Observation> {
    let ptr_target = answers.iter().find_map(|a| match a {
        Answer::Ptr { name, target } if name == SERVICE_TYPE => Some(target.clone()),
        _ => None,
    })?;

    let subject = peer_id_from_instance_name(&ptr_target);

    let txt_strings = answers.iter().find_map(|a| match a {
        Answer::Txt { name, strings } if *name == ptr_target => Some(strings.clone()),
        _ => None,
    });

    let mut addresses = Vec::new();
    if let Some(strings) = txt_strings {
        for s in &strings {
            let Some(encoded) = s.strip_prefix("dnsaddr=") else { continue };
            let Ok(addr) = Multiaddr::parse_str(encoded) else {
                trace!(%encoded, "skipping unparseable dnsaddr attribute");
                continue;
            };
            match (&subject, addr.peer_id()) {
                (Some(expected), Some(got)) if *expected != got => {
                    trace!("skipping dnsaddr whose p2p component disagrees with the service name");
                    continue;
                }
                _ => {}
            }
            addresses.push(addr);
        }
    }

    if addresses.is_empty() {
        // Legacy fallback: reconstruct from SRV (port) + A/AAAA (host) if
        // present, or from the socket the packet arrived from.
        let port = answers.iter().find_map(|a| match a {
            Answer::Srv { name, port, .. } if *name == ptr_target => Some(*port),
            _ => None,
        });
        if let Some(port) = port {
            let host = answers
                .iter()
                .find_map(|a| match a {
                    Answer::A { addr, .. } => Some(std::net::IpAddr::V4(*addr)),
                    Answer::Aaaa { addr, .. } => Some(std::net::IpAddr::V6(*addr)),
                    _ => None,
                })
                .unwrap_or(resolved_from.ip());
            if let std::net::IpAddr::V4(ip) = host {
                addresses.push(Multiaddr::tcp(ip, port));
            }
        }
    }

    if addresses.is_empty() {
        return None;
    }
    Some(Observation { peer: subject, addresses })
}

/// An mDNS responder/browser running on a background task.
pub struct MdnsService {
    broadcaster: Arc<Broadcaster<Observation>>,
    socket: Arc<UdpSocket>,
    local_peer: PeerId,
    advertised: tokio::sync::Mutex<Vec<Multiaddr>>,
}

impl MdnsService {
    /// Bind the mDNS multicast socket and spawn the announce/browse
    /// loops. `advertise_addrs` are the addresses this node publishes;
    /// they are re-announced periodically and whenever a query for our
    /// service type is observed.
    pub async fn spawn(
        local_peer: PeerId,
        advertise_addrs: Vec<Multiaddr>,
    ) -> std::io::Result<Arc<Self>> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MULTICAST_PORT)).await?;
        socket.join_multicast_v4(MULTICAST_ADDR, Ipv4Addr::UNSPECIFIED)?;

        let service = Arc::new(Self {
            broadcaster: Arc::new(Broadcaster::new(OBSERVATION_CHANNEL_CAPACITY)),
            socket: Arc::new(socket),
            local_peer,
            advertised: tokio::sync::Mutex::new(advertise_addrs),
        });

        tokio::spawn(service.clone().announce_loop());
        tokio::spawn(service.clone().browse_loop());

        Ok(service)
    }

    /// Subscribe to observations, optionally filtered to one peer id.
    pub fn observations(&self, subject: Option<PeerId>) -> Option<ObservationStream> {
        self.broadcaster.subscribe().map(|rx| ObservationStream { rx, subject })
    }

    async fn announce_once(&self) {
        let addrs = self.advertised.lock().await.clone();
        let strings = txt_strings_for(&self.local_peer, &addrs);
        if strings.is_empty() {
            return;
        }
        let instance = instance_name(&self.local_peer);
        let Ok(packet) = build_announcement(SERVICE_TYPE, &instance, &strings) else {
            return;
        };
        let dest = SocketAddr::V4(SocketAddrV4::new(MULTICAST_ADDR, MULTICAST_PORT));
        if let Err(e) = self.socket.send_to(&packet, dest).await {
            warn!(error = %e, "mdns announce failed");
        }
    }

    async fn announce_loop(self: Arc<Self>) {
        self.announce_once().await;
        let mut ticker = tokio::time::interval(ANNOUNCE_INTERVAL);
        ticker.tick().await; // consume the immediate first tick
        loop {
            ticker.tick().await;
            self.announce_once().await;
        }
    }

    async fn browse_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; 4096];
        loop {
            let (n, from) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "mdns recv failed");
                    continue;
                }
            };
            let answers = match parse_answers(&buf[..n]) {
                Ok(a) => a,
                Err(e) => {
                    debug!(error = ?e, "dropping unparseable mdns packet");
                    continue;
                }
            };
            if let Some(observation) = observation_from_answers(&answers, from) {
                self.broadcaster.emit(observation);
            }
        }
    }
}

/// A per-subscriber observation stream, optionally filtered to one peer.
pub struct ObservationStream {
    rx: tokio::sync::broadcast::Receiver<Observation>,
    subject: Option<PeerId>,
}

impl ObservationStream {
    /// Wait for the next observation matching this stream's filter.
    pub async fn recv(&mut self) -> Option<Observation> {
        loop {
            match self.rx.recv().await {
                Ok(obs) => {
                    if let Some(subject) = &self.subject {
                        if obs.peer.as_ref() != Some(subject) {
                            continue;
                        }
                    }
                    return Some(obs);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        crate::keypair::Keypair::generate_ed25519().unwrap().derive_peer_id()
    }

    #[test]
    fn prefers_dnsaddr_over_legacy_reconstruction() {
        let peer = peer();
        let advertised = Multiaddr::tcp(Ipv4Addr::new(10, 0, 0, 5), 4001)
            .append(Component::P2p(peer.clone()))
            .unwrap();
        let strings = vec![format!("dnsaddr={}", advertised.to_text())];
        let instance = instance_name(&peer);
        let packet = build_announcement(SERVICE_TYPE, &instance, &strings).unwrap();
        let answers = parse_answers(&packet).unwrap();

        let from = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 5353));
        let obs = observation_from_answers(&answers, from).unwrap();
        assert_eq!(obs.peer, Some(peer));
        assert_eq!(obs.addresses, vec![advertised]);
    }

    #[test]
    fn mismatched_peer_component_is_skipped_silently() {
        let peer = peer();
        let other = peer();
        let foreign_addr = Multiaddr::tcp(Ipv4Addr::new(10, 0, 0, 5), 4001)
            .append(Component::P2p(other))
            .unwrap();
        let strings = vec![format!("dnsaddr={}", foreign_addr.to_text())];
        let instance = instance_name(&peer);
        let packet = build_announcement(SERVICE_TYPE, &instance, &strings).unwrap();
        let answers = parse_answers(&packet).unwrap();

        let from = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 5353));
        assert!(observation_from_answers(&answers, from).is_none());
    }

    #[test]
    fn unparseable_dnsaddr_is_skipped_silently() {
        let peer = peer();
        let strings = vec!["dnsaddr=not-a-multiaddr".to_string()];
        let instance = instance_name(&peer);
        let packet = build_announcement(SERVICE_TYPE, &instance, &strings).unwrap();
        let answers = parse_answers(&packet).unwrap();

        let from = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 5353));
        assert!(observation_from_answers(&answers, from).is_none());
    }
}
