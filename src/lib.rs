// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! A from-scratch libp2p transport core: addressing, identity, transports,
//! security upgrades, stream multiplexing, resource accounting, peer
//! discovery, and NAT hole punching, assembled behind a single dial/listen
//! orchestrator.
//!
//! This crate provides:
//! - Self-describing addressing (`Multiaddr`, `Multihash`, `PeerId`)
//! - Pluggable raw transports (in-memory, TCP, UDP, QUIC, WebRTC-Direct)
//! - Security upgrades (Noise, plaintext) and stream multiplexing
//! - A resource manager enforcing connection/stream/memory limits per scope
//! - Peer discovery (mDNS) and direct connection upgrade through relay (DCUtR)
//! - Prometheus metrics and structured `tracing` logging throughout

/// Address and content identifiers: `Multiaddr`.
pub mod multiaddr;
/// Self-describing hash codes (`Multihash`).
pub mod multihash;
/// Peer identifiers derived from public keys.
pub mod peer_id;
/// Ed25519/secp256k1/P256/RSA signing key pairs.
pub mod keypair;

/// Minimal varint codec shared by the wire formats above.
pub mod varint;
/// Minimal length-delimited protobuf codec used by handshake payloads.
pub mod protobuf_lite;
/// Fixed-capacity LRU key-ordering index for building bounded caches.
pub mod lru;

/// Raw, unsecured transports (in-memory, TCP, UDP).
pub mod transport;
/// Security upgrades applied to a raw connection (Noise, plaintext).
pub mod security;
/// Stream multiplexing applied to a secured connection.
pub mod mux;
/// Transports that are secured and muxed by construction (QUIC, WebRTC-Direct).
pub mod secured;
/// The post-upgrade connection/stream abstraction common to every transport.
pub mod muxed;

/// Per-scope connection/stream/memory accounting.
pub mod resource;
/// Resource-tracked stream wrapper released on drop.
pub mod tracked_stream;
/// Dial/listen/accept orchestration across all registered transports.
pub mod orchestrator;

/// Multi-subscriber broadcast channel used by discovery and DCUtR events.
pub mod broadcaster;
/// Peer discovery sources (mDNS).
pub mod discovery;
/// Direct Connection Upgrade through Relay (hole punching).
pub mod dcutr;

/// Persistent node identity (the long-lived `Keypair` on disk).
pub mod identity;
/// Node and resource-limits TOML configuration.
pub mod config;
/// Prometheus metrics.
pub mod metrics;
