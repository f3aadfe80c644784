// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! System-scope admission failure must not leave any trace of the peer
//! in the resource manager's snapshot.

use libp2p_core_rs::keypair::Keypair;
use libp2p_core_rs::resource::config::{ResourceLimitsConfiguration, ScopeLimitsConfig};
use libp2p_core_rs::resource::{ResourceError, ResourceKind, ResourceManager, Scope};

#[test]
fn system_limit_denial_leaves_no_peer_record() {
    let config = ResourceLimitsConfiguration {
        system: ScopeLimitsConfig { max_inbound_conns: Some(1), ..Default::default() },
        default_peer: ScopeLimitsConfig { max_inbound_conns: Some(10), ..Default::default() },
        ..Default::default()
    };
    let manager = ResourceManager::new(config);

    let occupant = Keypair::generate_ed25519().unwrap().derive_peer_id();
    manager.reserve_inbound_conn(&occupant).unwrap();

    let peer = Keypair::generate_ed25519().unwrap().derive_peer_id();
    let err = manager.reserve_inbound_conn(&peer).unwrap_err();
    assert!(matches!(
        err,
        ResourceError::LimitExceeded { scope: Scope::System, resource: ResourceKind::InboundConnections }
    ));

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.system.total_connections(), 1);
    assert!(!snapshot.peers.contains_key(&peer));
}
