// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! End-to-end: listen on an in-memory address, dial it, exchange one
//! message, then observe an orderly shutdown.

use std::sync::Arc;

use libp2p_core_rs::keypair::Keypair;
use libp2p_core_rs::multiaddr::{Component, Multiaddr};
use libp2p_core_rs::muxed::MuxedStreamLike;
use libp2p_core_rs::orchestrator::{Orchestrator, OrchestratorError};
use libp2p_core_rs::resource::config::ResourceLimitsConfiguration;
use libp2p_core_rs::resource::ResourceManager;

fn new_orchestrator() -> Orchestrator {
    let identity = Arc::new(Keypair::generate_ed25519().unwrap());
    let resources = Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default()));
    Orchestrator::new(identity, resources)
}

#[tokio::test]
async fn in_memory_dial_and_echo() {
    let server_identity = Arc::new(Keypair::generate_ed25519().unwrap());
    let server_peer = server_identity.public().derive_peer_id();
    let server = Arc::new(Orchestrator::new(
        server_identity,
        Arc::new(ResourceManager::new(ResourceLimitsConfiguration::default())),
    ));

    let listen_addr = Multiaddr::memory(910_001);
    let mut listener = server.listen(&listen_addr).await.unwrap();

    let server_clone = server.clone();
    let accept_task = tokio::spawn(async move {
        let conn = server_clone.accept(&mut listener).await.unwrap();
        let mut stream = conn.accept_stream().await.unwrap();
        let msg = stream.read().await.unwrap();
        assert_eq!(msg, b"hello");
        // Writer closes; the next read must observe EOF (empty chunk).
        let eof = stream.read().await.unwrap();
        assert!(eof.is_empty());
        conn
    });

    let client = new_orchestrator();
    let dial_addr = listen_addr.append(Component::P2p(server_peer.clone())).unwrap();
    let client_conn = client.dial(&dial_addr).await.unwrap();
    assert_eq!(client_conn.remote_peer_id(), server_peer);

    let mut client_stream = client_conn.open_stream().await.unwrap();
    client_stream.write(b"hello").await.unwrap();
    client_stream.close().await.unwrap();

    let server_conn = accept_task.await.unwrap();
    server_conn.close().await.unwrap();

    // A listener that has been shut down rejects any pending accept.
    let mut closed_listener = server.listen(&Multiaddr::memory(910_002)).await.unwrap();
    closed_listener.close().await;
    let err = server.accept(&mut closed_listener).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Transport(_)));
}
