#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Node entrypoint (systemd-friendly). Loads configuration and identity,
//! starts the orchestrator's listeners, mDNS discovery, and DCUtR, and
//! keeps the process alive until interrupted.

use std::sync::Arc;

use tracing::{info, warn};

use libp2p_core_rs::config::NodeConfig;
use libp2p_core_rs::dcutr::{DcutrService, HolePunchConfig};
use libp2p_core_rs::discovery::mdns::MdnsService;
use libp2p_core_rs::identity::Keystore;
use libp2p_core_rs::metrics::Metrics;
use libp2p_core_rs::multiaddr::Multiaddr;
use libp2p_core_rs::orchestrator::Orchestrator;
use libp2p_core_rs::resource::config::ResourceLimitsConfiguration;
use libp2p_core_rs::resource::ResourceManager;

/// Default node config path, used when `LIBP2P_CORE_CONFIG` is unset.
const NODE_CONFIG_DEFAULT_PATH: &str = "./node.toml";
/// Default resource limits path, used when `LIBP2P_CORE_RESOURCE_LIMITS` is unset.
const RESOURCE_LIMITS_DEFAULT_PATH: &str = "./resource_limits.toml";

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let config = NodeConfig::from_env_or_default(NODE_CONFIG_DEFAULT_PATH);
    let data_dir = config.data_dir_path();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data dir {}: {e}", data_dir.display());
        std::process::exit(1);
    }

    let keystore = match Keystore::open(&data_dir) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("failed to load identity key: {e}");
            std::process::exit(1);
        }
    };
    let identity = Arc::new(keystore.into_keypair());
    let local_peer = identity.public().derive_peer_id();
    info!(peer = %local_peer, "node identity loaded");

    let metrics = Arc::new(Metrics::new().expect("metrics init failed"));

    let resource_limits = ResourceLimitsConfiguration::from_env_or_default(RESOURCE_LIMITS_DEFAULT_PATH);
    let resources = Arc::new(ResourceManager::new(resource_limits));

    let orchestrator = Arc::new(Orchestrator::new(identity, resources));

    let mut listen_addrs = Vec::new();
    for text in &config.listen_addrs {
        match Multiaddr::parse_str(text) {
            Ok(addr) => listen_addrs.push(addr),
            Err(e) => warn!(addr = %text, error = %e, "skipping unparseable listen address"),
        }
    }

    for addr in &listen_addrs {
        let orchestrator = orchestrator.clone();
        match orchestrator.listen(addr).await {
            Ok(mut listener) => {
                info!(%addr, "listening");
                tokio::spawn(async move {
                    loop {
                        match orchestrator.accept(&mut listener).await {
                            Ok(conn) => {
                                info!(peer = %conn.remote_peer_id(), "inbound connection accepted");
                            }
                            Err(e) => {
                                warn!(error = %e, "accept failed");
                                break;
                            }
                        }
                    }
                });
            }
            Err(e) => warn!(%addr, error = %e, "failed to listen"),
        }
    }

    for text in &config.bootstrap_peers {
        let Ok(addr) = Multiaddr::parse_str(text) else {
            warn!(addr = %text, "skipping unparseable bootstrap address");
            continue;
        };
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            match orchestrator.dial(&addr).await {
                Ok(conn) => info!(peer = %conn.remote_peer_id(), "dialed bootstrap peer"),
                Err(e) => warn!(%addr, error = %e, "failed to dial bootstrap peer"),
            }
        });
    }

    if config.mdns_enabled {
        match MdnsService::spawn(local_peer.clone(), listen_addrs.clone()).await {
            Ok(mdns) => {
                if let Some(mut observations) = mdns.observations(None) {
                    tokio::spawn(async move {
                        while let Some(obs) = observations.recv().await {
                            info!(peer = ?obs.peer, addrs = ?obs.addresses, "mdns observation");
                        }
                    });
                }
            }
            Err(e) => warn!(error = %e, "failed to start mdns"),
        }
    }

    let dcutr = Arc::new(DcutrService::new(orchestrator.clone(), HolePunchConfig::default()));
    if let Some(mut events) = dcutr.events() {
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                info!(?event, "dcutr event");
            }
        });
    }

    info!(metrics_registered = metrics.registry.gather().len(), "node started");

    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
