// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Node-level TOML configuration: listen addresses and the data directory
//! holding the identity key, loaded the same way as
//! [`resource::config::ResourceLimitsConfiguration`] — a `serde::Deserialize`
//! struct with `#[serde(default)]` fields and an env-override-then-file-then-
//! default load order.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the node config path.
pub const NODE_CONFIG_ENV_VAR: &str = "LIBP2P_CORE_CONFIG";

/// Errors loading a [`NodeConfig`].
#[derive(Debug, Error)]
pub enum NodeConfigError {
    /// The file could not be read.
    #[error("failed to read node config at {0}")]
    Read(String),
    /// The file did not parse as valid TOML for this schema.
    #[error("failed to parse node config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_listen_addrs() -> Vec<String> {
    vec!["/ip4/0.0.0.0/tcp/4001".to_string()]
}

/// The node's own configuration: where it persists its identity key and
/// what it listens on. Resource limits live in a separate document
/// (`resource::config::ResourceLimitsConfiguration`) since they are
/// typically managed independently.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    /// Directory holding `identity.key` and other per-node state.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Multiaddr text forms to listen on at startup.
    #[serde(default = "default_listen_addrs")]
    pub listen_addrs: Vec<String>,
    /// Multiaddr text forms of bootstrap peers to dial at startup.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    /// Enable the mDNS local-network discovery source.
    #[serde(default = "default_true")]
    pub mdns_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            listen_addrs: default_listen_addrs(),
            bootstrap_peers: Vec::new(),
            mdns_enabled: true,
        }
    }
}

impl NodeConfig {
    /// Parse from a TOML document already read into memory.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NodeConfigError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|_| NodeConfigError::Read(path.display().to_string()))?;
        Self::from_toml_str(&contents)
    }

    /// Load from the path named by [`NODE_CONFIG_ENV_VAR`] if set and
    /// readable, falling back to `default_path`, falling back further to
    /// [`NodeConfig::default`] if neither exists.
    pub fn from_env_or_default(default_path: impl AsRef<Path>) -> Self {
        if let Ok(env_path) = std::env::var(NODE_CONFIG_ENV_VAR) {
            if let Ok(config) = Self::from_file(&env_path) {
                return config;
            }
            tracing::warn!(path = %env_path, "failed to load node config from env override, falling back");
        }
        Self::from_file(default_path).unwrap_or_default()
    }

    /// The data directory as a [`PathBuf`].
    pub fn data_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn parses_listen_and_bootstrap_addrs() {
        let toml = r#"
            data_dir = "/var/lib/node"
            listen_addrs = ["/ip4/0.0.0.0/tcp/4001", "/ip4/0.0.0.0/udp/4001/quic-v1"]
            bootstrap_peers = ["/ip4/1.2.3.4/tcp/4001/p2p/12D3KooWExample"]
            mdns_enabled = false
        "#;
        let config = NodeConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.data_dir, "/var/lib/node");
        assert_eq!(config.listen_addrs.len(), 2);
        assert_eq!(config.bootstrap_peers.len(), 1);
        assert!(!config.mdns_enabled);
    }

    #[test]
    fn missing_file_and_env_falls_back_to_default() {
        std::env::remove_var(NODE_CONFIG_ENV_VAR);
        let config = NodeConfig::from_env_or_default("/nonexistent/path.toml");
        assert_eq!(config, NodeConfig::default());
    }
}
