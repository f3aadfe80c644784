// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! TOML-driven configuration for the resource manager, loaded the same
//! way the teacher loads its peer registry and `P2pConfig`: a
//! `serde::Deserialize` struct with explicit `#[serde(default)]` fields,
//! validated after parsing.

use super::ScopeLimits;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding the resource-limits config path.
pub const RESOURCE_LIMITS_ENV_VAR: &str = "LIBP2P_CORE_RESOURCE_LIMITS";

/// Errors loading a [`ResourceLimitsConfiguration`].
#[derive(Debug, Error)]
pub enum ResourceConfigError {
    /// The file could not be read.
    #[error("failed to read resource limits config at {0}")]
    Read(String),
    /// The file did not parse as valid TOML for this schema.
    #[error("failed to parse resource limits config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A peer-id or id key used as a map key did not parse.
    #[error("invalid id key in resource limits config: {0}")]
    InvalidIdKey(String),
}

/// Optional per-scope bounds; `None` means unlimited for that counter.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ScopeLimitsConfig {
    #[serde(default)]
    pub max_inbound_conns: Option<u64>,
    #[serde(default)]
    pub max_outbound_conns: Option<u64>,
    #[serde(default)]
    pub max_inbound_streams: Option<u64>,
    #[serde(default)]
    pub max_outbound_streams: Option<u64>,
    #[serde(default)]
    pub max_memory_bytes: Option<u64>,
    #[serde(default)]
    pub max_total_connections: Option<u64>,
    #[serde(default)]
    pub max_total_streams: Option<u64>,
}

impl From<ScopeLimitsConfig> for ScopeLimits {
    fn from(c: ScopeLimitsConfig) -> Self {
        ScopeLimits {
            max_inbound_conns: c.max_inbound_conns,
            max_outbound_conns: c.max_outbound_conns,
            max_inbound_streams: c.max_inbound_streams,
            max_outbound_streams: c.max_outbound_streams,
            max_memory_bytes: c.max_memory_bytes,
            max_total_connections: c.max_total_connections,
            max_total_streams: c.max_total_streams,
        }
    }
}

/// The full resource-manager configuration, as loaded from TOML.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ResourceLimitsConfiguration {
    /// System-wide limits, applied regardless of peer/protocol/service.
    #[serde(default)]
    pub system: ScopeLimitsConfig,
    /// Default limits applied to any peer without an override.
    #[serde(default)]
    pub default_peer: ScopeLimitsConfig,
    /// Per-peer overrides, keyed by the peer's base58 or CIDv1-base32 text form.
    #[serde(default)]
    pub peer_overrides: HashMap<String, ScopeLimitsConfig>,
    /// Default limits applied to any protocol without an override.
    #[serde(default)]
    pub default_protocol: ScopeLimitsConfig,
    /// Per-protocol-id overrides.
    #[serde(default)]
    pub protocol_overrides: HashMap<String, ScopeLimitsConfig>,
    /// Default limits applied to any service without an override.
    #[serde(default)]
    pub default_service: ScopeLimitsConfig,
    /// Per-service-id overrides.
    #[serde(default)]
    pub service_overrides: HashMap<String, ScopeLimitsConfig>,
}

impl ResourceLimitsConfiguration {
    /// Parse from a TOML document already read into memory.
    pub fn from_toml_str(s: &str) -> Result<Self, ResourceConfigError> {
        let config: Self = toml::from_str(s)?;
        Ok(config)
    }

    /// Load from a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ResourceConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|_| ResourceConfigError::Read(path.display().to_string()))?;
        Self::from_toml_str(&contents)
    }

    /// Load from the path named by [`RESOURCE_LIMITS_ENV_VAR`] if set and
    /// readable, falling back to `default_path`, falling back further to
    /// an unlimited default configuration if neither exists.
    pub fn from_env_or_default(default_path: impl AsRef<Path>) -> Self {
        if let Ok(env_path) = std::env::var(RESOURCE_LIMITS_ENV_VAR) {
            if let Ok(config) = Self::from_file(&env_path) {
                return config;
            }
            tracing::warn!(path = %env_path, "failed to load resource limits from env override, falling back");
        }
        Self::from_file(default_path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_unlimited_defaults() {
        let config = ResourceLimitsConfiguration::from_toml_str("").unwrap();
        assert_eq!(config.system, ScopeLimitsConfig::default());
        assert!(config.peer_overrides.is_empty());
    }

    #[test]
    fn parses_nested_overrides() {
        let toml = r#"
            [system]
            max_inbound_conns = 1000

            [default_peer]
            max_total_connections = 8

            [peer_overrides."12D3KooWExample"]
            max_total_connections = 64
        "#;
        let config = ResourceLimitsConfiguration::from_toml_str(toml).unwrap();
        assert_eq!(config.system.max_inbound_conns, Some(1000));
        assert_eq!(config.default_peer.max_total_connections, Some(8));
        assert_eq!(
            config
                .peer_overrides
                .get("12D3KooWExample")
                .unwrap()
                .max_total_connections,
            Some(64)
        );
    }

    #[test]
    fn missing_file_and_env_falls_back_to_default() {
        std::env::remove_var(RESOURCE_LIMITS_ENV_VAR);
        let config = ResourceLimitsConfiguration::from_env_or_default("/nonexistent/path.toml");
        assert_eq!(config, ResourceLimitsConfiguration::default());
    }
}
