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

//! Prometheus metrics: connection/stream counts per direction,
//! resource-denial counters by scope, DCUtR attempt/success/failure
//! counters, and mDNS browse-error counts.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registering or constructing a Prometheus collector failed.
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry all collectors below are registered against.
    pub registry: Registry,

    /// Currently open inbound connections.
    pub connections_inbound: IntGauge,
    /// Currently open outbound connections.
    pub connections_outbound: IntGauge,
    /// Currently open inbound streams.
    pub streams_inbound: IntGauge,
    /// Currently open outbound streams.
    pub streams_outbound: IntGauge,

    /// Resource admissions denied at system scope.
    pub resource_denied_system_total: IntCounter,
    /// Resource admissions denied at peer scope.
    pub resource_denied_peer_total: IntCounter,
    /// Resource admissions denied at protocol scope.
    pub resource_denied_protocol_total: IntCounter,
    /// Resource admissions denied at service scope.
    pub resource_denied_service_total: IntCounter,

    /// DCUtR hole-punch attempts started.
    pub dcutr_attempts_total: IntCounter,
    /// DCUtR hole punches that produced a direct connection.
    pub dcutr_success_total: IntCounter,
    /// DCUtR hole punches that exhausted their retries.
    pub dcutr_failure_total: IntCounter,

    /// mDNS packets that failed to parse.
    pub mdns_browse_errors_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        macro_rules! gauge {
            ($name:expr, $help:expr) => {
                IntGauge::new($name, $help).map_err(|_| MetricsError::Prom)?
            };
        }
        macro_rules! counter {
            ($name:expr, $help:expr) => {
                IntCounter::new($name, $help).map_err(|_| MetricsError::Prom)?
            };
        }

        let connections_inbound = gauge!("libp2p_core_connections_inbound", "Open inbound connections");
        let connections_outbound = gauge!("libp2p_core_connections_outbound", "Open outbound connections");
        let streams_inbound = gauge!("libp2p_core_streams_inbound", "Open inbound streams");
        let streams_outbound = gauge!("libp2p_core_streams_outbound", "Open outbound streams");

        let resource_denied_system_total =
            counter!("libp2p_core_resource_denied_system_total", "Denied admissions at system scope");
        let resource_denied_peer_total =
            counter!("libp2p_core_resource_denied_peer_total", "Denied admissions at peer scope");
        let resource_denied_protocol_total =
            counter!("libp2p_core_resource_denied_protocol_total", "Denied admissions at protocol scope");
        let resource_denied_service_total =
            counter!("libp2p_core_resource_denied_service_total", "Denied admissions at service scope");

        let dcutr_attempts_total = counter!("libp2p_core_dcutr_attempts_total", "DCUtR hole-punch attempts");
        let dcutr_success_total =
            counter!("libp2p_core_dcutr_success_total", "DCUtR hole punches that succeeded");
        let dcutr_failure_total =
            counter!("libp2p_core_dcutr_failure_total", "DCUtR hole punches that exhausted retries");

        let mdns_browse_errors_total =
            counter!("libp2p_core_mdns_browse_errors_total", "mDNS packets that failed to parse");

        for c in [
            Box::new(connections_inbound.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(connections_outbound.clone()),
            Box::new(streams_inbound.clone()),
            Box::new(streams_outbound.clone()),
        ] {
            registry.register(c).map_err(|_| MetricsError::Prom)?;
        }
        for c in [
            Box::new(resource_denied_system_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(resource_denied_peer_total.clone()),
            Box::new(resource_denied_protocol_total.clone()),
            Box::new(resource_denied_service_total.clone()),
            Box::new(dcutr_attempts_total.clone()),
            Box::new(dcutr_success_total.clone()),
            Box::new(dcutr_failure_total.clone()),
            Box::new(mdns_browse_errors_total.clone()),
        ] {
            registry.register(c).map_err(|_| MetricsError::Prom)?;
        }

        Ok(Self {
            registry,
            connections_inbound,
            connections_outbound,
            streams_inbound,
            streams_outbound,
            resource_denied_system_total,
            resource_denied_peer_total,
            resource_denied_protocol_total,
            resource_denied_service_total,
            dcutr_attempts_total,
            dcutr_success_total,
            dcutr_failure_total,
            mdns_browse_errors_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_collectors_register_without_name_collisions() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.registry.gather().len(), 12);
    }

    #[test]
    fn counters_start_at_zero() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.dcutr_attempts_total.get(), 0);
        metrics.dcutr_attempts_total.inc();
        assert_eq!(metrics.dcutr_attempts_total.get(), 1);
    }
}
