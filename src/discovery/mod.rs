// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Observable address discovery. Today this is mDNS only; it never
//! opens a libp2p connection itself, only publishes observations for
//! the orchestrator or DCUtR to act on.

mod dns_wire;
pub mod mdns;

pub use mdns::{MdnsService, Observation};
