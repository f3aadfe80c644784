// Copyright (c) 2026 Amunchain
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use libp2p_core_rs::multiaddr::Multiaddr;

fuzz_target!(|data: &str| {
    // Anything the textual parser accepts must round-trip through its own
    // `to_text` output without the second parse failing.
    if let Ok(addr) = Multiaddr::parse_str(data) {
        let text = addr.to_text();
        assert!(Multiaddr::parse_str(&text).is_ok());
    }
});
