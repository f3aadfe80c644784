// Copyright (c) 2026 Amunchain
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use libp2p_core_rs::multiaddr::Multiaddr;

fuzz_target!(|data: &[u8]| {
    if let Ok(addr) = Multiaddr::decode(data) {
        assert_eq!(addr.to_bytes(), data);
    }
});
