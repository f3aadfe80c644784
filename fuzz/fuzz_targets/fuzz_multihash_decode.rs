// Copyright (c) 2026 Amunchain
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use libp2p_core_rs::multihash::Multihash;

fuzz_target!(|data: &[u8]| {
    if let Ok(mh) = Multihash::decode(data) {
        // `decode` does not require the whole input be consumed, so the
        // re-encoding is only guaranteed to be a prefix of `data`.
        assert!(data.starts_with(&mh.encode()));
    }
});
