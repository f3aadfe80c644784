// Copyright (c) 2026 Amunchain
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use libp2p_core_rs::varint;

fuzz_target!(|data: &[u8]| {
    if let Ok((value, consumed)) = varint::decode(data) {
        let mut reencoded = Vec::new();
        varint::encode_into(value, &mut reencoded);
        assert_eq!(reencoded, data[..consumed]);
    }
});
