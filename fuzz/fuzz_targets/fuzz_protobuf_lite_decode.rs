// Copyright (c) 2026 Amunchain
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use libp2p_core_rs::protobuf_lite;

fuzz_target!(|data: &[u8]| {
    // Best-effort: every wire-type-2 field the decoder accepts must be
    // findable again through `field`/`repeated_field` without panicking.
    if let Ok(fields) = protobuf_lite::decode(data) {
        for f in &fields {
            let got = protobuf_lite::field(&fields, f.number);
            assert!(got.is_some());
            let repeated = protobuf_lite::repeated_field(&fields, f.number);
            assert!(repeated.contains(&f.bytes));
        }
    }
});
