// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! The `HolePunch` wire message: a `type` (`CONNECT` or `SYNC`) plus a
//! repeated `ObsAddrs` field of raw multiaddr bytes. Encoded with the
//! crate's protobuf-lite codec, which understands only the
//! length-delimited wire type; `type` is therefore carried as a single
//! varint wrapped in its own length-delimited field rather than
//! protobuf's native varint wire type.

use thiserror::Error;

use crate::protobuf_lite::{self, Encoder, ProtobufLiteError};
use crate::varint::{self, VarintError};

const FIELD_TYPE: u64 = 1;
const FIELD_OBS_ADDRS: u64 = 2;

/// The initiator's (or responder's) first message, carrying its
/// observed public addresses.
pub const TYPE_CONNECT: u64 = 100;
/// The initiator's second message, confirming readiness to dial.
pub const TYPE_SYNC: u64 = 300;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error(transparent)]
    Protobuf(#[from] ProtobufLiteError),
    #[error("missing or malformed type field")]
    BadType,
}

impl From<VarintError> for WireError {
    fn from(_: VarintError) -> Self {
        WireError::BadType
    }
}

/// A decoded `HolePunch` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolePunch {
    pub msg_type: u64,
    pub obs_addrs: Vec<Vec<u8>>,
}

impl HolePunch {
    /// Build a `CONNECT` message carrying `obs_addrs` (each already
    /// encoded as multiaddr bytes).
    pub fn connect(obs_addrs: Vec<Vec<u8>>) -> Self {
        Self { msg_type: TYPE_CONNECT, obs_addrs }
    }

    /// Build an empty `SYNC` message.
    pub fn sync() -> Self {
        Self { msg_type: TYPE_SYNC, obs_addrs: Vec::new() }
    }

    pub fn is_connect(&self) -> bool {
        self.msg_type == TYPE_CONNECT
    }

    pub fn is_sync(&self) -> bool {
        self.msg_type == TYPE_SYNC
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut type_bytes = Vec::new();
        varint::encode_into(self.msg_type, &mut type_bytes);
        let mut enc = Encoder::new();
        enc.field(FIELD_TYPE, &type_bytes);
        for addr in &self.obs_addrs {
            enc.field(FIELD_OBS_ADDRS, addr);
        }
        enc.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let fields = protobuf_lite::decode(bytes)?;
        let type_bytes = protobuf_lite::field(&fields, FIELD_TYPE).ok_or(WireError::BadType)?;
        let (msg_type, consumed) = varint::decode(type_bytes)?;
        if consumed != type_bytes.len() {
            return Err(WireError::BadType);
        }
        let obs_addrs = protobuf_lite::repeated_field(&fields, FIELD_OBS_ADDRS)
            .into_iter()
            .map(|b| b.to_vec())
            .collect();
        Ok(Self { msg_type, obs_addrs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_round_trips_with_addresses() {
        let msg = HolePunch::connect(vec![b"/ip4/1.2.3.4/tcp/4001".to_vec(), b"/ip4/5.6.7.8/tcp/4002".to_vec()]);
        let decoded = HolePunch::decode(&msg.encode()).unwrap();
        assert!(decoded.is_connect());
        assert_eq!(decoded.obs_addrs, msg.obs_addrs);
    }

    #[test]
    fn sync_round_trips_with_no_addresses() {
        let msg = HolePunch::sync();
        let decoded = HolePunch::decode(&msg.encode()).unwrap();
        assert!(decoded.is_sync());
        assert!(decoded.obs_addrs.is_empty());
    }

    #[test]
    fn missing_type_field_is_rejected() {
        let bytes = Encoder::new().field(FIELD_OBS_ADDRS, b"x").into_bytes();
        assert_eq!(HolePunch::decode(&bytes), Err(WireError::BadType));
    }

    #[test]
    fn trailing_garbage_after_type_varint_is_rejected() {
        let bytes = Encoder::new().field(FIELD_TYPE, &[100, 1, 2]).into_bytes();
        assert_eq!(HolePunch::decode(&bytes), Err(WireError::BadType));
    }
}
