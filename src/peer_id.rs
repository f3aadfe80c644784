// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! PeerID: the multihash of a peer's public key, used as its stable
//! network identifier.

use crate::multihash::{Multihash, MultihashError, CODE_IDENTITY, CODE_SHA2_256};
use std::fmt;
use thiserror::Error;

/// Above this canonical-encoding length, a peer id hashes the key with
/// SHA2-256 instead of embedding it verbatim.
const MAX_INLINE_KEY_LEN: usize = 42;

/// `libp2p-key` CIDv1 multicodec, required by the CIDv1-base32 textual form.
const MULTICODEC_LIBP2P_KEY: u64 = 0x72;
/// CID version this crate emits and accepts.
const CID_VERSION_1: u64 = 1;

/// PeerID errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerIdError {
    /// Neither base58-btc nor CIDv1-base32 decoding succeeded.
    #[error("invalid format")]
    InvalidFormat,
    /// The multihash itself was malformed.
    #[error("invalid multihash: {0}")]
    InvalidMultihash(#[from] MultihashError),
    /// A CIDv1 form carried a multicodec other than `libp2p-key`.
    #[error("unexpected multicodec {0:#x}, expected libp2p-key")]
    UnexpectedMulticodec(u64),
    /// `extract_public_key` was called on a non-identity-hashed peer id.
    #[error("public key requires an external lookup")]
    RequiresExternalLookup,
}

/// An immutable, hashable, orderable peer identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(Multihash);

impl PeerId {
    /// Derive a peer id from a public key's canonical byte encoding.
    ///
    /// Keys whose canonical encoding is at most [`MAX_INLINE_KEY_LEN`]
    /// bytes are embedded verbatim (identity hash); longer keys are
    /// hashed with SHA2-256.
    pub fn from_public_key_bytes(canonical_bytes: &[u8]) -> Self {
        let mh = if canonical_bytes.len() <= MAX_INLINE_KEY_LEN {
            Multihash::identity(canonical_bytes).expect("within MAX_DIGEST")
        } else {
            Multihash::sha2_256(canonical_bytes)
        };
        Self(mh)
    }

    /// Wrap an already-computed multihash as a peer id, without checking
    /// that it was derived according to the inline/hashed rule above.
    pub fn from_multihash(mh: Multihash) -> Self {
        Self(mh)
    }

    /// The underlying multihash.
    pub fn multihash(&self) -> &Multihash {
        &self.0
    }

    /// Raw bytes of the binary multihash form.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.encode()
    }

    /// Parse from raw multihash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PeerIdError> {
        Ok(Self(Multihash::decode(bytes)?))
    }

    /// Legacy base58-btc textual form.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }

    /// Modern CIDv1-base32 textual form: `b` + base32(varint(1) ||
    /// varint(libp2p-key) || multihash-bytes), lowercase, unpadded.
    pub fn to_cidv1(&self) -> String {
        let mut cid = Vec::new();
        crate::varint::encode_into(CID_VERSION_1, &mut cid);
        crate::varint::encode_into(MULTICODEC_LIBP2P_KEY, &mut cid);
        cid.extend_from_slice(&self.to_bytes());
        format!("b{}", base32_lower_unpadded(&cid))
    }

    /// Parse either textual form.
    pub fn from_str_any(s: &str) -> Result<Self, PeerIdError> {
        if let Some(rest) = s.strip_prefix('b') {
            if let Ok(cid_bytes) = base32_lower_unpadded_decode(rest) {
                return Self::parse_cidv1_bytes(&cid_bytes);
            }
        }
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|_| PeerIdError::InvalidFormat)?;
        Self::from_bytes(&decoded)
    }

    fn parse_cidv1_bytes(cid_bytes: &[u8]) -> Result<Self, PeerIdError> {
        let mut r = crate::varint::ByteReader::new(cid_bytes);
        let version = r.read_varint().map_err(|_| PeerIdError::InvalidFormat)?;
        if version != CID_VERSION_1 {
            return Err(PeerIdError::InvalidFormat);
        }
        let codec = r.read_varint().map_err(|_| PeerIdError::InvalidFormat)?;
        if codec != MULTICODEC_LIBP2P_KEY {
            return Err(PeerIdError::UnexpectedMulticodec(codec));
        }
        Ok(Self(Multihash::decode(r.rest())?))
    }

    /// Return the embedded public key bytes when this peer id used the
    /// identity hash; otherwise the key can only be recovered by an
    /// out-of-band lookup (e.g. from the remote during a handshake).
    pub fn extract_public_key_bytes(&self) -> Result<&[u8], PeerIdError> {
        if self.0.code() == CODE_IDENTITY {
            Ok(self.0.digest())
        } else {
            Err(PeerIdError::RequiresExternalLookup)
        }
    }

    /// Whether this peer id was computed with SHA2-256 rather than the
    /// identity hash.
    pub fn is_hashed(&self) -> bool {
        self.0.code() == CODE_SHA2_256
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_base58())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl std::str::FromStr for PeerId {
    type Err = PeerIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_any(s)
    }
}

const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

fn base32_lower_unpadded(input: &[u8]) -> String {
    let mut out = String::with_capacity((input.len() * 8 + 4) / 5);
    let mut buf: u32 = 0;
    let mut bits: u32 = 0;
    for &byte in input {
        buf = (buf << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let idx = (buf >> bits) & 0x1f;
            out.push(BASE32_ALPHABET[idx as usize] as char);
        }
    }
    if bits > 0 {
        let idx = (buf << (5 - bits)) & 0x1f;
        out.push(BASE32_ALPHABET[idx as usize] as char);
    }
    out
}

fn base32_lower_unpadded_decode(input: &str) -> Result<Vec<u8>, PeerIdError> {
    let mut buf: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    for c in input.chars() {
        let c = c.to_ascii_lowercase();
        let val = BASE32_ALPHABET
            .iter()
            .position(|&b| b as char == c)
            .ok_or(PeerIdError::InvalidFormat)? as u32;
        buf = (buf << 5) | val;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buf >> bits) & 0xff) as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_key_uses_identity_hash() {
        let key = vec![1u8; 32];
        let id = PeerId::from_public_key_bytes(&key);
        assert_eq!(id.multihash().code(), CODE_IDENTITY);
        assert_eq!(id.extract_public_key_bytes().unwrap(), key.as_slice());
    }

    #[test]
    fn long_key_uses_sha256() {
        let key = vec![2u8; 128];
        let id = PeerId::from_public_key_bytes(&key);
        assert!(id.is_hashed());
        assert_eq!(
            id.extract_public_key_bytes(),
            Err(PeerIdError::RequiresExternalLookup)
        );
    }

    #[test]
    fn base58_and_cidv1_both_parse() {
        let key = vec![9u8; 32];
        let id = PeerId::from_public_key_bytes(&key);

        let b58 = id.to_base58();
        let parsed_b58 = PeerId::from_str_any(&b58).unwrap();
        assert_eq!(parsed_b58, id);

        let cid = id.to_cidv1();
        let parsed_cid = PeerId::from_str_any(&cid).unwrap();
        assert_eq!(parsed_cid, id);
    }

    #[test]
    fn cidv1_rejects_wrong_multicodec() {
        let mut cid = Vec::new();
        crate::varint::encode_into(1, &mut cid);
        crate::varint::encode_into(0x70, &mut cid); // dag-pb, not libp2p-key
        let mh = Multihash::identity(b"x").unwrap();
        cid.extend_from_slice(&mh.encode());
        let text = format!("b{}", base32_lower_unpadded(&cid));
        assert_eq!(
            PeerId::from_str_any(&text),
            Err(PeerIdError::UnexpectedMulticodec(0x70))
        );
    }

    proptest! {
        #[test]
        fn derivation_is_deterministic(key in proptest::collection::vec(any::<u8>(), 1..200)) {
            let a = PeerId::from_public_key_bytes(&key);
            let b = PeerId::from_public_key_bytes(&key);
            prop_assert_eq!(a, b);
        }
    }
}
