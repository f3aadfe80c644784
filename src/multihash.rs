// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Self-describing multihash: `{ code, digest }` with a length-capped
//! binary form `varint(code) || varint(len) || digest`.

use crate::varint::{self, ByteReader, VarintError};
use thiserror::Error;

/// Identity multihash code: the "digest" is the input bytes, unhashed.
pub const CODE_IDENTITY: u64 = 0x00;
/// SHA2-256 multihash code.
pub const CODE_SHA2_256: u64 = 0x12;

/// Maximum digest length this crate will decode or construct.
pub const MAX_DIGEST: usize = 65536;

/// Multihash errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MultihashError {
    /// The hash function code is not one this crate recognizes.
    #[error("unknown multihash code {0:#x}")]
    UnknownCode(u64),
    /// The declared digest length exceeds [`MAX_DIGEST`].
    #[error("digest too large: {0} bytes")]
    DigestTooLarge(u64),
    /// Fewer bytes were available than the declared digest length required.
    #[error("insufficient data for multihash")]
    InsufficientData,
}

impl From<VarintError> for MultihashError {
    fn from(_: VarintError) -> Self {
        MultihashError::InsufficientData
    }
}

/// A self-describing hash digest.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Multihash {
    code: u64,
    digest: Vec<u8>,
}

fn known_code(code: u64) -> bool {
    matches!(code, CODE_IDENTITY | CODE_SHA2_256)
}

impl Multihash {
    /// Construct directly from a code and digest, without hashing.
    ///
    /// Fails if `code` is unrecognized or `digest` exceeds [`MAX_DIGEST`].
    pub fn new(code: u64, digest: Vec<u8>) -> Result<Self, MultihashError> {
        if !known_code(code) {
            return Err(MultihashError::UnknownCode(code));
        }
        if digest.len() > MAX_DIGEST {
            return Err(MultihashError::DigestTooLarge(digest.len() as u64));
        }
        Ok(Self { code, digest })
    }

    /// Hash `input` with SHA2-256 and wrap the digest.
    pub fn sha2_256(input: &[u8]) -> Self {
        let digest = ring::digest::digest(&ring::digest::SHA256, input);
        Self {
            code: CODE_SHA2_256,
            digest: digest.as_ref().to_vec(),
        }
    }

    /// Wrap `input` verbatim as an identity multihash.
    ///
    /// Fails if `input` exceeds [`MAX_DIGEST`].
    pub fn identity(input: &[u8]) -> Result<Self, MultihashError> {
        Self::new(CODE_IDENTITY, input.to_vec())
    }

    /// The hash function code.
    pub fn code(&self) -> u64 {
        self.code
    }

    /// The digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Encode to `varint(code) || varint(len) || digest`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.digest.len());
        varint::encode_into(self.code, &mut out);
        varint::encode_into(self.digest.len() as u64, &mut out);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Decode from the bit-exact binary form.
    pub fn decode(bytes: &[u8]) -> Result<Self, MultihashError> {
        let mut r = ByteReader::new(bytes);
        let code = r.read_varint()?;
        if !known_code(code) {
            return Err(MultihashError::UnknownCode(code));
        }
        let len = r.read_varint()?;
        if len > MAX_DIGEST as u64 {
            return Err(MultihashError::DigestTooLarge(len));
        }
        let digest = r.read_exact(len as usize)?.to_vec();
        Ok(Self { code, digest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trip_identity() {
        let mh = Multihash::identity(b"hello").unwrap();
        let encoded = mh.encode();
        let decoded = Multihash::decode(&encoded).unwrap();
        assert_eq!(mh, decoded);
        assert_eq!(decoded.code(), CODE_IDENTITY);
        assert_eq!(decoded.digest(), b"hello");
    }

    #[test]
    fn round_trip_sha256() {
        let mh = Multihash::sha2_256(b"hello world");
        let decoded = Multihash::decode(&mh.encode()).unwrap();
        assert_eq!(mh, decoded);
        assert_eq!(decoded.digest().len(), 32);
    }

    #[test]
    fn unknown_code_rejected() {
        assert_eq!(
            Multihash::new(0x99, vec![1, 2, 3]),
            Err(MultihashError::UnknownCode(0x99))
        );
    }

    #[test]
    fn digest_exactly_at_cap_parses() {
        let digest = vec![7u8; MAX_DIGEST];
        let mh = Multihash::new(CODE_IDENTITY, digest).unwrap();
        let decoded = Multihash::decode(&mh.encode()).unwrap();
        assert_eq!(decoded.digest().len(), MAX_DIGEST);
    }

    #[test]
    fn digest_over_cap_rejected() {
        let digest = vec![7u8; MAX_DIGEST + 1];
        assert_eq!(
            Multihash::new(CODE_IDENTITY, digest),
            Err(MultihashError::DigestTooLarge((MAX_DIGEST + 1) as u64))
        );
    }

    #[test]
    fn decode_insufficient_data() {
        let mut buf = Vec::new();
        varint::encode_into(CODE_IDENTITY, &mut buf);
        varint::encode_into(10, &mut buf);
        buf.extend_from_slice(b"short");
        assert_eq!(Multihash::decode(&buf), Err(MultihashError::InsufficientData));
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_digest(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let mh = Multihash::new(CODE_IDENTITY, bytes.clone()).unwrap();
            let decoded = Multihash::decode(&mh.encode()).unwrap();
            prop_assert_eq!(decoded.code(), CODE_IDENTITY);
            prop_assert_eq!(decoded.digest(), bytes.as_slice());
        }
    }
}
