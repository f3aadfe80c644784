// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! The libp2p identity certificate extension shared by QUIC (TLS 1.3)
//! and WebRTC-Direct (DTLS 1.2): a self-signed certificate whose
//! extension (OID `1.3.6.1.4.1.53594.1.1`) carries a `SignedKey`
//! binding the certificate's own key to the node's long-term identity.
//!
//! Signing the whole encoded certificate would be circular (the
//! signature would have to be embedded inside the very bytes it signs),
//! so — matching real libp2p-tls — the signed message is the prefix
//! plus the certificate's own `SubjectPublicKeyInfo` DER, which is
//! known before the certificate is finalized.

use crate::keypair::{Keypair, PublicKey};
use crate::multihash::Multihash;
use crate::peer_id::PeerId;
use crate::protobuf_lite::{self, Encoder};

use super::SecuredTransportError;

const SIGNING_PREFIX: &[u8] = b"libp2p-tls-handshake:";
const LIBP2P_EXTENSION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 53594, 1, 1];
const FIELD_PUBLIC_KEY: u64 = 1;
const FIELD_SIGNATURE: u64 = 2;

fn encode_signed_key(public_key: &PublicKey, signature: &[u8]) -> Vec<u8> {
    Encoder::new()
        .field(FIELD_PUBLIC_KEY, &public_key.canonical_encode())
        .field(FIELD_SIGNATURE, signature)
        .into_bytes()
}

fn decode_signed_key(bytes: &[u8]) -> Result<(PublicKey, Vec<u8>), SecuredTransportError> {
    let fields = protobuf_lite::decode(bytes).map_err(|_| SecuredTransportError::Certificate)?;
    let key_bytes = protobuf_lite::field(&fields, FIELD_PUBLIC_KEY)
        .ok_or(SecuredTransportError::MissingIdentityExtension)?;
    let sig_bytes = protobuf_lite::field(&fields, FIELD_SIGNATURE)
        .ok_or(SecuredTransportError::MissingIdentityExtension)?;
    let key = PublicKey::from_canonical_encode(key_bytes).map_err(|_| SecuredTransportError::Certificate)?;
    Ok((key, sig_bytes.to_vec()))
}

/// A freshly minted self-signed certificate plus the ephemeral TLS/DTLS
/// key pair it was built around.
pub struct SignedCertificate {
    pub cert_der: Vec<u8>,
    pub key_pair: rcgen::KeyPair,
}

/// Build a self-signed certificate over a fresh ephemeral key, with the
/// libp2p identity extension signed by `identity`.
pub fn build_self_signed_cert(identity: &Keypair) -> Result<SignedCertificate, SecuredTransportError> {
    let key_pair = rcgen::KeyPair::generate().map_err(|_| SecuredTransportError::Certificate)?;

    let mut signed = Vec::with_capacity(SIGNING_PREFIX.len() + key_pair.public_key_der().len());
    signed.extend_from_slice(SIGNING_PREFIX);
    signed.extend_from_slice(&key_pair.public_key_der());
    let signature = identity.sign(&signed).map_err(|_| SecuredTransportError::Certificate)?;
    let extension_payload = encode_signed_key(&identity.public(), &signature);

    let mut params =
        rcgen::CertificateParams::new(Vec::<String>::new()).map_err(|_| SecuredTransportError::Certificate)?;
    params
        .custom_extensions
        .push(rcgen::CustomExtension::from_oid_content(LIBP2P_EXTENSION_OID, extension_payload));

    let cert = params.self_signed(&key_pair).map_err(|_| SecuredTransportError::Certificate)?;
    Ok(SignedCertificate { cert_der: cert.der().to_vec(), key_pair })
}

/// Parse a remote's certificate, verify the embedded signature, and
/// return the peer id it authenticates plus the certificate's own hash
/// (for WebRTC-Direct's `certhash` address component check).
pub fn verify_peer_certificate(cert_der: &[u8]) -> Result<(PeerId, Multihash), SecuredTransportError> {
    let (_, cert) =
        x509_parser::parse_x509_certificate(cert_der).map_err(|_| SecuredTransportError::Certificate)?;

    let extension_oid =
        x509_parser::prelude::Oid::from(LIBP2P_EXTENSION_OID).expect("well-formed constant OID arcs");
    let extension = cert
        .tbs_certificate
        .extensions()
        .iter()
        .find(|ext| ext.oid == extension_oid)
        .ok_or(SecuredTransportError::MissingIdentityExtension)?;

    let (identity_key, signature) = decode_signed_key(extension.value)?;
    let spki = cert.tbs_certificate.subject_pki.raw;
    let mut signed = Vec::with_capacity(SIGNING_PREFIX.len() + spki.len());
    signed.extend_from_slice(SIGNING_PREFIX);
    signed.extend_from_slice(spki);
    identity_key
        .verify(&signed, &signature)
        .map_err(|_| SecuredTransportError::HandshakeFailed)?;

    let peer_id = identity_key.derive_peer_id();
    let certhash = Multihash::sha2_256(cert_der);
    Ok((peer_id, certhash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_signed_cert_round_trips_identity() {
        let identity = Keypair::generate_ed25519().unwrap();
        let expected_peer = identity.derive_peer_id();
        let signed = build_self_signed_cert(&identity).unwrap();
        let (peer_id, _certhash) = verify_peer_certificate(&signed.cert_der).unwrap();
        assert_eq!(peer_id, expected_peer);
    }

    #[test]
    fn tampered_certificate_fails_verification() {
        let identity = Keypair::generate_ed25519().unwrap();
        let mut signed = build_self_signed_cert(&identity).unwrap();
        let last = signed.cert_der.len() - 1;
        signed.cert_der[last] ^= 0xff;
        assert!(x509_parser::parse_x509_certificate(&signed.cert_der).is_err()
            || verify_peer_certificate(&signed.cert_der).is_err());
    }
}
