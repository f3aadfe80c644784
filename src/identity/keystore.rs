// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Loads or creates the node's Ed25519 identity key at
//! `data_dir/identity.key`.
//!
//! ### Key encryption format
//! If `LIBP2P_CORE_KEY_PASSPHRASE` is set, the key file is stored as:
//! `MAGIC(8) || SALT(16) || NONCE(12) || CIPHERTEXT+TAG(..)`
//! where the ciphertext is AES-256-GCM over the Ed25519 PKCS#8 bytes,
//! with the AES key derived from the passphrase via PBKDF2-HMAC-SHA256.
//! Without a passphrase the PKCS#8 bytes are written in the clear.

use ring::{
    aead,
    pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use std::{
    fs,
    io::Write,
    num::NonZeroU32,
    path::{Path, PathBuf},
};
use thiserror::Error;
use zeroize::Zeroize;

use crate::keypair::{Keypair, KeypairError};

const KEY_FILE_MAGIC: &[u8] = b"LC1KEY01";
const KEY_SALT_LEN: usize = 16;
const KEY_NONCE_LEN: usize = 12;
const PBKDF2_ITERS_DEFAULT: u32 = 100_000;

/// Identity-loading errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The key file could not be read or written.
    #[error("io error loading identity key")]
    Io,
    /// The on-disk bytes did not decode as a valid key.
    #[error("invalid key encoding")]
    Keypair(#[from] KeypairError),
    /// The key file is encrypted but no passphrase was supplied.
    #[error("missing passphrase (set LIBP2P_CORE_KEY_PASSPHRASE)")]
    MissingPassphrase,
    /// Encryption or decryption of the key file failed.
    #[error("crypto error loading identity key")]
    Crypto,
}

fn pbkdf2_iters() -> NonZeroU32 {
    let iters = std::env::var("LIBP2P_CORE_PBKDF2_ITERS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(PBKDF2_ITERS_DEFAULT)
        .clamp(10_000, 10_000_000);
    NonZeroU32::new(iters).unwrap_or_else(|| NonZeroU32::new(PBKDF2_ITERS_DEFAULT).expect("nonzero"))
}

fn passphrase() -> Option<String> {
    std::env::var("LIBP2P_CORE_KEY_PASSPHRASE")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[cfg(unix)]
fn set_private_perms_best_effort(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn set_private_perms_best_effort(_path: &Path) {}

fn atomic_write_private(path: &Path, bytes: &[u8]) -> Result<(), IdentityError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| IdentityError::Io)?;
    }
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|_| IdentityError::Io)?;
        f.write_all(bytes).map_err(|_| IdentityError::Io)?;
        let _ = f.sync_all();
    }
    set_private_perms_best_effort(&tmp);
    fs::rename(&tmp, path).map_err(|_| IdentityError::Io)?;
    set_private_perms_best_effort(path);
    Ok(())
}

fn derive_aes256gcm_key(passphrase: &[u8], salt: &[u8; KEY_SALT_LEN]) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, pbkdf2_iters(), salt, passphrase, &mut out);
    out
}

fn encrypt_pkcs8(passphrase: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, IdentityError> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; KEY_SALT_LEN];
    rng.fill(&mut salt).map_err(|_| IdentityError::Crypto)?;
    let mut nonce_bytes = [0u8; KEY_NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| IdentityError::Crypto)?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut key = derive_aes256gcm_key(passphrase, &salt);
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| IdentityError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| IdentityError::Crypto)?;
    key.zeroize();

    let mut out = Vec::with_capacity(KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN + in_out.len());
    out.extend_from_slice(KEY_FILE_MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

fn decrypt_pkcs8(passphrase: &[u8], bytes: &[u8]) -> Result<Vec<u8>, IdentityError> {
    if bytes.len() < KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN + 16 {
        return Err(IdentityError::Crypto);
    }
    let mut salt = [0u8; KEY_SALT_LEN];
    salt.copy_from_slice(&bytes[KEY_FILE_MAGIC.len()..KEY_FILE_MAGIC.len() + KEY_SALT_LEN]);
    let mut nonce_bytes = [0u8; KEY_NONCE_LEN];
    nonce_bytes.copy_from_slice(
        &bytes[KEY_FILE_MAGIC.len() + KEY_SALT_LEN..KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN],
    );
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut key = derive_aes256gcm_key(passphrase, &salt);
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| IdentityError::Crypto)?;
    let less_safe = aead::LessSafeKey::new(unbound);

    let mut in_out = bytes[KEY_FILE_MAGIC.len() + KEY_SALT_LEN + KEY_NONCE_LEN..].to_vec();
    let plain = less_safe
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| IdentityError::Crypto)?;
    key.zeroize();
    Ok(plain.to_vec())
}

/// Owns the node's persistent identity key.
pub struct Keystore {
    keypair: Keypair,
}

impl Keystore {
    /// Load `data_dir/identity.key`, or generate and persist a fresh
    /// Ed25519 key pair if it does not exist yet.
    pub fn open(data_dir: &Path) -> Result<Self, IdentityError> {
        let mut key_path = data_dir.to_path_buf();
        key_path.push("identity.key");

        if key_path.exists() {
            let bytes = fs::read(&key_path).map_err(|_| IdentityError::Io)?;
            let pkcs8 = if bytes.starts_with(KEY_FILE_MAGIC) {
                let pass = passphrase().ok_or(IdentityError::MissingPassphrase)?;
                decrypt_pkcs8(pass.as_bytes(), &bytes)?
            } else {
                bytes
            };
            let keypair = Keypair::from_ed25519_pkcs8(&pkcs8)?;
            return Ok(Self { keypair });
        }

        let rng = SystemRandom::new();
        let pkcs8 = ring::signature::Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| IdentityError::Crypto)?;
        let mut plain = pkcs8.as_ref().to_vec();
        let on_disk = if let Some(pass) = passphrase() {
            let enc = encrypt_pkcs8(pass.as_bytes(), &plain)?;
            plain.zeroize();
            enc
        } else {
            plain.clone()
        };
        atomic_write_private(&key_path, &on_disk)?;

        let keypair = Keypair::from_ed25519_pkcs8(pkcs8.as_ref())?;
        plain.zeroize();
        Ok(Self { keypair })
    }

    /// The loaded or freshly generated key pair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Take ownership of the key pair.
    pub fn into_keypair(self) -> Keypair {
        self.keypair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_reloads_an_unencrypted_key() {
        let dir = tempfile::tempdir().unwrap();
        let pubkey1 = Keystore::open(dir.path()).unwrap().keypair().public().canonical_encode();
        let pubkey2 = Keystore::open(dir.path()).unwrap().keypair().public().canonical_encode();
        assert_eq!(pubkey1, pubkey2);
    }

    #[test]
    fn key_file_has_restrictive_permissions_on_unix() {
        let dir = tempfile::tempdir().unwrap();
        let _ = Keystore::open(dir.path()).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = fs::metadata(dir.path().join("identity.key")).unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn encrypted_key_round_trips_with_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LIBP2P_CORE_KEY_PASSPHRASE", "correct horse battery staple");
        let pubkey1 = Keystore::open(dir.path()).unwrap().keypair().public().canonical_encode();
        let pubkey2 = Keystore::open(dir.path()).unwrap().keypair().public().canonical_encode();
        std::env::remove_var("LIBP2P_CORE_KEY_PASSPHRASE");
        assert_eq!(pubkey1, pubkey2);
    }

    #[test]
    fn encrypted_key_without_passphrase_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LIBP2P_CORE_KEY_PASSPHRASE", "hunter2");
        let _ = Keystore::open(dir.path()).unwrap();
        std::env::remove_var("LIBP2P_CORE_KEY_PASSPHRASE");
        assert!(matches!(Keystore::open(dir.path()), Err(IdentityError::MissingPassphrase)));
    }
}
