// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! APIs for DEK-based symmetric en/decryption

use aes_gcm::{aead::AeadInPlace, Aes256Gcm, Key, KeyInit, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Standard length of a generated data encryption key. The first 32 bytes key
/// AES-256-GCM, the next 32 key the deterministic nonce derivation, the last
/// 32 are reserved.
pub const DEK_LEN: usize = 96;

/// Shortest key material this crate accepts (no reserved range).
pub const MIN_DEK_LEN: usize = 64;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

const ENC_KEY_RANGE: std::ops::Range<usize> = 0..32;
const NONCE_KEY_RANGE: std::ops::Range<usize> = 32..64;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("illegal key material length {0}, expected at least {MIN_DEK_LEN} bytes")]
    IllegalKeyLength(usize),

    #[error("ciphertext shorter than nonce and tag")]
    CiphertextTooShort,

    #[error("ciphertext integrity check failed")]
    IntegrityCheckFailed,

    #[error("encrypt failed: {0}")]
    EncryptFailed(String),
}

/// Algorithm selector for field-value encryption.
///
/// The serialized names are the selector strings callers pass through the
/// public encrypt operation. Deterministic mode derives the nonce from the
/// key and plaintext, so equal inputs produce equal ciphertexts and the
/// output is equality-comparable; Random mode draws a fresh nonce per call.
#[derive(EnumString, AsRefStr, Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub enum EncryptionAlgorithm {
    #[strum(serialize = "AEAD_AES_256_GCM-Deterministic")]
    #[serde(rename = "AEAD_AES_256_GCM-Deterministic")]
    Deterministic,

    #[strum(serialize = "AEAD_AES_256_GCM-Random")]
    #[serde(rename = "AEAD_AES_256_GCM-Random")]
    Random,
}

/// Generate fresh random key material of [`DEK_LEN`] bytes.
pub fn generate_data_key() -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; DEK_LEN]);
    rand::rng().fill_bytes(&mut key);
    key
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() < MIN_DEK_LEN {
        return Err(CryptoError::IllegalKeyLength(key.len()));
    }
    Ok(())
}

fn derive_nonce(key: &[u8], aad: &[u8], plaintext: &[u8]) -> [u8; NONCE_LEN] {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&key[NONCE_KEY_RANGE])
        .expect("HMAC accepts any key length");
    mac.update(aad);
    mac.update(plaintext);
    let digest = mac.finalize().into_bytes();
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    nonce
}

/// Encrypt `plaintext` with the given key material, binding `aad` into the
/// authentication tag. Returns `nonce || ciphertext || tag`.
pub fn encrypt(
    key: &[u8],
    plaintext: &[u8],
    aad: &[u8],
    algorithm: EncryptionAlgorithm,
) -> Result<Vec<u8>> {
    check_key(key)?;

    let nonce = match algorithm {
        EncryptionAlgorithm::Deterministic => derive_nonce(key, aad, plaintext),
        EncryptionAlgorithm::Random => {
            let mut nonce = [0u8; NONCE_LEN];
            rand::rng().fill_bytes(&mut nonce);
            nonce
        }
    };

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[ENC_KEY_RANGE]));
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, &mut buffer)
        .map_err(|e| CryptoError::EncryptFailed(format!("{e:?}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + buffer.len() + TAG_LEN);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&buffer);
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Decrypt a `nonce || ciphertext || tag` payload produced by [`encrypt`].
///
/// A tag mismatch (wrong key, tampered ciphertext, tampered `aad`) fails with
/// [`CryptoError::IntegrityCheckFailed`], never with partial plaintext.
pub fn decrypt(key: &[u8], payload: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    check_key(key)?;
    if payload.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::CiphertextTooShort);
    }

    let (nonce, rest) = payload.split_at(NONCE_LEN);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[ENC_KEY_RANGE]));
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(nonce), aad, buffer.as_mut_slice(), tag.into())
        .map_err(|_| CryptoError::IntegrityCheckFailed)?;

    Ok(buffer)
}
