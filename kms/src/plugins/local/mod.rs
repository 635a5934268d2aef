// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Local KMS plugin.
//!
//! Wraps data keys in process under a locally configured master key, with
//! the same authenticated construction used for field values. No transport
//! and no credential broker are involved, so this is also the provider the
//! engine tests run against.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::{Error, KeyOps, Result};

/// Wrapped blobs are bound to this context so a local wrap cannot be
/// confused with field-value ciphertext.
const LOCAL_WRAP_AAD: &[u8] = b"local-kms-wrapped-data-key";

#[derive(Clone, Deserialize)]
pub struct LocalCredentials {
    /// Base64 encoded master key material, at least 64 bytes once decoded.
    pub key: String,
}

impl LocalCredentials {
    pub fn from_key_material(key_material: &[u8]) -> Self {
        Self {
            key: STANDARD.encode(key_material),
        }
    }
}

pub struct LocalKmsClient {
    key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for LocalKmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKmsClient").finish_non_exhaustive()
    }
}

impl LocalKmsClient {
    pub fn new(credential: &LocalCredentials) -> Result<Self> {
        let key = Zeroizing::new(STANDARD.decode(&credential.key).map_err(|e| {
            Error::InvalidCredential(format!("base64 decode local master key failed: {e}"))
        })?);
        if key.len() < crypto::MIN_DEK_LEN {
            return Err(Error::InvalidCredential(format!(
                "local master key must be at least {} bytes, got {}",
                crypto::MIN_DEK_LEN,
                key.len()
            )));
        }
        Ok(Self { key })
    }
}

#[async_trait]
impl KeyOps for LocalKmsClient {
    async fn wrap(&self, plaintext_key: &[u8]) -> Result<Vec<u8>> {
        crypto::encrypt(
            &self.key,
            plaintext_key,
            LOCAL_WRAP_AAD,
            crypto::EncryptionAlgorithm::Random,
        )
        .map_err(|e| Error::InvalidCredential(format!("local KMS wrap failed: {e}")))
    }

    async fn unwrap(&self, wrapped_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        crypto::decrypt(&self.key, wrapped_key, LOCAL_WRAP_AAD).map_err(|e| match e {
            crypto::CryptoError::IntegrityCheckFailed => Error::KeyMismatch(
                "wrapped key does not authenticate under the local master key".to_string(),
            ),
            other => Error::KeyMismatch(format!("illegal wrapped key material: {other}")),
        })
    }

    fn describe(&self) -> String {
        "local master key".to_string()
    }
}
