// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Classified KMS failure, passed through unchanged so callers can match
    /// on the exact kind and on the provider's literal message.
    #[error(transparent)]
    Kms(#[from] kms::Error),

    #[error("data key {0} not found in the key vault")]
    KeyNotFound(Uuid),

    #[error("data key {0} is disabled")]
    KeyDisabled(Uuid),

    #[error("key alternate name {0:?} is already in use")]
    DuplicateKeyAltName(String),

    #[error("malformed ciphertext envelope: {0}")]
    MalformedCiphertext(&'static str),

    /// The cipher's integrity check rejected the payload: wrong or rotated
    /// data key, or a tampered ciphertext.
    #[error("ciphertext integrity check failed")]
    IntegrityFailure,

    #[error("unrecognized encryption algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("crypto operation failed: {0}")]
    Crypto(String),

    #[error("key vault store error: {0}")]
    Store(String),
}

impl From<crypto::CryptoError> for Error {
    fn from(e: crypto::CryptoError) -> Self {
        match e {
            crypto::CryptoError::IntegrityCheckFailed => Error::IntegrityFailure,
            other => Error::Crypto(other.to_string()),
        }
    }
}
