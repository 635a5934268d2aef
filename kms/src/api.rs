// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Api definitions for KMS drivers
//!
//! Every provider plugin exposes the same two key operations:
//! - `wrap`: protect freshly generated data-key material under the master
//!   key the provider holds, returning the wrapped bytes to persist.
//! - `unwrap`: recover the plaintext data key from its wrapped form.
//!
//! A call performs exactly one remote attempt. There are no retries at this
//! layer; retry policy, if any, belongs to the caller. Failures come back as
//! the classified [`crate::Error`] and a failed call leaves no partial state
//! behind — in particular a failed `unwrap` must never yield key material.

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::Result;

#[async_trait]
pub trait KeyOps: Send + Sync + std::fmt::Debug {
    /// Encrypt `plaintext_key` under the provider's master key and return
    /// the wrapped bytes.
    async fn wrap(&self, plaintext_key: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `wrapped_key` back into plaintext key material.
    async fn unwrap(&self, wrapped_key: &[u8]) -> Result<Zeroizing<Vec<u8>>>;

    /// Human readable description of the master key this handle points at,
    /// for logs and errors.
    fn describe(&self) -> String;
}
