// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Crypto
//!
//! This crate encapsulates the authenticated-encryption primitive used to
//! protect field values with a data encryption key (DEK), and to wrap DEKs
//! under a local master key. The construction is AES-256-GCM; the nonce is
//! either drawn from the system RNG or derived deterministically from the
//! plaintext, selected per [`EncryptionAlgorithm`].

#[macro_use]
extern crate strum;

mod symmetric;
pub use symmetric::*;
