// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Keyvault
//!
//! Client-side envelope-encryption key management: a durable vault of data
//! encryption keys wrapped through an external KMS, a per-session cache of
//! unwrapped keys, and the encrypt/decrypt engine tying them together.

pub mod cache;
pub use cache::DekCache;

pub mod client;
pub use client::KeyVaultClient;

pub mod envelope;
pub use envelope::Envelope;

pub mod error;
pub use error::*;

pub mod record;
pub use record::{DataKeyRecord, KeyStatus};

pub mod store;
pub use store::{MemoryVaultStore, VaultStore};

pub use crypto::EncryptionAlgorithm;
pub use kms::{KmsCredentials, KmsProvider, MasterKey};
