// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Azure Key Vault plugin.
//!
//! Key operations call the vault's `wrapkey`/`unwrapkey` REST operations,
//! authenticated with a client-credentials OAuth token.

mod client;
mod credential;
mod oauth;

pub use client::AzureKmsClient;
pub use credential::AzureCredentials;
