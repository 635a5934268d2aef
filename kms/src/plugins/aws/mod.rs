// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! AWS KMS plugin.
//!
//! Key operations are JSON posts against the KMS endpoint with the
//! `X-Amz-Target` header selecting the operation; requests are signed with
//! the static access-key credential, so this plugin needs no token broker.

mod client;
mod credential;
mod sign;

pub use client::AwsKmsClient;
pub use credential::AwsCredentials;
