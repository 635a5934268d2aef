// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! GCP KMS plugin.
//!
//! Key operations run against the Cloud KMS REST surface
//! (`projects/{p}/locations/{l}/keyRings/{r}/cryptoKeys/{k}:encrypt|:decrypt`),
//! authenticated with a service-account OAuth token obtained through the
//! JWT-bearer grant.

mod client;
mod credential;
mod oauth;

pub use client::GcpKmsClient;
pub use credential::GcpCredentials;
