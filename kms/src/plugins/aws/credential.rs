// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Credentials to access AWS KMS

use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,

    /// Present when the credential comes from an assumed role.
    #[serde(default)]
    pub session_token: Option<String>,
}
