// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Credentials to access Azure Key Vault

use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,

    /// Override of the identity-platform endpoint, used to point the OAuth
    /// exchange at a mock server.
    #[serde(default)]
    pub authority: Option<String>,
}
