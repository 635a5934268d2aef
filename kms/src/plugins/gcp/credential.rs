// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Credentials to access GCP KMS

use serde::Deserialize;

/// Service-account credential used for the OAuth JWT-bearer grant.
#[derive(Clone, Deserialize)]
pub struct GcpCredentials {
    /// Service account email, the `iss` claim of the signed assertion.
    pub email: String,

    /// PEM encoded RSA private key of the service account.
    pub private_key: String,

    /// Override of the token endpoint, used to point the OAuth exchange at
    /// a mock server.
    #[serde(default)]
    pub token_endpoint: Option<String>,
}
