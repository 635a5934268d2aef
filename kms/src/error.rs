// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Classified KMS failures.
///
/// The classification is strict and no layer above may reclassify one kind
/// as another: a body that does not parse is always [`Error::MalformedResponse`],
/// a body that parses and carries the provider's own error field is always
/// [`Error::ProviderRejected`] with the provider's literal text, and callers
/// assert on both the variant and the echoed message.
#[derive(Error, Debug)]
pub enum Error {
    /// Connectivity failure or timeout while reaching the provider endpoint.
    #[error("KMS transport error: {0}")]
    Transport(String),

    /// Response body is not the structured format the provider promises.
    #[error("failed to parse KMS response: expecting '{{': offset:{offset} of:{body}")]
    MalformedResponse { offset: usize, body: String },

    /// Well-formed provider-side refusal. `message` carries the provider's
    /// literal error text, verbatim.
    #[error("{message}")]
    ProviderRejected { message: String, code: Option<i64> },

    /// Wrapped key material did not authenticate under the configured master
    /// key.
    #[error("key material integrity check failed: {0}")]
    KeyMismatch(String),

    #[error("invalid KMS credential: {0}")]
    InvalidCredential(String),

    #[error("no credential configured for provider {0}")]
    MissingCredential(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
}
