// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! HTTP transport used by the provider plugins.
//!
//! All provider operations are a single POST of an opaque body. The trait
//! carries no provider knowledge so tests can substitute an in-memory
//! implementation; only connectivity-level failures are classified here
//! ([`Error::Transport`]) while response bodies flow back unclassified for
//! the plugin codecs to interpret. HTTP status codes are delivered as data,
//! not errors, since providers put their structured refusals in error-status
//! bodies.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `request.body` to `request.url` and hand back whatever the
    /// endpoint answered. Exactly one round trip per call, no retries.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The production [`Transport`] backed by a reqwest client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("build http client failed: {e}")))?;
        Ok(Self { client })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT).expect("default reqwest client")
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut req = self.client.post(&request.url).body(request.body);
        for (name, value) in &request.headers {
            req = req.header(name, value);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request to {} failed: {e}", request.url)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("read response body failed: {e}")))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}
