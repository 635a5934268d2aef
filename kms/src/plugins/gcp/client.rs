// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::error;
use serde_json::{json, Value};
use zeroize::Zeroizing;

use super::{oauth, GcpCredentials};
use crate::broker::TokenBroker;
use crate::plugins::{KmsProvider, MasterKey};
use crate::transport::{HttpRequest, Transport};
use crate::utils::{parse_json_body, required_str_field};
use crate::{Error, KeyOps, Result};

const DEFAULT_ENDPOINT: &str = "https://cloudkms.googleapis.com";

pub struct GcpKmsClient {
    project_id: String,
    location: String,
    key_ring: String,
    key_name: String,
    endpoint: String,
    credential: GcpCredentials,
    transport: Arc<dyn Transport>,
    broker: Arc<TokenBroker>,
}

impl std::fmt::Debug for GcpKmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpKmsClient")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("key_ring", &self.key_ring)
            .field("key_name", &self.key_name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GcpKmsClient {
    pub fn new(
        master_key: MasterKey,
        credential: GcpCredentials,
        transport: Arc<dyn Transport>,
        broker: Arc<TokenBroker>,
    ) -> Result<Self> {
        let MasterKey::Gcp {
            project_id,
            location,
            key_ring,
            key_name,
            endpoint,
        } = master_key
        else {
            return Err(Error::UnsupportedProvider(
                "GCP client requires a GCP master key".to_string(),
            ));
        };

        Ok(Self {
            project_id,
            location,
            key_ring,
            key_name,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            credential,
            transport,
            broker,
        })
    }

    fn key_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            self.project_id, self.location, self.key_ring, self.key_name
        )
    }

    async fn call(&self, action: &str, body: Value) -> Result<Value> {
        let credential = self
            .broker
            .acquire(KmsProvider::Gcp, || {
                oauth::fetch_token(self.transport.as_ref(), &self.credential)
            })
            .await?;

        let request = HttpRequest {
            url: format!("{}/v1/{}:{action}", self.endpoint, self.key_path()),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", credential.access_token),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body: serde_json::to_vec(&body).expect("request body is a json object"),
        };

        let response = self.transport.send(request).await?;
        let value = parse_json_body(&response.body)?;
        if let Some(rejection) = value.get("error") {
            error!("gcp kms: {action} request rejected by provider");
            let message = rejection
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| rejection.to_string());
            let code = rejection.get("code").and_then(Value::as_i64);
            return Err(Error::ProviderRejected { message, code });
        }

        Ok(value)
    }

    fn decode_field(value: &Value, field: &str) -> Result<Vec<u8>> {
        let encoded = required_str_field(value, field)?;
        STANDARD
            .decode(encoded)
            .map_err(|_| Error::MalformedResponse {
                offset: 0,
                body: value.to_string(),
            })
    }
}

#[async_trait]
impl KeyOps for GcpKmsClient {
    async fn wrap(&self, plaintext_key: &[u8]) -> Result<Vec<u8>> {
        let body = json!({ "plaintext": STANDARD.encode(plaintext_key) });
        let value = self.call("encrypt", body).await?;
        Self::decode_field(&value, "ciphertext")
    }

    async fn unwrap(&self, wrapped_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let body = json!({ "ciphertext": STANDARD.encode(wrapped_key) });
        let value = self.call("decrypt", body).await?;
        Self::decode_field(&value, "plaintext").map(Zeroizing::new)
    }

    fn describe(&self) -> String {
        format!("gcp {}", self.key_path())
    }
}
