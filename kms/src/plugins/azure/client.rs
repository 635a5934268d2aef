// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};
use zeroize::Zeroizing;

use super::{oauth, AzureCredentials};
use crate::broker::TokenBroker;
use crate::plugins::{KmsProvider, MasterKey};
use crate::transport::{HttpRequest, Transport};
use crate::utils::{parse_json_body, required_str_field};
use crate::{Error, KeyOps, Result};

const API_VERSION: &str = "7.1";
const WRAP_ALGORITHM: &str = "RSA-OAEP-256";

pub struct AzureKmsClient {
    key_vault_endpoint: String,
    key_name: String,
    key_version: Option<String>,
    credential: AzureCredentials,
    transport: Arc<dyn Transport>,
    broker: Arc<TokenBroker>,
}

impl std::fmt::Debug for AzureKmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureKmsClient")
            .field("key_vault_endpoint", &self.key_vault_endpoint)
            .field("key_name", &self.key_name)
            .field("key_version", &self.key_version)
            .finish_non_exhaustive()
    }
}

impl AzureKmsClient {
    pub fn new(
        master_key: MasterKey,
        credential: AzureCredentials,
        transport: Arc<dyn Transport>,
        broker: Arc<TokenBroker>,
    ) -> Result<Self> {
        let MasterKey::Azure {
            key_vault_endpoint,
            key_name,
            key_version,
        } = master_key
        else {
            return Err(Error::UnsupportedProvider(
                "Azure client requires an Azure master key".to_string(),
            ));
        };

        Ok(Self {
            key_vault_endpoint: key_vault_endpoint.trim_end_matches('/').to_string(),
            key_name,
            key_version,
            credential,
            transport,
            broker,
        })
    }

    fn operation_url(&self, operation: &str) -> String {
        match &self.key_version {
            Some(version) => format!(
                "{}/keys/{}/{version}/{operation}?api-version={API_VERSION}",
                self.key_vault_endpoint, self.key_name
            ),
            None => format!(
                "{}/keys/{}/{operation}?api-version={API_VERSION}",
                self.key_vault_endpoint, self.key_name
            ),
        }
    }

    async fn call(&self, operation: &str, data: &[u8]) -> Result<Vec<u8>> {
        let credential = self
            .broker
            .acquire(KmsProvider::Azure, || {
                oauth::fetch_token(self.transport.as_ref(), &self.credential)
            })
            .await?;

        let body = json!({
            "alg": WRAP_ALGORITHM,
            "value": URL_SAFE_NO_PAD.encode(data),
        });
        let response = self
            .transport
            .send(HttpRequest {
                url: self.operation_url(operation),
                headers: vec![
                    (
                        "Authorization".to_string(),
                        format!("Bearer {}", credential.access_token),
                    ),
                    ("Content-Type".to_string(), "application/json".to_string()),
                ],
                body: serde_json::to_vec(&body).expect("request body is a json object"),
            })
            .await?;

        let value = parse_json_body(&response.body)?;
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(Error::ProviderRejected {
                message,
                code: None,
            });
        }

        let encoded = required_str_field(&value, "value")?;
        URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| Error::MalformedResponse {
                offset: 0,
                body: value.to_string(),
            })
    }
}

#[async_trait]
impl KeyOps for AzureKmsClient {
    async fn wrap(&self, plaintext_key: &[u8]) -> Result<Vec<u8>> {
        self.call("wrapkey", plaintext_key).await
    }

    async fn unwrap(&self, wrapped_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.call("unwrapkey", wrapped_key).await.map(Zeroizing::new)
    }

    fn describe(&self) -> String {
        format!("azure {}/keys/{}", self.key_vault_endpoint, self.key_name)
    }
}
