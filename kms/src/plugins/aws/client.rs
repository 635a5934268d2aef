// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use serde_json::{json, Value};
use zeroize::Zeroizing;

use super::sign::{RequestSigner, CONTENT_TYPE};
use super::AwsCredentials;
use crate::plugins::MasterKey;
use crate::transport::{HttpRequest, Transport};
use crate::utils::{parse_json_body, required_str_field};
use crate::{Error, KeyOps, Result};

pub struct AwsKmsClient {
    region: String,
    key_arn: String,
    endpoint: String,
    host: String,
    credential: AwsCredentials,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for AwsKmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsKmsClient")
            .field("region", &self.region)
            .field("key_arn", &self.key_arn)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AwsKmsClient {
    pub fn new(
        master_key: MasterKey,
        credential: AwsCredentials,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let MasterKey::Aws {
            region,
            key,
            endpoint,
        } = master_key
        else {
            return Err(Error::UnsupportedProvider(
                "AWS client requires an AWS master key".to_string(),
            ));
        };

        let endpoint = endpoint.unwrap_or_else(|| format!("https://kms.{region}.amazonaws.com"));
        let host = url::Url::parse(&endpoint)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_else(|| {
                Error::InvalidCredential(format!("illegal AWS KMS endpoint {endpoint}"))
            })?;

        Ok(Self {
            region,
            key_arn: key,
            endpoint,
            host,
            credential,
            transport,
        })
    }

    async fn call(&self, target: &str, body: Value) -> Result<Value> {
        let body = serde_json::to_vec(&body).expect("request body is a json object");
        let signer = RequestSigner {
            credential: &self.credential,
            region: &self.region,
            host: &self.host,
        };
        let mut headers = signer.sign(target, &body, Utc::now());
        headers.push(("Content-Type".to_string(), CONTENT_TYPE.to_string()));

        let response = self
            .transport
            .send(HttpRequest {
                url: self.endpoint.clone(),
                headers,
                body,
            })
            .await?;

        let value = parse_json_body(&response.body)?;
        if let Some(kind) = value.get("__type").and_then(Value::as_str) {
            let message = value
                .get("message")
                .or_else(|| value.get("Message"))
                .and_then(Value::as_str)
                .unwrap_or(kind)
                .to_string();
            return Err(Error::ProviderRejected {
                message,
                code: None,
            });
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
impl KeyOps for AwsKmsClient {
    async fn wrap(&self, plaintext_key: &[u8]) -> Result<Vec<u8>> {
        let body = json!({
            "KeyId": self.key_arn,
            "Plaintext": STANDARD.encode(plaintext_key),
        });
        let value = self.call("TrentService.Encrypt", body).await?;
        Self::decode_field(&value, "CiphertextBlob")
    }

    async fn unwrap(&self, wrapped_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let body = json!({ "CiphertextBlob": STANDARD.encode(wrapped_key) });
        let value = self.call("TrentService.Decrypt", body).await?;
        Self::decode_field(&value, "Plaintext").map(Zeroizing::new)
    }

    fn describe(&self) -> String {
        format!("aws {} ({})", self.key_arn, self.region)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::json;

    use super::AwsKmsClient;
    use crate::plugins::aws::AwsCredentials;
    use crate::plugins::MasterKey;
    use crate::transport::{HttpRequest, HttpResponse, Transport};
    use crate::{Error, KeyOps};

    fn mock_master_key() -> MasterKey {
        MasterKey::Aws {
            region: "us-east-1".into(),
            key: "arn:aws:kms:us-east-1:000000000000:key/mock".into(),
            endpoint: Some("https://mock.kms.invalid".into()),
        }
    }

    fn mock_credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "mock-secret".into(),
            session_token: None,
        }
    }

    enum Fault {
        None,
        Raw,
        WellFormed,
    }

    struct MockAwsKms {
        fault: Fault,
    }

    #[async_trait::async_trait]
    impl Transport for MockAwsKms {
        async fn send(&self, request: HttpRequest) -> crate::Result<HttpResponse> {
            match self.fault {
                Fault::Raw => {
                    return Ok(HttpResponse {
                        status: 500,
                        body: b"Internal Error of some sort.".to_vec(),
                    })
                }
                Fault::WellFormed => {
                    return Ok(HttpResponse {
                        status: 400,
                        body: serde_json::to_vec(&json!({
                            "__type": "AccessDeniedException",
                            "message": "The ciphertext refers to a key that does not exist",
                        }))
                        .unwrap(),
                    })
                }
                Fault::None => {}
            }

            let target = request
                .headers
                .iter()
                .find(|(name, _)| name == "x-amz-target")
                .expect("signed target header")
                .1
                .clone();
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();

            let response = if target == "TrentService.Encrypt" {
                let plaintext = STANDARD
                    .decode(body["Plaintext"].as_str().unwrap())
                    .unwrap();
                let masked: Vec<u8> = plaintext.iter().map(|b| b ^ 0xA7).collect();
                json!({ "CiphertextBlob": STANDARD.encode(masked), "KeyId": body["KeyId"] })
            } else {
                let ciphertext = STANDARD
                    .decode(body["CiphertextBlob"].as_str().unwrap())
                    .unwrap();
                let unmasked: Vec<u8> = ciphertext.iter().map(|b| b ^ 0xA7).collect();
                json!({ "Plaintext": STANDARD.encode(unmasked) })
            };

            Ok(HttpResponse {
                status: 200,
                body: serde_json::to_vec(&response).unwrap(),
            })
        }
    }

    fn client(fault: Fault) -> AwsKmsClient {
        AwsKmsClient::new(
            mock_master_key(),
            mock_credentials(),
            Arc::new(MockAwsKms { fault }),
        )
        .expect("build client")
    }

    #[tokio::test]
    async fn wrap_unwrap_roundtrip() {
        let client = client(Fault::None);
        let wrapped = client.wrap(b"data key material").await.expect("wrap");
        let unwrapped = client.unwrap(&wrapped).await.expect("unwrap");
        assert_eq!(&unwrapped[..], b"data key material");
    }

    #[tokio::test]
    async fn raw_fault_is_malformed_with_zero_offset() {
        let err = client(Fault::Raw).wrap(b"key").await.unwrap_err();
        match err {
            Error::MalformedResponse { offset, body } => {
                assert_eq!(offset, 0);
                assert_eq!(body, "Internal Error of some sort.");
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn well_formed_fault_echoes_provider_message() {
        let err = client(Fault::WellFormed).wrap(b"key").await.unwrap_err();
        match err {
            Error::ProviderRejected { message, .. } => {
                assert_eq!(
                    message,
                    "The ciphertext refers to a key that does not exist"
                );
            }
            other => panic!("expected ProviderRejected, got {other:?}"),
        }
    }
}
