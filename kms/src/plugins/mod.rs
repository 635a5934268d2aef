// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{broker::TokenBroker, transport::Transport, Error, KeyOps, Result};

pub mod aws;
pub mod azure;
pub mod gcp;
pub mod local;

#[derive(AsRefStr, EnumString, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[strum(serialize_all = "lowercase")]
pub enum KmsProvider {
    #[strum(ascii_case_insensitive)]
    Local,

    #[strum(ascii_case_insensitive)]
    Aws,

    #[strum(ascii_case_insensitive)]
    Azure,

    #[strum(ascii_case_insensitive)]
    Gcp,
}

/// Master key coordinates, one variant per supported provider.
///
/// This is a closed set on purpose: a new provider is a new variant plus a
/// dispatch arm in [`new_key_ops`], nothing else. The serialized form is
/// tagged with the provider name and persisted inside every data-key record
/// so a record alone is enough to reconstruct the provider client that can
/// unwrap it.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum MasterKey {
    Local,

    #[serde(rename_all = "camelCase")]
    Aws {
        region: String,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Azure {
        key_vault_endpoint: String,
        key_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_version: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Gcp {
        project_id: String,
        location: String,
        key_ring: String,
        key_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
}

impl MasterKey {
    pub fn provider(&self) -> KmsProvider {
        match self {
            MasterKey::Local => KmsProvider::Local,
            MasterKey::Aws { .. } => KmsProvider::Aws,
            MasterKey::Azure { .. } => KmsProvider::Azure,
            MasterKey::Gcp { .. } => KmsProvider::Gcp,
        }
    }
}

/// Per-provider credential configuration for one client handle.
#[derive(Clone, Default, Deserialize)]
pub struct KmsCredentials {
    pub local: Option<local::LocalCredentials>,
    pub aws: Option<aws::AwsCredentials>,
    pub azure: Option<azure::AzureCredentials>,
    pub gcp: Option<gcp::GcpCredentials>,
}

fn missing(provider: KmsProvider) -> Error {
    Error::MissingCredential(provider.as_ref().to_string())
}

/// Create the [`KeyOps`] handle able to wrap/unwrap under `master_key`.
pub fn new_key_ops(
    master_key: &MasterKey,
    credentials: &KmsCredentials,
    transport: Arc<dyn Transport>,
    broker: Arc<TokenBroker>,
) -> Result<Box<dyn KeyOps>> {
    match master_key {
        MasterKey::Local => {
            let credential = credentials
                .local
                .as_ref()
                .ok_or_else(|| missing(KmsProvider::Local))?;
            Ok(Box::new(local::LocalKmsClient::new(credential)?) as Box<dyn KeyOps>)
        }
        MasterKey::Aws { .. } => {
            let credential = credentials
                .aws
                .clone()
                .ok_or_else(|| missing(KmsProvider::Aws))?;
            Ok(Box::new(aws::AwsKmsClient::new(
                master_key.clone(),
                credential,
                transport,
            )?) as Box<dyn KeyOps>)
        }
        MasterKey::Azure { .. } => {
            let credential = credentials
                .azure
                .clone()
                .ok_or_else(|| missing(KmsProvider::Azure))?;
            Ok(
                Box::new(azure::AzureKmsClient::new(
                    master_key.clone(),
                    credential,
                    transport,
                    broker,
                )?) as Box<dyn KeyOps>,
            )
        }
        MasterKey::Gcp { .. } => {
            let credential = credentials
                .gcp
                .clone()
                .ok_or_else(|| missing(KmsProvider::Gcp))?;
            Ok(Box::new(gcp::GcpKmsClient::new(
                master_key.clone(),
                credential,
                transport,
                broker,
            )?) as Box<dyn KeyOps>)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use rstest::rstest;

    use super::{new_key_ops, KmsCredentials, KmsProvider, MasterKey};
    use crate::broker::TokenBroker;
    use crate::transport::{HttpRequest, HttpResponse, Transport};
    use crate::Error;

    struct UnreachableTransport;

    #[async_trait::async_trait]
    impl Transport for UnreachableTransport {
        async fn send(&self, _request: HttpRequest) -> crate::Result<HttpResponse> {
            Err(Error::Transport("no transport in this test".into()))
        }
    }

    #[rstest]
    #[case("local", KmsProvider::Local)]
    #[case("aws", KmsProvider::Aws)]
    #[case("Azure", KmsProvider::Azure)]
    #[case("GCP", KmsProvider::Gcp)]
    fn provider_names_parse(#[case] name: &str, #[case] expected: KmsProvider) {
        assert_eq!(KmsProvider::from_str(name).unwrap(), expected);
    }

    #[test]
    fn master_key_serde_is_provider_tagged() {
        let master_key = MasterKey::Gcp {
            project_id: "mock".into(),
            location: "global".into(),
            key_ring: "mock-key-ring".into(),
            key_name: "mock-key".into(),
            endpoint: None,
        };

        let json = serde_json::to_value(&master_key).unwrap();
        assert_eq!(json["provider"], "gcp");
        assert_eq!(json["projectId"], "mock");

        let parsed: MasterKey = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, master_key);
    }

    #[test]
    fn missing_credential_is_reported_per_provider() {
        let credentials = KmsCredentials::default();
        let err = new_key_ops(
            &MasterKey::Local,
            &credentials,
            Arc::new(UnreachableTransport),
            Arc::new(TokenBroker::new()),
        )
        .unwrap_err();

        assert!(matches!(err, Error::MissingCredential(p) if p == "local"));
    }
}
