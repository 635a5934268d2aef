// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Client-credentials OAuth exchange for Azure Key Vault.

use chrono::{TimeDelta, Utc};
use serde_json::Value;

use crate::broker::Credential;
use crate::plugins::KmsProvider;
use crate::transport::{HttpRequest, Transport};
use crate::utils::{parse_json_body, required_str_field};
use crate::{Error, Result};

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

pub(crate) async fn fetch_token(
    transport: &dyn Transport,
    credential: &super::AzureCredentials,
) -> Result<Credential> {
    let authority = credential
        .authority
        .clone()
        .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string());
    let url = format!("{authority}/{}/oauth2/v2.0/token", credential.tenant_id);

    let body: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "client_credentials")
        .append_pair("client_id", &credential.client_id)
        .append_pair("client_secret", &credential.client_secret)
        .append_pair("scope", VAULT_SCOPE)
        .finish();

    let response = transport
        .send(HttpRequest {
            url,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: body.into_bytes(),
        })
        .await?;

    let value = parse_json_body(&response.body)?;
    if let Some(error) = value.get("error") {
        let literal = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(Error::ProviderRejected {
            message: format!("Azure OAuth Error : {literal}"),
            code: None,
        });
    }

    let access_token = required_str_field(&value, "access_token")?.to_string();
    let expires_in = value
        .get("expires_in")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_TOKEN_TTL_SECS);

    Ok(Credential {
        provider: KmsProvider::Azure,
        access_token,
        expires_at: Utc::now() + TimeDelta::seconds(expires_in),
    })
}
