// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Service-account OAuth exchange for GCP KMS.
//!
//! Builds an RS256-signed JWT assertion and trades it for a short-lived
//! access token. Response classification is strict: an unparseable body is
//! a malformed response (nothing may be cached from it), a parsed body with
//! an `error` field is a provider rejection echoing the provider's literal
//! error text, anything else must carry the token fields.

use chrono::{TimeDelta, Utc};
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::Credential;
use crate::plugins::KmsProvider;
use crate::transport::{HttpRequest, Transport};
use crate::utils::{parse_json_body, required_str_field};
use crate::{Error, Result};

pub(crate) const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const CLOUDKMS_SCOPE: &str = "https://www.googleapis.com/auth/cloudkms";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Serialize, Deserialize)]
struct AssertionClaims {
    scope: String,
}

fn build_assertion(credential: &super::GcpCredentials, audience: &str) -> Result<String> {
    let key_pair = RS256KeyPair::from_pem(&credential.private_key)
        .map_err(|e| Error::InvalidCredential(format!("parse GCP private key failed: {e}")))?;

    let claims = Claims::with_custom_claims(
        AssertionClaims {
            scope: CLOUDKMS_SCOPE.to_string(),
        },
        Duration::from_secs(ASSERTION_LIFETIME_SECS),
    )
    .with_issuer(&credential.email)
    .with_audience(audience);

    key_pair
        .sign(claims)
        .map_err(|e| Error::InvalidCredential(format!("sign GCP OAuth assertion failed: {e}")))
}

/// Exchange a signed assertion for an access token.
pub(crate) async fn fetch_token(
    transport: &dyn Transport,
    credential: &super::GcpCredentials,
) -> Result<Credential> {
    let endpoint = credential
        .token_endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string());
    let assertion = build_assertion(credential, &endpoint)?;

    let body: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", JWT_BEARER_GRANT)
        .append_pair("assertion", &assertion)
        .finish();

    let response = transport
        .send(HttpRequest {
            url: endpoint,
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
            message: format!("GCP OAuth Error : {literal}"),
            code: None,
        });
    }

    let access_token = required_str_field(&value, "access_token")?.to_string();
    let expires_in = value
        .get("expires_in")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_TOKEN_TTL_SECS);

    Ok(Credential {
        provider: KmsProvider::Gcp,
        access_token,
        expires_at: Utc::now() + TimeDelta::seconds(expires_in),
    })
}
