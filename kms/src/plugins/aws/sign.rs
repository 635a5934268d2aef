// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! SigV4 request signing for the KMS service.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::AwsCredentials;

pub(crate) const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "kms";

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac =
        <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub(crate) struct RequestSigner<'a> {
    pub credential: &'a AwsCredentials,
    pub region: &'a str,
    pub host: &'a str,
}

impl RequestSigner<'_> {
    /// Produce the full signed header set for a `POST /` of `body` with the
    /// given `X-Amz-Target`.
    pub(crate) fn sign(
        &self,
        target: &str,
        body: &[u8],
        at: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = at.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(body));

        let mut headers = vec![
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("host".to_string(), self.host.to_string()),
            ("x-amz-date".to_string(), amz_date.clone()),
            ("x-amz-target".to_string(), target.to_string()),
        ];
        if let Some(token) = &self.credential.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        // Canonicalization requires the signed headers in byte order.
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{}\n", value.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_request =
            format!("POST\n/\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}");

        let scope = format!("{datestamp}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let secret = format!("AWS4{}", self.credential.secret_access_key);
        let mut signing_key = hmac_sha256(secret.as_bytes(), datestamp.as_bytes());
        signing_key = hmac_sha256(&signing_key, self.region.as_bytes());
        signing_key = hmac_sha256(&signing_key, SERVICE.as_bytes());
        signing_key = hmac_sha256(&signing_key, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        headers.push((
            "Authorization".to_string(),
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credential.access_key_id
            ),
        ));
        headers
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{RequestSigner, CONTENT_TYPE};
    use crate::plugins::aws::AwsCredentials;

    fn credential(session_token: Option<&str>) -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
            session_token: session_token.map(str::to_string),
        }
    }

    fn signature_of(headers: &[(String, String)]) -> String {
        let authorization = &headers
            .iter()
            .find(|(name, _)| name == "Authorization")
            .expect("Authorization header")
            .1;
        authorization
            .split("Signature=")
            .nth(1)
            .expect("signature component")
            .to_string()
    }

    #[test]
    fn signed_headers_cover_the_request() {
        let credential = credential(None);
        let signer = RequestSigner {
            credential: &credential,
            region: "us-east-1",
            host: "kms.us-east-1.amazonaws.com",
        };
        let at = Utc.with_ymd_and_hms(2021, 5, 6, 12, 0, 0).unwrap();
        let headers = signer.sign("TrentService.Encrypt", b"{}", at);

        let authorization = &headers
            .iter()
            .find(|(name, _)| name == "Authorization")
            .unwrap()
            .1;
        assert!(authorization
            .contains("Credential=AKIDEXAMPLE/20210506/us-east-1/kms/aws4_request"));
        assert!(authorization.contains("SignedHeaders=content-type;host;x-amz-date;x-amz-target"));

        assert!(headers
            .iter()
            .any(|(name, value)| name == "x-amz-date" && value == "20210506T120000Z"));
        assert!(headers
            .iter()
            .any(|(name, value)| name == "content-type" && value == CONTENT_TYPE));
    }

    #[test]
    fn session_token_is_signed_in_order() {
        let credential = credential(Some("session-token"));
        let signer = RequestSigner {
            credential: &credential,
            region: "us-east-1",
            host: "kms.us-east-1.amazonaws.com",
        };
        let at = Utc.with_ymd_and_hms(2021, 5, 6, 12, 0, 0).unwrap();
        let headers = signer.sign("TrentService.Decrypt", b"{}", at);

        let authorization = &headers
            .iter()
            .find(|(name, _)| name == "Authorization")
            .unwrap()
            .1;
        assert!(authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token;x-amz-target"
        ));
    }

    #[test]
    fn signature_is_deterministic_and_keyed() {
        let at = Utc.with_ymd_and_hms(2021, 5, 6, 12, 0, 0).unwrap();
        let credential_a = credential(None);
        let signer = RequestSigner {
            credential: &credential_a,
            region: "us-east-1",
            host: "kms.us-east-1.amazonaws.com",
        };
        let first = signature_of(&signer.sign("TrentService.Encrypt", b"{\"KeyId\":\"k\"}", at));
        let second = signature_of(&signer.sign("TrentService.Encrypt", b"{\"KeyId\":\"k\"}", at));
        assert_eq!(first, second);

        let credential_b = AwsCredentials {
            secret_access_key: "another-secret".into(),
            ..credential(None)
        };
        let other_signer = RequestSigner {
            credential: &credential_b,
            region: "us-east-1",
            host: "kms.us-east-1.amazonaws.com",
        };
        let third =
            signature_of(&other_signer.sign("TrentService.Encrypt", b"{\"KeyId\":\"k\"}", at));
        assert_ne!(first, third);
    }
}
