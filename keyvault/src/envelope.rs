// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

//! Binary ciphertext envelope.
//!
//! Layout: `[version:1][dek id:16][algorithm:1][aead payload]`. The header
//! triple is also the associated data of the AEAD payload, so any header
//! tampering fails the integrity check even though the header itself is not
//! encrypted.

use crypto::EncryptionAlgorithm;
use uuid::Uuid;

use crate::{Error, Result};

pub const ENVELOPE_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 18;

const DETERMINISTIC_TAG: u8 = 1;
const RANDOM_TAG: u8 = 2;

fn algorithm_tag(algorithm: EncryptionAlgorithm) -> u8 {
    match algorithm {
        EncryptionAlgorithm::Deterministic => DETERMINISTIC_TAG,
        EncryptionAlgorithm::Random => RANDOM_TAG,
    }
}

fn algorithm_from_tag(tag: u8) -> Result<EncryptionAlgorithm> {
    match tag {
        DETERMINISTIC_TAG => Ok(EncryptionAlgorithm::Deterministic),
        RANDOM_TAG => Ok(EncryptionAlgorithm::Random),
        _ => Err(Error::MalformedCiphertext("unrecognized algorithm tag")),
    }
}

#[derive(Debug, PartialEq)]
pub struct Envelope {
    pub dek_id: Uuid,
    pub algorithm: EncryptionAlgorithm,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn header(dek_id: Uuid, algorithm: EncryptionAlgorithm) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0] = ENVELOPE_VERSION;
        header[1..17].copy_from_slice(dek_id.as_bytes());
        header[17] = algorithm_tag(algorithm);
        header
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let header = Self::header(self.dek_id, self.algorithm);
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::MalformedCiphertext(
                "ciphertext shorter than envelope header",
            ));
        }
        if bytes[0] != ENVELOPE_VERSION {
            return Err(Error::MalformedCiphertext("unsupported envelope version"));
        }

        let dek_id = Uuid::from_slice(&bytes[1..17])
            .map_err(|_| Error::MalformedCiphertext("illegal data key id"))?;
        let algorithm = algorithm_from_tag(bytes[17])?;

        Ok(Self {
            dek_id,
            algorithm,
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crypto::EncryptionAlgorithm;
    use rstest::rstest;
    use uuid::Uuid;

    use super::{Envelope, ENVELOPE_VERSION, HEADER_LEN};
    use crate::Error;

    #[rstest]
    #[case(EncryptionAlgorithm::Deterministic)]
    #[case(EncryptionAlgorithm::Random)]
    fn roundtrip(#[case] algorithm: EncryptionAlgorithm) {
        let envelope = Envelope {
            dek_id: Uuid::new_v4(),
            algorithm,
            payload: vec![9; 40],
        };
        let parsed = Envelope::parse(&envelope.to_bytes()).expect("parse");
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn short_input_is_malformed() {
        let err = Envelope::parse(&[ENVELOPE_VERSION; HEADER_LEN - 1]).unwrap_err();
        assert!(matches!(err, Error::MalformedCiphertext(_)));
    }

    #[test]
    fn wrong_version_is_malformed() {
        let envelope = Envelope {
            dek_id: Uuid::new_v4(),
            algorithm: EncryptionAlgorithm::Random,
            payload: vec![0; 32],
        };
        let mut bytes = envelope.to_bytes();
        bytes[0] = 9;
        assert!(matches!(
            Envelope::parse(&bytes).unwrap_err(),
            Error::MalformedCiphertext("unsupported envelope version")
        ));
    }

    #[test]
    fn unknown_algorithm_tag_is_malformed() {
        let envelope = Envelope {
            dek_id: Uuid::new_v4(),
            algorithm: EncryptionAlgorithm::Random,
            payload: vec![0; 32],
        };
        let mut bytes = envelope.to_bytes();
        bytes[17] = 0xFF;
        assert!(matches!(
            Envelope::parse(&bytes).unwrap_err(),
            Error::MalformedCiphertext("unrecognized algorithm tag")
        ));
    }
}
