// Copyright (c) 2024 Alibaba Cloud
//
// SPDX-License-Identifier: Apache-2.0
//

use serde_json::Value;

use crate::{Error, Result};

/// Parse a provider response body as JSON, classifying an unparseable body
/// as [`Error::MalformedResponse`] with the byte offset the parser stopped
/// at and the literal body text.
pub(crate) fn parse_json_body(body: &[u8]) -> Result<Value> {
    let text = String::from_utf8_lossy(body);
    serde_json::from_str(&text).map_err(|e| Error::MalformedResponse {
        offset: parse_offset(&text, &e),
        body: text.trim_end().to_string(),
    })
}

fn parse_offset(text: &str, err: &serde_json::Error) -> usize {
    let preceding: usize = text
        .split('\n')
        .take(err.line().saturating_sub(1))
        .map(|line| line.len() + 1)
        .sum();
    preceding + err.column().saturating_sub(1)
}

/// Extract a required string field from a parsed response, classifying its
/// absence as a malformed response (the body parsed, but is not the shape
/// the provider promises on success).
pub(crate) fn required_str_field<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedResponse {
            offset: 0,
            body: value.to_string(),
        })
}
