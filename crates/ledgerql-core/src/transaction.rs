//! Transaction response normalization.
//!
//! `getTransaction` returns the transaction body either as a
//! `[data, encoding]` pair (raw encodings) or as a structured object (`json`
//! and `jsonParsed`). The normalized [`TransactionResult`] records which one
//! it got in an explicit `format`, and stamps that format onto `meta` and
//! `transaction.message` so consumers never have to infer it from shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::{Slot, TransactionEncoding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionFormat {
    Parsed,
    Unparsed,
}

impl TransactionFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Unparsed => "unparsed",
        }
    }
}

/// The transaction body: an encoded string or a structured object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TransactionData {
    Encoded(String),
    Structured(Value),
}

impl TransactionData {
    pub fn message(&self) -> Option<&Value> {
        match self {
            Self::Encoded(_) => None,
            Self::Structured(value) => value.get("message"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    /// Encoding of `transaction`. Differs from the requested one when a
    /// `jsonParsed` request came back in the legacy pair form.
    pub encoding: TransactionEncoding,
    pub format: TransactionFormat,
    pub transaction: TransactionData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Any remaining top-level fields, passed through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Normalize a non-null `getTransaction` result requested with `encoding`.
pub fn normalize_transaction(
    encoding: TransactionEncoding,
    raw: Value,
) -> Result<TransactionResult, CoreError> {
    let mut obj = match raw {
        Value::Object(obj) => obj,
        other => {
            return Err(CoreError::InvalidResponse(format!(
                "transaction response must be an object, got: {other}"
            )));
        }
    };

    let body = obj
        .remove("transaction")
        .ok_or_else(|| CoreError::InvalidResponse("missing transaction body".into()))?;

    let (mut data, response_encoding, format) = match body {
        Value::Array(mut pair) => {
            if pair.is_empty() {
                return Err(CoreError::InvalidResponse(
                    "empty transaction data pair".into(),
                ));
            }
            let response_encoding = if encoding == TransactionEncoding::JsonParsed {
                TransactionEncoding::Base64
            } else {
                encoding
            };
            let data = match pair.swap_remove(0) {
                Value::String(s) => TransactionData::Encoded(s),
                other => TransactionData::Structured(other),
            };
            (data, response_encoding, TransactionFormat::Unparsed)
        }
        other => {
            let format = if encoding == TransactionEncoding::JsonParsed {
                TransactionFormat::Parsed
            } else {
                TransactionFormat::Unparsed
            };
            (TransactionData::Structured(other), encoding, format)
        }
    };

    if let TransactionData::Structured(Value::Object(tx)) = &mut data {
        if let Some(Value::Object(message)) = tx.get_mut("message") {
            message.insert("format".into(), format.as_str().into());
        }
    }

    let mut meta = obj.remove("meta").filter(|m| !m.is_null());
    if let Some(Value::Object(meta)) = &mut meta {
        meta.insert("format".into(), format.as_str().into());
    }

    let slot = obj.remove("slot").and_then(|v| v.as_u64()).map(Slot);
    let block_time = obj.remove("blockTime").and_then(|v| v.as_i64());
    let version = obj.remove("version").filter(|v| !v.is_null());

    Ok(TransactionResult {
        slot,
        block_time,
        version,
        encoding: response_encoding,
        format,
        transaction: data,
        meta,
        extra: obj,
    })
}
