//! Shared domain types for LedgerQL's query model.
//!
//! Contains the ledger identifiers (`Address`, `Signature`, `Slot`), the
//! wire enums accepted by the node (commitment levels and encodings), the
//! per-entity query argument structs, and [`QueryConfig`], the normalized
//! non-identity arguments used both as RPC params and as cache key material.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn is_base58(s: &str) -> bool {
    s.chars().all(|c| BASE58_ALPHABET.contains(c))
}

// ==============================================================================
// Identifiers
// ==============================================================================

/// A base58-encoded 32-byte account address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !(32..=44).contains(&s.len()) || !is_base58(s) {
            return Err(CoreError::InvalidArgument(format!("invalid address `{s}`")));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A base58-encoded 64-byte transaction signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(String);

impl Signature {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !(64..=88).contains(&s.len()) || !is_base58(s) {
            return Err(CoreError::InvalidArgument(format!("invalid signature `{s}`")));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Signature {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Signature> for String {
    fn from(signature: Signature) -> Self {
        signature.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ledger slot, wrapped for type safety.
///
/// `#[serde(transparent)]` keeps the JSON representation a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub u64);

impl From<u64> for Slot {
    fn from(slot: u64) -> Self {
        Self(slot)
    }
}

impl std::ops::Deref for Slot {
    type Target = u64;
    fn deref(&self) -> &u64 {
        &self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Wire Enums
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountEncoding {
    #[serde(rename = "base58")]
    Base58,
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "base64+zstd")]
    Base64Zstd,
    #[default]
    #[serde(rename = "jsonParsed")]
    JsonParsed,
}

impl AccountEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base58 => "base58",
            Self::Base64 => "base64",
            Self::Base64Zstd => "base64+zstd",
            Self::JsonParsed => "jsonParsed",
        }
    }
}

impl fmt::Display for AccountEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionEncoding {
    Base58,
    Base64,
    Json,
    #[default]
    JsonParsed,
}

impl TransactionEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base58 => "base58",
            Self::Base64 => "base64",
            Self::Json => "json",
            Self::JsonParsed => "jsonParsed",
        }
    }
}

impl fmt::Display for TransactionEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockEncoding {
    Base58,
    Base64,
    #[default]
    JsonParsed,
}

impl BlockEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base58 => "base58",
            Self::Base64 => "base64",
            Self::JsonParsed => "jsonParsed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionDetails {
    Accounts,
    Full,
    None,
    Signatures,
}

impl TransactionDetails {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::Full => "full",
            Self::None => "none",
            Self::Signatures => "signatures",
        }
    }
}

/// Restricts returned account data to `length` bytes starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSlice {
    pub offset: u64,
    pub length: u64,
}

impl DataSlice {
    fn to_json(self) -> Value {
        serde_json::json!({ "offset": self.offset, "length": self.length })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemcmpEncoding {
    Base58,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemcmpFilter {
    pub offset: u64,
    pub bytes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<MemcmpEncoding>,
}

/// A `getProgramAccounts` filter: `{"dataSize": n}` or `{"memcmp": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgramAccountsFilter {
    DataSize(u64),
    Memcmp(MemcmpFilter),
}

impl ProgramAccountsFilter {
    fn to_json(&self) -> Value {
        match self {
            Self::DataSize(size) => serde_json::json!({ "dataSize": size }),
            Self::Memcmp(memcmp) => {
                let mut inner = serde_json::json!({
                    "offset": memcmp.offset,
                    "bytes": memcmp.bytes,
                });
                if let Some(encoding) = memcmp.encoding {
                    inner["encoding"] = match encoding {
                        MemcmpEncoding::Base58 => "base58".into(),
                        MemcmpEncoding::Base64 => "base64".into(),
                    };
                }
                serde_json::json!({ "memcmp": inner })
            }
        }
    }
}

// ==============================================================================
// Query Config
// ==============================================================================

/// The non-identity arguments of a query (encoding, commitment, dataSlice,
/// minContextSlot, ...).
///
/// Keys are held in a sorted map, so two configs built from the same pairs in
/// any order compare equal and produce the same [`QueryConfig::canonical`]
/// form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConfig(BTreeMap<String, Value>);

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. `null` values are dropped so that an explicit null and
    /// an absent field normalize to the same config.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        let key = key.into();
        if value.is_null() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value);
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy containing only the listed keys.
    pub fn project(&self, keys: &[&str]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// The config as a JSON object, ready to be sent as an RPC parameter.
    pub fn to_param(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }

    /// Deterministic textual form with object keys sorted at every depth.
    /// Used as cache key material.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        out.push('{');
        for (idx, (key, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            write_canonical_str(key, &mut out);
            out.push(':');
            write_canonical(value, &mut out);
        }
        out.push('}');
        out
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for QueryConfig {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut config = Self::new();
        for (key, value) in iter {
            config.insert(key, value);
        }
        config
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical_str(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn write_canonical_str(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_owned()).to_string());
}

// ==============================================================================
// Query Arguments
// ==============================================================================

/// Arguments of the `account` query field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<Commitment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_slice: Option<DataSlice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<AccountEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_context_slot: Option<Slot>,
}

impl AccountQuery {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            commitment: None,
            data_slice: None,
            encoding: None,
            min_context_slot: None,
        }
    }

    pub fn with_encoding(mut self, encoding: AccountEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = Some(commitment);
        self
    }

    pub fn encoding(&self) -> AccountEncoding {
        self.encoding.unwrap_or_default()
    }

    /// Same configuration arguments, different target. Nested address fields
    /// resolve through this so the parent's commitment/encoding propagate.
    pub fn for_address(&self, address: Address) -> Self {
        Self {
            address,
            ..self.clone()
        }
    }

    /// Request config with `encoding` defaulted to `jsonParsed`.
    pub fn request_config(&self) -> QueryConfig {
        account_config(
            self.encoding(),
            self.commitment,
            self.data_slice,
            self.min_context_slot,
        )
    }
}

fn account_config(
    encoding: AccountEncoding,
    commitment: Option<Commitment>,
    data_slice: Option<DataSlice>,
    min_context_slot: Option<Slot>,
) -> QueryConfig {
    let mut config = QueryConfig::new().with("encoding", encoding.as_str());
    if let Some(commitment) = commitment {
        config.insert("commitment", commitment.as_str());
    }
    if let Some(data_slice) = data_slice {
        config.insert("dataSlice", data_slice.to_json());
    }
    if let Some(slot) = min_context_slot {
        config.insert("minContextSlot", slot.0);
    }
    config
}

/// Arguments of the `programAccounts` query field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramAccountsQuery {
    pub program_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<Commitment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_slice: Option<DataSlice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<AccountEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<ProgramAccountsFilter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_context_slot: Option<Slot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_context: Option<bool>,
}

impl ProgramAccountsQuery {
    pub fn new(program_address: Address) -> Self {
        Self {
            program_address,
            commitment: None,
            data_slice: None,
            encoding: None,
            filters: None,
            min_context_slot: None,
            with_context: None,
        }
    }

    pub fn encoding(&self) -> AccountEncoding {
        self.encoding.unwrap_or_default()
    }

    pub fn request_config(&self) -> QueryConfig {
        let mut config = account_config(
            self.encoding(),
            self.commitment,
            self.data_slice,
            self.min_context_slot,
        );
        if let Some(filters) = &self.filters {
            config.insert(
                "filters",
                Value::Array(filters.iter().map(ProgramAccountsFilter::to_json).collect()),
            );
        }
        if let Some(with_context) = self.with_context {
            config.insert("withContext", with_context);
        }
        config
    }

    /// The single-account query equivalent to one element of this listing.
    pub fn account_query(&self, address: Address) -> AccountQuery {
        AccountQuery {
            address,
            commitment: self.commitment,
            data_slice: self.data_slice,
            encoding: self.encoding,
            min_context_slot: self.min_context_slot,
        }
    }
}

/// Arguments of the `block` query field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockQuery {
    pub slot: Slot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<Commitment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<BlockEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_supported_transaction_version: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_details: Option<TransactionDetails>,
}

impl BlockQuery {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            commitment: None,
            encoding: None,
            max_supported_transaction_version: None,
            rewards: None,
            transaction_details: None,
        }
    }

    pub fn request_config(&self) -> QueryConfig {
        let mut config =
            QueryConfig::new().with("encoding", self.encoding.unwrap_or_default().as_str());
        if let Some(commitment) = self.commitment {
            config.insert("commitment", commitment.as_str());
        }
        if let Some(version) = self.max_supported_transaction_version {
            config.insert("maxSupportedTransactionVersion", version);
        }
        if let Some(rewards) = self.rewards {
            config.insert("rewards", rewards);
        }
        if let Some(details) = self.transaction_details {
            config.insert("transactionDetails", details.as_str());
        }
        config
    }
}

/// Arguments of the `transaction` query field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub signature: Signature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<Commitment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<TransactionEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_supported_transaction_version: Option<u8>,
}

impl TransactionQuery {
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            commitment: None,
            encoding: None,
            max_supported_transaction_version: None,
        }
    }

    pub fn encoding(&self) -> TransactionEncoding {
        self.encoding.unwrap_or_default()
    }

    pub fn request_config(&self) -> QueryConfig {
        let mut config = QueryConfig::new().with("encoding", self.encoding().as_str());
        if let Some(commitment) = self.commitment {
            config.insert("commitment", commitment.as_str());
        }
        if let Some(version) = self.max_supported_transaction_version {
            config.insert("maxSupportedTransactionVersion", version);
        }
        config
    }
}

// ==============================================================================
// Block
// ==============================================================================

/// A block as returned by `getBlock`. Passed through without normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(pub Value);

impl Block {
    pub fn blockhash(&self) -> Option<&str> {
        self.0.get("blockhash").and_then(Value::as_str)
    }

    pub fn parent_slot(&self) -> Option<Slot> {
        self.0.get("parentSlot").and_then(Value::as_u64).map(Slot)
    }

    pub fn block_height(&self) -> Option<u64> {
        self.0.get("blockHeight").and_then(Value::as_u64)
    }

    pub fn transaction_count(&self) -> usize {
        self.0
            .get("transactions")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_config_is_order_insensitive() {
        let a = QueryConfig::new()
            .with("encoding", "base64")
            .with("commitment", "confirmed")
            .with("dataSlice", json!({ "offset": 0, "length": 8 }));
        let b = QueryConfig::new()
            .with("dataSlice", json!({ "length": 8, "offset": 0 }))
            .with("commitment", "confirmed")
            .with("encoding", "base64");

        assert_eq!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn query_config_null_is_absent() {
        let a = QueryConfig::new().with("encoding", "base64");
        let b = QueryConfig::new()
            .with("encoding", "base64")
            .with("commitment", Value::Null);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn account_query_defaults_encoding_to_json_parsed() {
        let query = AccountQuery::new(Address::parse("11111111111111111111111111111111").unwrap());
        let config = query.request_config();
        assert_eq!(config.get("encoding"), Some(&json!("jsonParsed")));
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn account_query_deserializes_from_camel_case_args() {
        let query: AccountQuery = serde_json::from_value(json!({
            "address": "So11111111111111111111111111111111111111112",
            "encoding": "base64+zstd",
            "commitment": "finalized",
            "dataSlice": { "offset": 4, "length": 32 },
            "minContextSlot": 12,
        }))
        .expect("args must deserialize");

        assert_eq!(query.encoding(), AccountEncoding::Base64Zstd);
        assert_eq!(query.commitment, Some(Commitment::Finalized));
        assert_eq!(query.min_context_slot, Some(Slot(12)));
        let config = query.request_config();
        assert_eq!(config.get("encoding"), Some(&json!("base64+zstd")));
        assert_eq!(config.get("dataSlice"), Some(&json!({ "offset": 4, "length": 32 })));
    }

    #[test]
    fn program_accounts_filters_serialize_to_wire_shape() {
        let mut query =
            ProgramAccountsQuery::new(Address::parse("11111111111111111111111111111111").unwrap());
        query.filters = Some(vec![
            ProgramAccountsFilter::DataSize(165),
            ProgramAccountsFilter::Memcmp(MemcmpFilter {
                offset: 32,
                bytes: "3xy".into(),
                encoding: None,
            }),
        ]);
        query.with_context = Some(true);

        let config = query.request_config();
        assert_eq!(
            config.get("filters"),
            Some(&json!([
                { "dataSize": 165 },
                { "memcmp": { "offset": 32, "bytes": "3xy" } }
            ]))
        );
        assert_eq!(config.get("withContext"), Some(&json!(true)));
    }

    #[test]
    fn address_rejects_non_base58() {
        assert!(Address::parse("0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl").is_err());
        assert!(Address::parse("short").is_err());
        assert!(Address::parse("11111111111111111111111111111111").is_ok());
    }

    #[test]
    fn block_accessors_read_passthrough_fields() {
        let block = Block(json!({
            "blockhash": "abc",
            "parentSlot": 41,
            "blockHeight": 40,
            "transactions": [{}, {}],
        }));
        assert_eq!(block.blockhash(), Some("abc"));
        assert_eq!(block.parent_slot(), Some(Slot(41)));
        assert_eq!(block.block_height(), Some(40));
        assert_eq!(block.transaction_count(), 2);
    }
}
