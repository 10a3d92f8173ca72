//! Account model and normalization.
//!
//! A node returns account data in one of several loosely-typed shapes
//! depending on the requested encoding and, for `jsonParsed`, on which
//! program decoder recognized the account. [`normalize_account`] turns that
//! into an [`Account`] whose [`AccountData`] variant is chosen once by
//! [`AccountKind::discriminate`] and carried explicitly from then on.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::types::{AccountEncoding, Address};

// ==============================================================================
// Account Kind Discrimination
// ==============================================================================

/// The concrete account variant, one per schema type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKind {
    Base58,
    Base64,
    Base64Zstd,
    Nonce,
    LookupTable,
    Mint,
    Token,
    Stake,
    Vote,
}

impl AccountKind {
    /// Select the variant for an account.
    ///
    /// Raw encodings always win regardless of `program`/`type`. Only for
    /// `jsonParsed` does the tag pair pick a parsed layout, and any tag pair
    /// without a known layout maps to [`AccountKind::Base64`].
    pub fn discriminate(
        encoding: AccountEncoding,
        program: Option<&str>,
        account_type: Option<&str>,
    ) -> Self {
        match encoding {
            AccountEncoding::Base58 => Self::Base58,
            AccountEncoding::Base64 => Self::Base64,
            AccountEncoding::Base64Zstd => Self::Base64Zstd,
            AccountEncoding::JsonParsed => match (program, account_type) {
                (Some("nonce"), _) => Self::Nonce,
                (Some("spl-token"), Some("mint")) => Self::Mint,
                (Some("spl-token"), Some("account")) => Self::Token,
                (Some("stake"), _) => Self::Stake,
                (Some("vote"), Some("vote")) => Self::Vote,
                (Some("address-lookup-table"), Some("lookupTable")) => Self::LookupTable,
                _ => Self::Base64,
            },
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Base58 => "AccountBase58",
            Self::Base64 => "AccountBase64",
            Self::Base64Zstd => "AccountBase64Zstd",
            Self::Nonce => "NonceAccount",
            Self::LookupTable => "LookupTableAccount",
            Self::Mint => "MintAccount",
            Self::Token => "TokenAccount",
            Self::Stake => "StakeAccount",
            Self::Vote => "VoteAccount",
        }
    }

    pub fn is_parsed(self) -> bool {
        !matches!(self, Self::Base58 | Self::Base64 | Self::Base64Zstd)
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

// ==============================================================================
// Account
// ==============================================================================

/// Metadata attached to accounts decoded by a program parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonParsedMeta {
    pub program: String,
    pub space: Option<u64>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: Address,
    pub lamports: u64,
    pub owner: Address,
    pub executable: bool,
    pub rent_epoch: u64,
    pub encoding: AccountEncoding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<u64>,
    /// Present exactly when `data` is a parsed variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonParsedMeta>,
    #[serde(flatten)]
    pub data: AccountData,
}

impl Account {
    pub fn kind(&self) -> AccountKind {
        self.data.kind()
    }
}

/// The account payload. Serialized adjacently tagged so the output carries
/// `__typename` alongside `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "__typename", content = "data")]
pub enum AccountData {
    #[serde(rename = "AccountBase58")]
    Base58(String),
    #[serde(rename = "AccountBase64")]
    Base64(String),
    #[serde(rename = "AccountBase64Zstd")]
    Base64Zstd(String),
    #[serde(rename = "NonceAccount")]
    Nonce(NonceAccountData),
    #[serde(rename = "LookupTableAccount")]
    LookupTable(LookupTableAccountData),
    #[serde(rename = "MintAccount")]
    Mint(MintAccountData),
    #[serde(rename = "TokenAccount")]
    Token(TokenAccountData),
    #[serde(rename = "StakeAccount")]
    Stake(StakeAccountData),
    #[serde(rename = "VoteAccount")]
    Vote(VoteAccountData),
}

impl AccountData {
    pub fn kind(&self) -> AccountKind {
        match self {
            Self::Base58(_) => AccountKind::Base58,
            Self::Base64(_) => AccountKind::Base64,
            Self::Base64Zstd(_) => AccountKind::Base64Zstd,
            Self::Nonce(_) => AccountKind::Nonce,
            Self::LookupTable(_) => AccountKind::LookupTable,
            Self::Mint(_) => AccountKind::Mint,
            Self::Token(_) => AccountKind::Token,
            Self::Stake(_) => AccountKind::Stake,
            Self::Vote(_) => AccountKind::Vote,
        }
    }
}

// ==============================================================================
// Parsed Layouts
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceFeeCalculator {
    pub lamports_per_signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceAccountData {
    pub authority: Option<Address>,
    pub blockhash: String,
    pub fee_calculator: NonceFeeCalculator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupTableAccountData {
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub authority: Option<Address>,
    pub deactivation_slot: String,
    pub last_extended_slot: String,
    pub last_extended_slot_start_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintAccountData {
    pub decimals: u8,
    #[serde(default)]
    pub freeze_authority: Option<Address>,
    pub is_initialized: bool,
    #[serde(default)]
    pub mint_authority: Option<Address>,
    pub supply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount: Option<f64>,
    pub ui_amount_string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccountData {
    #[serde(default)]
    pub is_native: bool,
    pub mint: Address,
    #[serde(default)]
    pub owner: Option<Address>,
    pub state: String,
    pub token_amount: TokenAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeAuthorized {
    #[serde(default)]
    pub staker: Option<Address>,
    #[serde(default)]
    pub withdrawer: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeLockup {
    #[serde(default)]
    pub custodian: Option<Address>,
    #[serde(deserialize_with = "de_u64_lenient")]
    pub epoch: u64,
    pub unix_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeMeta {
    pub authorized: StakeAuthorized,
    pub lockup: StakeLockup,
    pub rent_exempt_reserve: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeDelegation {
    #[serde(deserialize_with = "de_u64_lenient")]
    pub activation_epoch: u64,
    #[serde(deserialize_with = "de_u64_lenient")]
    pub deactivation_epoch: u64,
    pub stake: String,
    #[serde(default)]
    pub voter: Option<Address>,
    pub warmup_cooldown_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeState {
    #[serde(deserialize_with = "de_u64_lenient")]
    pub credits_observed: u64,
    pub delegation: StakeDelegation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeAccountData {
    pub meta: StakeMeta,
    #[serde(default)]
    pub stake: Option<StakeState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedVoter {
    #[serde(default)]
    pub authorized_voter: Option<Address>,
    #[serde(deserialize_with = "de_u64_lenient")]
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochCredit {
    pub credits: String,
    #[serde(deserialize_with = "de_u64_lenient")]
    pub epoch: u64,
    pub previous_credits: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastTimestamp {
    #[serde(deserialize_with = "de_u64_lenient")]
    pub slot: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub confirmation_count: u32,
    #[serde(deserialize_with = "de_u64_lenient")]
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorVoter {
    pub authorized_pubkey: Address,
    pub epoch_of_last_authorized_switch: u64,
    pub target_epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAccountData {
    #[serde(default)]
    pub authorized_voters: Vec<AuthorizedVoter>,
    #[serde(default)]
    pub authorized_withdrawer: Option<Address>,
    pub commission: u8,
    #[serde(default)]
    pub epoch_credits: Vec<EpochCredit>,
    pub last_timestamp: LastTimestamp,
    /// Node identity; the parser names it `nodePubkey`.
    #[serde(default, rename = "nodePubkey")]
    pub node: Option<Address>,
    #[serde(default)]
    pub prior_voters: Vec<PriorVoter>,
    #[serde(default)]
    pub root_slot: Option<u64>,
    #[serde(default)]
    pub votes: Vec<Vote>,
}

/// Epochs and slots arrive as numbers or as decimal strings depending on
/// node version; `u64::MAX` sentinels in particular are usually strings.
fn de_u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(u64),
        Str(String),
    }

    match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(n) => Ok(n),
        NumOrString::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

// ==============================================================================
// Address-Valued Fields
// ==============================================================================

/// Every account field that references another account by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressField {
    Owner,
    Authority,
    MintAuthority,
    FreezeAuthority,
    Mint,
    TokenOwner,
    Staker,
    Withdrawer,
    Custodian,
    Voter,
    AuthorizedWithdrawer,
    Node,
    AuthorizedVoter,
}

impl AddressField {
    pub const ALL: [AddressField; 13] = [
        Self::Owner,
        Self::Authority,
        Self::MintAuthority,
        Self::FreezeAuthority,
        Self::Mint,
        Self::TokenOwner,
        Self::Staker,
        Self::Withdrawer,
        Self::Custodian,
        Self::Voter,
        Self::AuthorizedWithdrawer,
        Self::Node,
        Self::AuthorizedVoter,
    ];

    /// Field path as it appears in the query schema.
    pub fn path(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Authority => "data.authority",
            Self::MintAuthority => "data.mintAuthority",
            Self::FreezeAuthority => "data.freezeAuthority",
            Self::Mint => "data.mint",
            Self::TokenOwner => "data.owner",
            Self::Staker => "data.meta.authorized.staker",
            Self::Withdrawer => "data.meta.authorized.withdrawer",
            Self::Custodian => "data.meta.lockup.custodian",
            Self::Voter => "data.stake.delegation.voter",
            Self::AuthorizedWithdrawer => "data.authorizedWithdrawer",
            Self::Node => "data.node",
            Self::AuthorizedVoter => "data.authorizedVoters.authorizedVoter",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.path() == path)
    }

    /// List-valued fields resolve to one account per element.
    pub fn is_list(self) -> bool {
        matches!(self, Self::AuthorizedVoter)
    }
}

impl Account {
    /// Addresses referenced by `field`. Empty when the field does not exist
    /// on this variant or is unset, in which case nothing is fetched.
    pub fn field_addresses(&self, field: AddressField) -> Vec<&Address> {
        use AccountData as D;
        use AddressField as F;

        let single = match (field, &self.data) {
            (F::Owner, _) => Some(&self.owner),
            (F::Authority, D::Nonce(data)) => data.authority.as_ref(),
            (F::Authority, D::LookupTable(data)) => data.authority.as_ref(),
            (F::MintAuthority, D::Mint(data)) => data.mint_authority.as_ref(),
            (F::FreezeAuthority, D::Mint(data)) => data.freeze_authority.as_ref(),
            (F::Mint, D::Token(data)) => Some(&data.mint),
            (F::TokenOwner, D::Token(data)) => data.owner.as_ref(),
            (F::Staker, D::Stake(data)) => data.meta.authorized.staker.as_ref(),
            (F::Withdrawer, D::Stake(data)) => data.meta.authorized.withdrawer.as_ref(),
            (F::Custodian, D::Stake(data)) => data.meta.lockup.custodian.as_ref(),
            (F::Voter, D::Stake(data)) => data
                .stake
                .as_ref()
                .and_then(|stake| stake.delegation.voter.as_ref()),
            (F::AuthorizedWithdrawer, D::Vote(data)) => data.authorized_withdrawer.as_ref(),
            (F::Node, D::Vote(data)) => data.node.as_ref(),
            (F::AuthorizedVoter, D::Vote(data)) => {
                return data
                    .authorized_voters
                    .iter()
                    .filter_map(|voter| voter.authorized_voter.as_ref())
                    .collect();
            }
            _ => None,
        };
        single.into_iter().collect()
    }
}

// ==============================================================================
// Normalization
// ==============================================================================

/// The `value` object of a `getAccountInfo` response (or the `account`
/// member of a `getProgramAccounts` element).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccount {
    lamports: u64,
    owner: Address,
    executable: bool,
    #[serde(deserialize_with = "de_u64_lenient")]
    rent_epoch: u64,
    #[serde(default)]
    space: Option<u64>,
    data: Value,
}

/// Normalize one node account value into an [`Account`].
///
/// `encoding` is the encoding the query asked for. It, together with the
/// parser's `(program, type)` tags, selects the variant. A parsed payload
/// that does not match its declared layout degrades to the base64 variant
/// instead of failing the query.
pub fn normalize_account(
    address: Address,
    encoding: AccountEncoding,
    raw: Value,
) -> Result<Account, CoreError> {
    let raw: RawAccount = serde_json::from_value(raw).map_err(|e| {
        CoreError::InvalidResponse(format!("invalid account value for {address}: {e}"))
    })?;

    let parsed = parsed_payload(&raw.data);
    let kind = AccountKind::discriminate(
        encoding,
        parsed.as_ref().map(|p| p.program.as_str()),
        parsed.as_ref().and_then(|p| p.account_type.as_deref()),
    );

    let (data, meta) = match (kind, parsed) {
        (kind, Some(parsed)) if kind.is_parsed() => {
            match decode_parsed(kind, parsed.info.clone()) {
                Ok(data) => (data, Some(parsed.meta())),
                Err(e) => {
                    warn!(
                        account = %address,
                        kind = %kind,
                        error = %e,
                        "parsed account does not match its layout; falling back to base64"
                    );
                    (AccountData::Base64(encoded_string(&raw.data)), None)
                }
            }
        }
        (AccountKind::Base58, _) => (AccountData::Base58(encoded_string(&raw.data)), None),
        (AccountKind::Base64Zstd, _) => {
            (AccountData::Base64Zstd(encoded_string(&raw.data)), None)
        }
        (kind, _) => {
            if encoding == AccountEncoding::JsonParsed {
                debug!(account = %address, %kind, "no parsed layout; using base64 variant");
            }
            (AccountData::Base64(encoded_string(&raw.data)), None)
        }
    };

    Ok(Account {
        address,
        lamports: raw.lamports,
        owner: raw.owner,
        executable: raw.executable,
        rent_epoch: raw.rent_epoch,
        encoding,
        space: raw.space,
        meta,
        data,
    })
}

struct ParsedPayload {
    program: String,
    space: Option<u64>,
    account_type: Option<String>,
    info: Value,
}

impl ParsedPayload {
    fn meta(&self) -> JsonParsedMeta {
        JsonParsedMeta {
            program: self.program.clone(),
            space: self.space,
            account_type: self.account_type.clone(),
        }
    }
}

/// Extract `{program, parsed: {type, info}, space}` from a `jsonParsed`
/// data object. Returns `None` for the array wire form.
fn parsed_payload(data: &Value) -> Option<ParsedPayload> {
    let obj = data.as_object()?;
    let program = obj.get("program")?.as_str()?.to_owned();
    let parsed = obj.get("parsed");
    Some(ParsedPayload {
        program,
        space: obj.get("space").and_then(Value::as_u64),
        account_type: parsed
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        info: parsed
            .and_then(|p| p.get("info"))
            .cloned()
            .unwrap_or(Value::Null),
    })
}

fn decode_parsed(kind: AccountKind, info: Value) -> Result<AccountData, serde_json::Error> {
    fn decode<T: DeserializeOwned>(info: Value) -> Result<T, serde_json::Error> {
        serde_json::from_value(info)
    }

    Ok(match kind {
        AccountKind::Nonce => AccountData::Nonce(decode(info)?),
        AccountKind::LookupTable => AccountData::LookupTable(decode(info)?),
        AccountKind::Mint => AccountData::Mint(decode(info)?),
        AccountKind::Token => AccountData::Token(decode(info)?),
        AccountKind::Stake => AccountData::Stake(decode(info)?),
        AccountKind::Vote => AccountData::Vote(decode(info)?),
        AccountKind::Base58 | AccountKind::Base64 | AccountKind::Base64Zstd => {
            return Err(serde::de::Error::custom("raw kinds carry no parsed layout"));
        }
    })
}

/// The encoded data string. The node sends `[data, encoding]`; a parsed
/// object with no known layout is kept as its JSON text.
fn encoded_string(data: &Value) -> String {
    match data {
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
