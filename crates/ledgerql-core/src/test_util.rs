//! Shared test helpers for `ledgerql-core` unit tests.
//!
//! Builders for deterministic identifiers and for node-shaped JSON values
//! (`getAccountInfo` values, `getProgramAccounts` elements) so that tests
//! across modules share a single source of truth for dummy data.

use serde_json::{json, Value};

use crate::types::{Address, Signature};

const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

// ==============================================================================
// Identifier Helpers
// ==============================================================================

/// Create a deterministic, valid `Address` from a single distinguishing byte.
pub fn address(n: u8) -> Address {
    let n = usize::from(n);
    let suffix = [ALPHABET[n / 58] as char, ALPHABET[n % 58] as char];
    let text = format!("Ledger{}{}{}", "1".repeat(24), suffix[0], suffix[1]);
    Address::parse(&text).expect("generated address must be valid")
}

/// Create a deterministic, valid `Signature` from a single distinguishing byte.
pub fn signature(n: u8) -> Signature {
    let n = usize::from(n);
    let text = format!("Sig{}{}", "1".repeat(62), ALPHABET[n % 58] as char);
    Signature::parse(&text).expect("generated signature must be valid")
}

// ==============================================================================
// Node Response Builders
// ==============================================================================

/// Wrap a value in the `{context, value}` envelope used by account methods.
pub fn with_context(value: Value) -> Value {
    json!({ "context": { "apiVersion": "2.0.0", "slot": 300 }, "value": value })
}

fn account_value(owner: &Address, data: Value, space: u64) -> Value {
    json!({
        "lamports": 1_461_600,
        "owner": owner.as_str(),
        "executable": false,
        "rentEpoch": 0,
        "space": space,
        "data": data,
    })
}

fn parsed_data(program: &str, account_type: &str, info: Value, space: u64) -> Value {
    json!({
        "program": program,
        "parsed": { "type": account_type, "info": info },
        "space": space,
    })
}

/// An account in the `[data, encoding]` wire form.
pub fn raw_account_value(owner: &Address, data: &str, encoding: &str) -> Value {
    account_value(owner, json!([data, encoding]), 3)
}

pub fn mint_account_value(
    owner: &Address,
    mint_authority: Option<&Address>,
    freeze_authority: Option<&Address>,
) -> Value {
    let info = json!({
        "decimals": 6,
        "freezeAuthority": freeze_authority.map(Address::as_str),
        "isInitialized": true,
        "mintAuthority": mint_authority.map(Address::as_str),
        "supply": "1000000000",
    });
    account_value(owner, parsed_data("spl-token", "mint", info, 82), 82)
}

pub fn token_account_value(owner: &Address, mint: &Address, token_owner: &Address) -> Value {
    let info = json!({
        "isNative": false,
        "mint": mint.as_str(),
        "owner": token_owner.as_str(),
        "state": "initialized",
        "tokenAmount": {
            "amount": "2500000",
            "decimals": 6,
            "uiAmount": 2.5,
            "uiAmountString": "2.5",
        },
    });
    account_value(owner, parsed_data("spl-token", "account", info, 165), 165)
}

/// A token account whose parsed info carries no `owner`.
pub fn token_account_value_without_owner(owner: &Address, mint: &Address) -> Value {
    let mut value = token_account_value(owner, mint, &address(0));
    if let Some(info) = value
        .pointer_mut("/data/parsed/info")
        .and_then(Value::as_object_mut)
    {
        info.remove("owner");
    }
    value
}

pub fn stake_account_value(
    owner: &Address,
    staker: &Address,
    withdrawer: &Address,
    voter: Option<&Address>,
) -> Value {
    let meta = json!({
        "authorized": { "staker": staker.as_str(), "withdrawer": withdrawer.as_str() },
        "lockup": { "custodian": "11111111111111111111111111111111", "epoch": 0, "unixTimestamp": 0 },
        "rentExemptReserve": "2282880",
    });
    let (account_type, info) = match voter {
        Some(voter) => (
            "delegated",
            json!({
                "meta": meta,
                "stake": {
                    "creditsObserved": 169_965_713,
                    "delegation": {
                        "activationEpoch": "386",
                        "deactivationEpoch": "18446744073709551615",
                        "stake": "1000000000",
                        "voter": voter.as_str(),
                        "warmupCooldownRate": 0.25,
                    },
                },
            }),
        ),
        None => ("initialized", json!({ "meta": meta, "stake": null })),
    };
    account_value(owner, parsed_data("stake", account_type, info, 200), 200)
}

pub fn vote_account_value(owner: &Address, node: &Address, voters: &[Address]) -> Value {
    let authorized_voters: Vec<Value> = voters
        .iter()
        .enumerate()
        .map(|(epoch, voter)| json!({ "authorizedVoter": voter.as_str(), "epoch": epoch + 500 }))
        .collect();
    let info = json!({
        "authorizedVoters": authorized_voters,
        "authorizedWithdrawer": owner.as_str(),
        "commission": 10,
        "epochCredits": [{ "credits": "100", "epoch": 500, "previousCredits": "50" }],
        "lastTimestamp": { "slot": 1000, "timestamp": 1_700_000_000 },
        "nodePubkey": node.as_str(),
        "priorVoters": [],
        "rootSlot": 990,
        "votes": [{ "confirmationCount": 31, "slot": 991 }],
    });
    account_value(owner, parsed_data("vote", "vote", info, 3762), 3762)
}

/// One `getProgramAccounts` element.
pub fn program_account(pubkey: &Address, account: Value) -> Value {
    json!({ "pubkey": pubkey.as_str(), "account": account })
}
