use serde_json::Value;
use tracing::debug;

use crate::account::{normalize_account, Account};
use crate::cache::{CacheEntry, CacheKey, EntityKind};
use crate::error::CoreError;
use crate::types::{Address, ProgramAccountsQuery};

use super::Resolver;

impl Resolver<'_> {
    /// List the accounts owned by a program. Each listed account is also
    /// stored under its single-account key so later `account` resolutions
    /// with matching arguments hit the cache.
    pub(crate) async fn program_accounts(
        &self,
        query: &ProgramAccountsQuery,
    ) -> Result<Vec<Account>, CoreError> {
        let config = query.request_config();
        let key = CacheKey::new(
            EntityKind::ProgramAccounts,
            query.program_address.as_str(),
            &config,
        );

        let accounts = self
            .cached(key, || async {
                let items = self
                    .rpc
                    .get_program_accounts(&query.program_address, &config)
                    .await?;
                debug!(
                    program = %query.program_address,
                    count = items.len(),
                    "program accounts fetched"
                );

                let mut accounts = Vec::with_capacity(items.len());
                for item in items {
                    let account = normalize_element(query, item)?;
                    let account_config = query.account_query(account.address.clone());
                    let account_key = CacheKey::new(
                        EntityKind::Account,
                        account.address.as_str(),
                        &account_config.request_config(),
                    );
                    self.cache
                        .insert(account_key, CacheEntry::Account(account.clone()))
                        .await;
                    accounts.push(account);
                }
                Ok(Some(accounts))
            })
            .await?;

        Ok(accounts.unwrap_or_default())
    }
}

fn normalize_element(query: &ProgramAccountsQuery, item: Value) -> Result<Account, CoreError> {
    let Value::Object(mut item) = item else {
        return Err(CoreError::InvalidResponse(
            "programAccounts element must be an object".into(),
        ));
    };
    let pubkey = item
        .get("pubkey")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::InvalidResponse("programAccounts element lacks pubkey".into()))
        .and_then(Address::parse)?;
    let raw = item
        .remove("account")
        .ok_or_else(|| CoreError::InvalidResponse(format!("no account body for {pubkey}")))?;
    normalize_account(pubkey, query.encoding(), raw)
}
