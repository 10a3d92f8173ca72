use futures::future::join_all;
use tracing::debug;

use crate::account::{normalize_account, Account, AddressField};
use crate::cache::{CacheKey, EntityKind};
use crate::error::CoreError;
use crate::types::AccountQuery;

use super::Resolver;

impl Resolver<'_> {
    pub(crate) async fn account(&self, query: &AccountQuery) -> Result<Option<Account>, CoreError> {
        let config = query.request_config();
        let key = CacheKey::new(EntityKind::Account, query.address.as_str(), &config);

        self.cached(key, || async {
            let Some(raw) = self.rpc.get_account_info(&query.address, &config).await? else {
                debug!(account = %query.address, "account not found");
                return Ok(None);
            };
            normalize_account(query.address.clone(), query.encoding(), raw).map(Some)
        })
        .await
    }

    /// Resolve the single account referenced by `field` on `parent`, using
    /// `args` for everything but the address. Returns `None` without a node
    /// request when the field is absent or unset.
    pub(crate) async fn account_field(
        &self,
        parent: &Account,
        field: AddressField,
        args: &AccountQuery,
    ) -> Result<Option<Account>, CoreError> {
        if field.is_list() {
            return Err(CoreError::InvalidArgument(format!(
                "`{}` is a list field",
                field.path()
            )));
        }
        match parent.field_addresses(field).first() {
            Some(address) => self.account(&args.for_address((*address).clone())).await,
            None => Ok(None),
        }
    }

    /// Resolve every account referenced by a list-valued `field`. Each
    /// element succeeds or fails on its own.
    pub(crate) async fn account_list_field(
        &self,
        parent: &Account,
        field: AddressField,
        args: &AccountQuery,
    ) -> Vec<Result<Option<Account>, CoreError>> {
        let queries: Vec<AccountQuery> = parent
            .field_addresses(field)
            .into_iter()
            .map(|address| args.for_address(address.clone()))
            .collect();
        join_all(queries.iter().map(|query| self.account(query))).await
    }
}
