use crate::cache::{CacheKey, EntityKind};
use crate::error::CoreError;
use crate::transaction::{normalize_transaction, TransactionResult};
use crate::types::TransactionQuery;

use super::Resolver;

impl Resolver<'_> {
    pub(crate) async fn transaction(
        &self,
        query: &TransactionQuery,
    ) -> Result<Option<TransactionResult>, CoreError> {
        let config = query.request_config();
        let key = CacheKey::new(EntityKind::Transaction, query.signature.as_str(), &config);

        self.cached(key, || async {
            match self.rpc.get_transaction(&query.signature, &config).await? {
                Some(raw) => normalize_transaction(query.encoding(), raw).map(Some),
                None => Ok(None),
            }
        })
        .await
    }
}
