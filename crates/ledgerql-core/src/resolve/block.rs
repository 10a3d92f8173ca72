use crate::cache::{CacheKey, EntityKind};
use crate::error::CoreError;
use crate::types::{Block, BlockQuery};

use super::Resolver;

impl Resolver<'_> {
    /// Blocks are passed through as received.
    pub(crate) async fn block(&self, query: &BlockQuery) -> Result<Option<Block>, CoreError> {
        let config = query.request_config();
        let key = CacheKey::new(EntityKind::Block, query.slot.to_string(), &config);

        self.cached(key, || async {
            Ok(self.rpc.get_block(query.slot, &config).await?.map(Block))
        })
        .await
    }
}
