use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::account::{Account, AddressField};
use crate::cache::{ResolutionCache, DEFAULT_CACHE_CAPACITY};
use crate::error::CoreError;
use crate::resolve::Resolver;
use crate::rpc::RpcClient;
use crate::transaction::TransactionResult;
use crate::types::{AccountQuery, Block, BlockQuery, ProgramAccountsQuery, TransactionQuery};

// ==============================================================================
// Configuration
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Entry bound for a context-owned cache. Ignored with a shared cache.
    pub cache_capacity: usize,
    /// Remember `null` node answers as authoritative not-found entries.
    pub cache_not_found: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_not_found: false,
        }
    }
}

// ==============================================================================
// Context
// ==============================================================================

/// Per-query resolution context: threads one RPC client and one cache
/// through every resolver invocation of a top-level query.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct Context {
    rpc: RpcClient,
    cache: Arc<ResolutionCache>,
    config: ContextConfig,
}

impl Context {
    /// A context with its own fresh cache.
    pub fn new(rpc: RpcClient, config: ContextConfig) -> Self {
        let cache = Arc::new(ResolutionCache::with_capacity(config.cache_capacity));
        Self { rpc, cache, config }
    }

    /// A context reusing `cache`, which may outlive this query.
    pub fn with_shared_cache(
        rpc: RpcClient,
        cache: Arc<ResolutionCache>,
        config: ContextConfig,
    ) -> Self {
        Self { rpc, cache, config }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub(crate) fn resolver(&self) -> Resolver<'_> {
        Resolver {
            rpc: &self.rpc,
            cache: &self.cache,
            cache_not_found: self.config.cache_not_found,
        }
    }

    pub async fn resolve_account(&self, query: &AccountQuery) -> Result<Option<Account>, CoreError> {
        debug!(account = %query.address, encoding = %query.encoding(), "resolve account");
        self.resolver().account(query).await
    }

    pub async fn resolve_block(&self, query: &BlockQuery) -> Result<Option<Block>, CoreError> {
        debug!(slot = %query.slot, "resolve block");
        self.resolver().block(query).await
    }

    pub async fn resolve_program_accounts(
        &self,
        query: &ProgramAccountsQuery,
    ) -> Result<Vec<Account>, CoreError> {
        debug!(program = %query.program_address, "resolve program accounts");
        self.resolver().program_accounts(query).await
    }

    pub async fn resolve_transaction(
        &self,
        query: &TransactionQuery,
    ) -> Result<Option<TransactionResult>, CoreError> {
        debug!(signature = %query.signature, "resolve transaction");
        self.resolver().transaction(query).await
    }

    /// Resolve the account behind a single address-valued field of `parent`.
    /// `args` supplies commitment, encoding and the rest; its address is
    /// replaced by the field's value.
    pub async fn resolve_account_field(
        &self,
        parent: &Account,
        field: AddressField,
        args: &AccountQuery,
    ) -> Result<Option<Account>, CoreError> {
        self.resolver().account_field(parent, field, args).await
    }

    /// List-valued counterpart of [`resolve_account_field`](Self::resolve_account_field).
    /// One result per referenced address; a failed element leaves the
    /// others intact.
    pub async fn resolve_account_list_field(
        &self,
        parent: &Account,
        field: AddressField,
        args: &AccountQuery,
    ) -> Vec<Result<Option<Account>, CoreError>> {
        self.resolver().account_list_field(parent, field, args).await
    }

    /// Resolve several accounts concurrently. Each result is independent:
    /// one failure does not discard the others.
    pub async fn resolve_accounts(
        &self,
        queries: &[AccountQuery],
    ) -> Vec<Result<Option<Account>, CoreError>> {
        join_all(queries.iter().map(|query| self.resolve_account(query))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKind;
    use crate::error::RpcError;
    use crate::rpc::mock::MockTransport;
    use crate::rpc::RpcMethod;
    use crate::test_util::*;
    use crate::types::{AccountEncoding, Commitment, Slot};
    use serde_json::json;

    fn context(transport: &Arc<MockTransport>) -> Context {
        context_with(transport, ContextConfig::default())
    }

    fn context_with(transport: &Arc<MockTransport>, config: ContextConfig) -> Context {
        let transport: Arc<MockTransport> = Arc::clone(transport);
        Context::new(RpcClient::new(transport), config)
    }

    #[tokio::test]
    async fn mint_account_resolves_nested_mint_authority() {
        let mint = address(1);
        let authority = address(2);
        let token_program = address(9);
        let transport = Arc::new(
            MockTransport::builder()
                .with_result_for(
                    RpcMethod::GetAccountInfo,
                    mint.as_str(),
                    with_context(mint_account_value(&token_program, Some(&authority), None)),
                )
                .with_result_for(
                    RpcMethod::GetAccountInfo,
                    authority.as_str(),
                    with_context(raw_account_value(&address(3), "", "base64")),
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(mint.clone());

        let account = ctx
            .resolve_account(&query)
            .await
            .expect("resolve must succeed")
            .expect("mint exists");
        assert_eq!(account.kind(), AccountKind::Mint);

        let nested = ctx
            .resolve_account_field(&account, AddressField::MintAuthority, &query)
            .await
            .expect("nested resolve must succeed")
            .expect("authority exists");
        assert_eq!(nested.address, authority);
        assert_eq!(nested.owner, address(3));
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 2);

        // Both entries are cached independently.
        ctx.resolve_account(&query).await.expect("cached");
        ctx.resolve_account(&query.for_address(authority))
            .await
            .expect("cached");
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 2);
    }

    #[tokio::test]
    async fn absent_nested_field_makes_no_request() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetAccountInfo,
                    with_context(mint_account_value(&address(9), None, None)),
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1));
        let account = ctx.resolve_account(&query).await.unwrap().unwrap();

        for field in [
            AddressField::MintAuthority,
            AddressField::FreezeAuthority,
            AddressField::Voter,
            AddressField::Node,
        ] {
            let nested = ctx
                .resolve_account_field(&account, field, &query)
                .await
                .expect("short-circuit is not an error");
            assert!(nested.is_none(), "{field:?} must be None");
        }
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 1);
    }

    #[tokio::test]
    async fn token_without_owner_makes_no_request() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetAccountInfo,
                    with_context(token_account_value_without_owner(&address(9), &address(2))),
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1));
        let account = ctx.resolve_account(&query).await.unwrap().unwrap();
        assert_eq!(account.kind(), AccountKind::Token);

        let holder = ctx
            .resolve_account_field(&account, AddressField::TokenOwner, &query)
            .await
            .expect("short-circuit is not an error");
        assert!(holder.is_none());
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 1);
    }

    #[tokio::test]
    async fn nested_fields_inherit_parent_arguments() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result_for(
                    RpcMethod::GetAccountInfo,
                    address(1).as_str(),
                    with_context(raw_account_value(&address(4), "AQID", "base64")),
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1))
            .with_encoding(AccountEncoding::Base64)
            .with_commitment(Commitment::Finalized);
        let account = ctx.resolve_account(&query).await.unwrap().unwrap();

        ctx.resolve_account_field(&account, AddressField::Owner, &query)
            .await
            .expect("owner resolves to None");

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1[0], json!(address(4).as_str()));
        assert_eq!(
            calls[1].1[1],
            json!({ "commitment": "finalized", "encoding": "base64" })
        );
    }

    #[tokio::test]
    async fn vote_account_resolves_authorized_voter_list() {
        let voters = [address(7), address(8), address(5)];
        let transport = Arc::new(
            MockTransport::builder()
                .with_result_for(
                    RpcMethod::GetAccountInfo,
                    address(1).as_str(),
                    with_context(vote_account_value(&address(9), &address(6), &voters)),
                )
                .with_result_for(
                    RpcMethod::GetAccountInfo,
                    address(7).as_str(),
                    with_context(raw_account_value(&address(9), "", "base64")),
                )
                .with_error_for(
                    RpcMethod::GetAccountInfo,
                    address(8).as_str(),
                    -32005,
                    "Node is behind",
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1));
        let vote = ctx.resolve_account(&query).await.unwrap().unwrap();

        let resolved = ctx
            .resolve_account_list_field(&vote, AddressField::AuthorizedVoter, &query)
            .await;
        assert_eq!(resolved.len(), 3);
        let first = resolved[0].as_ref().expect("first voter resolves");
        assert_eq!(first.as_ref().map(|a| &a.address), Some(&address(7)));
        assert!(
            matches!(resolved[1], Err(CoreError::Rpc(RpcError::ServerError { code: -32005, .. }))),
            "failing voter keeps its own error"
        );
        assert!(
            matches!(resolved[2], Ok(None)),
            "unknown voter resolves to None"
        );

        let err = ctx
            .resolve_account_field(&vote, AddressField::AuthorizedVoter, &query)
            .await
            .expect_err("list field through scalar API");
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn repeated_resolution_is_idempotent() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetAccountInfo,
                    with_context(mint_account_value(&address(9), Some(&address(2)), None)),
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1));

        let first = ctx.resolve_account(&query).await.unwrap();
        let second = ctx.resolve_account(&query).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 1);
    }

    #[tokio::test]
    async fn distinct_encodings_fetch_separately() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetAccountInfo,
                    with_context(raw_account_value(&address(9), "AQID", "base64")),
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1));

        ctx.resolve_account(&query).await.unwrap();
        ctx.resolve_account(&query.clone().with_encoding(AccountEncoding::Base64))
            .await
            .unwrap();
        // Omitted encoding and explicit jsonParsed share a key.
        ctx.resolve_account(&query.clone().with_encoding(AccountEncoding::JsonParsed))
            .await
            .unwrap();
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 2);
    }

    #[tokio::test]
    async fn concurrent_identical_resolutions_share_one_request() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetAccountInfo,
                    with_context(mint_account_value(&address(9), None, None)),
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1));

        let (a, b) = tokio::join!(ctx.resolve_account(&query), ctx.resolve_account(&query));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 1);
    }

    #[tokio::test]
    async fn null_results_are_not_cached_by_default() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(RpcMethod::GetAccountInfo, with_context(json!(null)))
                .with_result(RpcMethod::GetBlock, json!(null))
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1));

        assert!(ctx.resolve_account(&query).await.unwrap().is_none());
        assert!(ctx.resolve_account(&query).await.unwrap().is_none());
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 2);

        let block = BlockQuery::new(Slot(5));
        assert!(ctx.resolve_block(&block).await.unwrap().is_none());
        assert!(ctx.resolve_block(&block).await.unwrap().is_none());
        assert_eq!(transport.call_count(RpcMethod::GetBlock), 2);
        assert!(ctx.cache().is_empty().await);
    }

    #[tokio::test]
    async fn null_results_cached_when_opted_in() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(RpcMethod::GetAccountInfo, with_context(json!(null)))
                .build(),
        );
        let ctx = context_with(
            &transport,
            ContextConfig {
                cache_not_found: true,
                ..ContextConfig::default()
            },
        );
        let query = AccountQuery::new(address(1));

        assert!(ctx.resolve_account(&query).await.unwrap().is_none());
        assert!(ctx.resolve_account(&query).await.unwrap().is_none());
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 1);
    }

    #[tokio::test]
    async fn errors_propagate_and_are_not_cached() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_error(RpcMethod::GetAccountInfo, -32005, "Node is behind")
                .build(),
        );
        let ctx = context(&transport);
        let query = AccountQuery::new(address(1));

        for _ in 0..2 {
            let err = ctx.resolve_account(&query).await.expect_err("must fail");
            assert!(matches!(
                err,
                CoreError::Rpc(RpcError::ServerError { code: -32005, .. })
            ));
        }
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 2);
    }

    #[tokio::test]
    async fn resolve_accounts_isolates_failures() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetAccountInfo,
                    with_context(raw_account_value(&address(9), "", "base64")),
                )
                .with_error_for(RpcMethod::GetAccountInfo, address(2).as_str(), -32602, "bad")
                .build(),
        );
        let ctx = context(&transport);

        let results = ctx
            .resolve_accounts(&[AccountQuery::new(address(1)), AccountQuery::new(address(2))])
            .await;
        assert!(matches!(&results[0], Ok(Some(_))));
        assert!(results[1].is_err());
    }

    #[tokio::test]
    async fn program_accounts_seed_account_cache() {
        let program = address(9);
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetProgramAccounts,
                    json!([
                        program_account(&address(1), mint_account_value(&program, None, None)),
                        program_account(
                            &address(2),
                            token_account_value(&program, &address(1), &address(3)),
                        ),
                    ]),
                )
                .build(),
        );
        let ctx = context(&transport);

        let accounts = ctx
            .resolve_program_accounts(&ProgramAccountsQuery::new(program.clone()))
            .await
            .expect("listing must succeed");
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].kind(), AccountKind::Token);

        let token = ctx
            .resolve_account(&AccountQuery::new(address(2)))
            .await
            .unwrap()
            .expect("seeded");
        assert_eq!(token, accounts[1]);

        // The token's mint was listed too, so the nested hop is a cache hit.
        let mint = ctx
            .resolve_account_field(&token, AddressField::Mint, &AccountQuery::new(address(2)))
            .await
            .unwrap()
            .expect("seeded mint");
        assert_eq!(mint.address, address(1));
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 0);
    }

    #[tokio::test]
    async fn shared_cache_spans_contexts() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetAccountInfo,
                    with_context(raw_account_value(&address(9), "", "base64")),
                )
                .build(),
        );
        let cache = Arc::new(ResolutionCache::new());
        let query = AccountQuery::new(address(1));

        for _ in 0..2 {
            let rpc = RpcClient::new(transport.clone());
            let ctx = Context::with_shared_cache(rpc, Arc::clone(&cache), ContextConfig::default());
            ctx.resolve_account(&query).await.unwrap();
        }
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 1);

        // A fresh context owns a fresh cache.
        context(&transport).resolve_account(&query).await.unwrap();
        assert_eq!(transport.call_count(RpcMethod::GetAccountInfo), 2);
    }

    #[tokio::test]
    async fn transaction_resolution_normalizes_and_caches() {
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(
                    RpcMethod::GetTransaction,
                    json!({
                        "slot": 10,
                        "meta": { "fee": 5000 },
                        "transaction": ["AQID", "base64"],
                    }),
                )
                .build(),
        );
        let ctx = context(&transport);
        let query = TransactionQuery::new(signature(1));

        let tx = ctx
            .resolve_transaction(&query)
            .await
            .unwrap()
            .expect("transaction exists");
        assert_eq!(tx.format, crate::transaction::TransactionFormat::Unparsed);
        assert_eq!(tx.encoding, crate::types::TransactionEncoding::Base64);

        ctx.resolve_transaction(&query).await.unwrap();
        assert_eq!(transport.call_count(RpcMethod::GetTransaction), 1);
    }

    #[tokio::test]
    async fn block_passes_through() {
        let body = json!({ "blockhash": "abc", "parentSlot": 4, "transactions": [] });
        let transport = Arc::new(
            MockTransport::builder()
                .with_result(RpcMethod::GetBlock, body.clone())
                .build(),
        );
        let ctx = context(&transport);

        let block = ctx
            .resolve_block(&BlockQuery::new(Slot(5)))
            .await
            .unwrap()
            .expect("block exists");
        assert_eq!(block.0, body);
        assert_eq!(block.parent_slot(), Some(Slot(4)));
    }
}
