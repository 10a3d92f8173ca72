//! Field resolvers.
//!
//! Each resolver follows the same pipeline: check the cache, claim the key,
//! check again, call the node, normalize, store, return. The claim makes
//! concurrent resolutions of one key share a single node request.

mod account;
mod block;
mod program_accounts;
mod transaction;

use std::future::Future;

use tracing::{debug, warn};

use crate::account::Account;
use crate::cache::{CacheEntry, CacheKey, ResolutionCache};
use crate::error::CoreError;
use crate::rpc::RpcClient;
use crate::transaction::TransactionResult;
use crate::types::Block;

/// Stateless view over what a resolution needs. Built per call by
/// [`Context`](crate::context::Context).
pub(crate) struct Resolver<'a> {
    pub(crate) rpc: &'a RpcClient,
    pub(crate) cache: &'a ResolutionCache,
    pub(crate) cache_not_found: bool,
}

// ==============================================================================
// Cached Entities
// ==============================================================================

pub(crate) trait CachedEntity: Clone + Sized {
    fn into_entry(self) -> CacheEntry;
    fn from_entry(entry: CacheEntry) -> Option<Self>;
}

impl CachedEntity for Account {
    fn into_entry(self) -> CacheEntry {
        CacheEntry::Account(self)
    }

    fn from_entry(entry: CacheEntry) -> Option<Self> {
        match entry {
            CacheEntry::Account(account) => Some(account),
            _ => None,
        }
    }
}

impl CachedEntity for Block {
    fn into_entry(self) -> CacheEntry {
        CacheEntry::Block(self)
    }

    fn from_entry(entry: CacheEntry) -> Option<Self> {
        match entry {
            CacheEntry::Block(block) => Some(block),
            _ => None,
        }
    }
}

impl CachedEntity for Vec<Account> {
    fn into_entry(self) -> CacheEntry {
        CacheEntry::ProgramAccounts(self)
    }

    fn from_entry(entry: CacheEntry) -> Option<Self> {
        match entry {
            CacheEntry::ProgramAccounts(accounts) => Some(accounts),
            _ => None,
        }
    }
}

impl CachedEntity for TransactionResult {
    fn into_entry(self) -> CacheEntry {
        CacheEntry::Transaction(self)
    }

    fn from_entry(entry: CacheEntry) -> Option<Self> {
        match entry {
            CacheEntry::Transaction(tx) => Some(tx),
            _ => None,
        }
    }
}

// ==============================================================================
// Pipeline
// ==============================================================================

impl Resolver<'_> {
    /// `Some(None)` is a cached not-found; `None` is a miss.
    async fn lookup<T: CachedEntity>(&self, key: &CacheKey) -> Option<Option<T>> {
        match self.cache.get(key).await? {
            CacheEntry::Absent => Some(None),
            entry => match T::from_entry(entry) {
                Some(value) => Some(Some(value)),
                None => {
                    warn!(%key, "cache entry has unexpected kind; refetching");
                    None
                }
            },
        }
    }

    /// Cache-check, claim, double-check, fetch, insert.
    ///
    /// Errors from `fetch` propagate and leave the cache untouched.
    pub(crate) async fn cached<T, F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
    ) -> Result<Option<T>, CoreError>
    where
        T: CachedEntity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, CoreError>>,
    {
        if let Some(hit) = self.lookup(&key).await {
            debug!(%key, "cache hit");
            return Ok(hit);
        }

        let _claim = self.cache.claim(&key).await;

        // Another resolution may have filled the entry while we waited.
        if let Some(hit) = self.lookup(&key).await {
            debug!(%key, "cache hit after claim");
            return Ok(hit);
        }

        debug!(%key, "cache miss");
        match fetch().await? {
            Some(value) => {
                self.cache.insert(key, value.clone().into_entry()).await;
                Ok(Some(value))
            }
            None => {
                if self.cache_not_found {
                    self.cache.insert(key, CacheEntry::Absent).await;
                }
                Ok(None)
            }
        }
    }
}
