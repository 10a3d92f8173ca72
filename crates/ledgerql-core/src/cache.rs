use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use lru::LruCache;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::account::Account;
use crate::transaction::TransactionResult;
use crate::types::{Block, QueryConfig};

/// Default number of entries kept before least-recently-used eviction.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

// ==============================================================================
// Keys and Entries
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Block,
    ProgramAccounts,
    Transaction,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Account => "account",
            Self::Block => "block",
            Self::ProgramAccounts => "programAccounts",
            Self::Transaction => "transaction",
        })
    }
}

/// Logical identity of a query: entity kind, primary identifier, and the
/// canonical text of its normalized config. Two configs with the same
/// members in a different order produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: EntityKind,
    primary: String,
    config: String,
}

impl CacheKey {
    pub fn new(kind: EntityKind, primary: impl Into<String>, config: &QueryConfig) -> Self {
        Self {
            kind,
            primary: primary.into(),
            config: config.canonical(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.primary, self.config)
    }
}

/// An already-normalized resolution result.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Account(Account),
    Block(Block),
    ProgramAccounts(Vec<Account>),
    Transaction(TransactionResult),
    /// The node answered `null`. Only stored when not-found caching is on.
    Absent,
}

// ==============================================================================
// Resolution Cache
// ==============================================================================

/// Bounded in-memory memo of node responses keyed by [`CacheKey`].
///
/// Owned by one [`Context`](crate::context::Context), or shared across
/// contexts via `Arc<ResolutionCache>`. Uses `tokio::sync::Mutex` because
/// `LruCache::get` updates recency and needs exclusive access.
pub struct ResolutionCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    inflight: StdMutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            inflight: StdMutex::new(HashMap::new()),
        }
    }

    /// `None` is a miss. `Some(CacheEntry::Absent)` is a cached not-found.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.lock().await.put(key, entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Serialize fetches of `key`. Resolutions of the same key wait here
    /// until the current holder drops its claim, then re-check the cache.
    pub async fn claim(&self, key: &CacheKey) -> Claim<'_> {
        let slot = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            // Slots referenced only by the map were left by waiters that were
            // cancelled after the holder released.
            inflight.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(inflight.entry(key.clone()).or_default())
        };
        let permit = Arc::clone(&slot).lock_owned().await;
        Claim {
            cache: self,
            key: key.clone(),
            slot,
            permit: Some(permit),
        }
    }

    fn release(&self, key: &CacheKey, slot: &Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map and one held by the releasing claim; any
        // more means another resolution is already waiting on this slot.
        let idle = inflight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if idle {
            inflight.remove(key);
        }
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to fetch one key. Released on drop.
pub struct Claim<'a> {
    cache: &'a ResolutionCache,
    key: CacheKey,
    slot: Arc<Mutex<()>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.cache.release(&self.key, &self.slot);
    }
}
