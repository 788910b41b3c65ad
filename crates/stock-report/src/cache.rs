//! Per-category TTL caches with request coalescing
//!
//! Every entry carries its own expiry stamp, so one store can hold values
//! with different lifetimes (price history TTL depends on the range). The
//! backing `TimedCache` lifespan is only the upper bound used for eviction.
//!
//! [`TtlStore::get_or_fetch`] is atomic per key: concurrent callers for a key
//! that is being fetched await the same in-flight request instead of issuing
//! their own.

use crate::config::ReportConfig;
use crate::error::{Result, StockError};
use crate::models::{FinancialSnapshot, PriceSeries, Quote};
use cached::{Cached, TimedCache};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

/// Cache key for provider requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Stock symbol
    pub symbol: String,
    /// Provider operation
    pub endpoint: String,
    /// Additional parameters as JSON string
    pub params: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(symbol: impl Into<String>, endpoint: impl Into<String>, params: impl Serialize) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint: endpoint.into(),
            params: serde_json::to_string(&params).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

type InFlight<V> = Shared<BoxFuture<'static, Result<V>>>;

/// Thread-safe keyed store with per-entry TTL
pub struct TtlStore<V> {
    name: &'static str,
    entries: Arc<RwLock<TimedCache<CacheKey, Entry<V>>>>,
    in_flight: Arc<Mutex<HashMap<CacheKey, InFlight<V>>>>,
}

impl<V> Clone for TtlStore<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: Arc::clone(&self.entries),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<V> TtlStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a store; no entry outlives `max_ttl`
    pub fn new(name: &'static str, max_ttl: Duration) -> Self {
        Self {
            name,
            entries: Arc::new(RwLock::new(TimedCache::with_lifespan(max_ttl))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get an unexpired value
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries.write().await;
        match entries.cache_get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                let _ = entries.cache_remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value that expires after `ttl`
    pub async fn insert(&self, key: CacheKey, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.entries.write().await;
        let _ = entries.cache_set(key, entry);
    }

    /// Return the cached value or run `fetcher` once for all concurrent callers
    ///
    /// The fetch runs on its own task: if every caller goes away, it still
    /// completes and populates the cache. Failures are shared with the callers
    /// waiting at that moment but never cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, ttl: Duration, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(value) = self.get(&key).await {
            debug!(cache = self.name, ?key, "cache hit");
            return Ok(value);
        }

        let shared = {
            let mut in_flight = self.in_flight.lock().await;

            // a fetch may have landed while we waited for the lock
            if let Some(value) = self.get(&key).await {
                debug!(cache = self.name, ?key, "cache hit");
                return Ok(value);
            }

            if let Some(existing) = in_flight.get(&key) {
                debug!(cache = self.name, ?key, "joining in-flight fetch");
                existing.clone()
            } else {
                debug!(cache = self.name, ?key, "cache miss");
                let shared = self.spawn_fetch(key.clone(), ttl, fetcher());
                in_flight.insert(key, shared.clone());
                shared
            }
        };

        shared.await
    }

    fn spawn_fetch<Fut>(&self, key: CacheKey, ttl: Duration, fetch: Fut) -> InFlight<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let store = self.clone();
        let task = tokio::spawn(async move {
            let result = fetch.await;
            if let Ok(value) = &result {
                store.insert(key.clone(), value.clone(), ttl).await;
            }
            store.in_flight.lock().await.remove(&key);
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(StockError::Other(format!("fetch task failed: {e}"))))
        }
        .boxed()
        .shared()
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.entries.write().await;
        let _ = entries.cache_remove(key);
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.cache_clear();
    }

    /// Number of stored entries, expired ones included until next access
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// One store per data category
#[derive(Clone)]
pub struct CacheManager {
    pub quotes: TtlStore<Quote>,
    pub history: TtlStore<PriceSeries>,
    pub financials: TtlStore<Vec<FinancialSnapshot>>,
}

impl CacheManager {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            quotes: TtlStore::new("quote", config.cache_ttl_quote),
            history: TtlStore::new("history", config.cache_ttl_history_max),
            financials: TtlStore::new("financial", config.cache_ttl_financial),
        }
    }

    /// Clear all caches
    pub async fn clear_all(&self) {
        self.quotes.clear().await;
        self.history.clear().await;
        self.financials.clear().await;
    }
}
