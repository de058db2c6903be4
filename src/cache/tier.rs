//! Cache tier capability and the in-memory tier.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use crate::domain::error::FetchError;

use super::coalesce::Coalescer;
use super::config::CacheConfig;
use super::ttl::TtlCache;

pub const METRIC_HIT: &str = "courtside_cache_hit_total";
pub const METRIC_MISS: &str = "courtside_cache_miss_total";

/// Producer handed to [`CacheTier::get_or_fetch`].
pub type FetchFuture<'a> = BoxFuture<'a, Result<Value, FetchError>>;

/// A value read back from a tier together with the time it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct TierEntry {
    pub value: Value,
    pub written_at: OffsetDateTime,
}

impl TierEntry {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            written_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn age(&self) -> Duration {
        let elapsed = OffsetDateTime::now_utc() - self.written_at;
        elapsed.try_into().unwrap_or(Duration::ZERO)
    }
}

/// Operations shared by the memory, persistent and remote tiers.
///
/// Tiers never fail loudly: storage errors are logged by the implementation
/// and surface as a miss (reads) or a no-op (writes).
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Option<TierEntry>;

    async fn set(&self, key: &str, value: &Value, ttl: Duration);

    async fn delete(&self, key: &str);

    async fn clear(&self);

    /// Drops expired entries, returning how many were removed.
    async fn cleanup(&self) -> usize;

    /// Bumps the write timestamp of an existing entry without rewriting it.
    async fn touch(&self, _key: &str) {}

    /// Read-through: return the cached value or run `fetch` and store its result.
    async fn get_or_fetch<'a>(
        &'a self,
        key: &'a str,
        ttl: Duration,
        fetch: FetchFuture<'a>,
    ) -> Result<Value, FetchError> {
        if let Some(entry) = self.get(key).await {
            return Ok(entry.value);
        }
        let value = fetch.await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }
}

/// Process-wide bounded TTL cache with coalesced read-through.
pub struct MemoryCache {
    entries: TtlCache<TierEntry>,
    in_flight: Coalescer<Value>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: TtlCache::new(config.capacity_non_zero(), config.default_ttl()),
            in_flight: Coalescer::new(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.entries.default_ttl()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.in_flight()
    }

    fn lookup(&self, key: &str) -> Option<TierEntry> {
        let found = self.entries.get(key);
        let outcome = if found.is_some() { "hit" } else { "miss" };
        let metric = if found.is_some() { METRIC_HIT } else { METRIC_MISS };
        counter!(metric, "cache" => "memory").increment(1);
        debug!(target = "courtside::cache", cache = "memory", key, outcome);
        found
    }

    fn store(&self, key: &str, value: &Value, ttl: Duration) {
        self.entries.set(key, TierEntry::new(value.clone()), Some(ttl));
    }
}

#[async_trait]
impl CacheTier for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Option<TierEntry> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        self.store(key, value, ttl);
    }

    async fn delete(&self, key: &str) {
        self.entries.delete(key);
    }

    async fn clear(&self) {
        self.entries.clear();
    }

    async fn cleanup(&self) -> usize {
        self.entries.cleanup()
    }

    /// Concurrent misses for one key share a single `fetch`; the leader
    /// re-checks the cache first and stores the value before waking waiters.
    async fn get_or_fetch<'a>(
        &'a self,
        key: &'a str,
        ttl: Duration,
        fetch: FetchFuture<'a>,
    ) -> Result<Value, FetchError> {
        if let Some(entry) = self.lookup(key) {
            return Ok(entry.value);
        }
        self.fetch_coalesced(key, ttl, fetch).await
    }
}

impl MemoryCache {
    /// Coalesced fetch without the initial lookup; the caller has already missed.
    pub(crate) async fn fetch_coalesced(
        &self,
        key: &str,
        ttl: Duration,
        fetch: FetchFuture<'_>,
    ) -> Result<Value, FetchError> {
        self.in_flight
            .run(key, || async move {
                if let Some(entry) = self.entries.get(key) {
                    return Ok(entry.value);
                }
                let value = fetch.await?;
                self.store(key, &value, ttl);
                Ok(value)
            })
            .await
    }
}
