//! Bounded map with per-entry expiry.
//!
//! Capacity is enforced by evicting the oldest *inserted* entry. Reads and
//! overwrites never refresh an entry's position, so the `LruCache` underneath
//! degenerates to insertion order.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::ttl";
pub const METRIC_EVICT: &str = "courtside_cache_evict_total";

struct Slot<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> Slot<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, Slot<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: NonZeroUsize, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Live value for `key`. An expired entry is removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let now = Instant::now();
        match entries.peek(key) {
            Some(slot) if !slot.is_expired(now) => Some(slot.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Stores `value`, evicting the oldest entry when a new key arrives at capacity.
    ///
    /// Returns the evicted key, if any.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Option<String> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "set");

        if let Some(slot) = entries.peek_mut(key) {
            slot.value = value;
            slot.stored_at = now;
            slot.ttl = ttl;
            return None;
        }

        let evicted = entries
            .push(
                key.to_string(),
                Slot {
                    value,
                    stored_at: now,
                    ttl,
                },
            )
            .map(|(evicted_key, _)| evicted_key);

        if let Some(evicted_key) = &evicted {
            counter!(METRIC_EVICT, "cache" => "memory").increment(1);
            debug!(target = SOURCE, key = %evicted_key, "evicted oldest entry at capacity");
        }
        evicted
    }

    pub fn delete(&self, key: &str) -> bool {
        mutex_lock(&self.entries, SOURCE, "delete")
            .pop(key)
            .is_some()
    }

    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "cleanup");
        let now = Instant::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, slot)| slot.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> TtlCache<u32> {
        TtlCache::new(
            NonZeroUsize::new(capacity).expect("non-zero capacity"),
            Duration::from_secs(300),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn entry_survives_until_ttl_passes() {
        let cache = cache(4);
        cache.set("scoreboard", 1, Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get("scoreboard"), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("scoreboard"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_oldest_insert_even_after_reads() {
        let cache = cache(2);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        assert_eq!(cache.get("a"), Some(1));

        let evicted = cache.set("c", 3, None);

        assert_eq!(evicted.as_deref(), Some("a"));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn overwriting_existing_key_never_evicts() {
        let cache = cache(2);
        cache.set("a", 1, None);
        cache.set("b", 2, None);

        assert!(cache.set("a", 10, None).is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_refreshes_timestamp_and_ttl() {
        let cache = cache(2);
        cache.set("k", 1, Some(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", 2, Some(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_drops_only_expired_entries() {
        let cache = cache(8);
        cache.set("short", 1, Some(Duration::from_secs(1)));
        cache.set("long", 2, Some(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn delete_and_clear() {
        let cache = cache(4);
        cache.set("a", 1, None);
        cache.set("b", 2, None);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
