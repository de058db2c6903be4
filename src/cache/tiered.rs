//! Stale-while-revalidate read path over the memory, persistent and remote tiers.
//!
//! Read order:
//! 1. memory;
//! 2. persistent, when the entry is younger than the policy's freshness window.
//!    The value is served at once and a background revalidation is scheduled,
//!    at most once per key per cooldown;
//! 3. remote (shared policies only);
//! 4. a coalesced upstream fetch, written through to every enabled tier.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use metrics::{counter, gauge};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::error::FetchError;

use super::config::CacheConfig;
use super::keys::content_hash;
use super::tier::{CacheTier, MemoryCache};

const SOURCE: &str = "cache::tiered";
pub const METRIC_REVALIDATE: &str = "courtside_revalidate_total";
pub const METRIC_MEMORY_ENTRIES: &str = "courtside_cache_memory_entries";

/// Per-call caching rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    /// Memory TTL; also the remote expiry.
    pub ttl: Duration,
    /// Age under which a persistent entry is served. `None` skips the persistent tier.
    pub freshness: Option<Duration>,
    /// Whether the remote shared tier takes part.
    pub shared: bool,
}

impl ReadPolicy {
    pub const fn memory(ttl: Duration) -> Self {
        Self {
            ttl,
            freshness: None,
            shared: false,
        }
    }

    pub const fn persisted(ttl: Duration, freshness: Duration) -> Self {
        Self {
            ttl,
            freshness: Some(freshness),
            shared: false,
        }
    }

    pub const fn shared(self) -> Self {
        Self {
            shared: true,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub memory: usize,
    pub persistent: usize,
    pub remote: usize,
}

struct Tiers {
    memory: Arc<MemoryCache>,
    persistent: Option<Arc<dyn CacheTier>>,
    remote: Option<Arc<dyn CacheTier>>,
    /// Bumped on every write so a slow revalidation cannot clobber newer data.
    generations: DashMap<String, u64>,
}

impl Tiers {
    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).map(|entry| *entry).unwrap_or(0)
    }

    fn bump_generation(&self, key: &str) {
        *self.generations.entry(key.to_string()).or_insert(0) += 1;
    }

    async fn write_through(&self, key: &str, value: &Value, policy: ReadPolicy) {
        if policy.freshness.is_some()
            && let Some(persistent) = &self.persistent
        {
            persistent.set(key, value, policy.ttl).await;
        }
        if policy.shared
            && let Some(remote) = &self.remote
        {
            remote.set(key, value, policy.ttl).await;
        }
    }
}

pub struct TieredCache {
    tiers: Arc<Tiers>,
    cooldowns: DashMap<String, Instant>,
    cooldown: Duration,
    shutdown: watch::Sender<bool>,
}

impl TieredCache {
    /// Tiers left as `None` are skipped by every read and write.
    pub fn new(
        memory: Arc<MemoryCache>,
        persistent: Option<Arc<dyn CacheTier>>,
        remote: Option<Arc<dyn CacheTier>>,
        config: &CacheConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tiers: Arc::new(Tiers {
                memory,
                persistent,
                remote,
                generations: DashMap::new(),
            }),
            cooldowns: DashMap::new(),
            cooldown: config.revalidate_cooldown(),
            shutdown,
        }
    }

    pub fn memory(&self) -> &Arc<MemoryCache> {
        &self.tiers.memory
    }

    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        policy: ReadPolicy,
        fetch: F,
    ) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let tiers = &self.tiers;

        if let Some(entry) = tiers.memory.get(key).await
            && let Some(value) = decode(key, "memory", &entry.value)
        {
            return Ok(value);
        }

        let fetch = Arc::new(fetch);

        if let (Some(freshness), Some(persistent)) = (policy.freshness, &tiers.persistent)
            && let Some(entry) = persistent.get(key).await
        {
            let age = entry.age();
            if age <= freshness
                && let Some(value) = decode(key, "persistent", &entry.value)
            {
                debug!(
                    target = SOURCE,
                    cache = "persistent",
                    key,
                    outcome = "hit",
                    age_secs = age.as_secs()
                );
                tiers.memory.set(key, &entry.value, policy.ttl).await;
                self.schedule_revalidation(key, policy, &entry.value, Arc::clone(&fetch));
                return Ok(value);
            }
            debug!(
                target = SOURCE,
                cache = "persistent",
                key,
                outcome = "stale",
                age_secs = age.as_secs()
            );
        }

        if policy.shared
            && let Some(remote) = &tiers.remote
            && let Some(entry) = remote.get(key).await
            && let Some(value) = decode(key, "remote", &entry.value)
        {
            tiers.memory.set(key, &entry.value, policy.ttl).await;
            if policy.freshness.is_some()
                && let Some(persistent) = &tiers.persistent
            {
                persistent.set(key, &entry.value, policy.ttl).await;
            }
            return Ok(value);
        }

        let producer = {
            let tiers = Arc::clone(tiers);
            let key = key.to_string();
            async move {
                let value = encode(fetch().await?)?;
                tiers.bump_generation(&key);
                tiers.write_through(&key, &value, policy).await;
                Ok(value)
            }
            .boxed()
        };

        let value = tiers
            .memory
            .fetch_coalesced(key, policy.ttl, producer)
            .await?;
        serde_json::from_value(value)
            .map_err(|err| FetchError::malformed("cache", format!("{key}: {err}")))
    }

    /// Claims the revalidation slot for `key` unless one was claimed within the cooldown.
    fn claim_revalidation(&self, key: &str) -> bool {
        let now = Instant::now();
        match self.cooldowns.entry(key.to_string()) {
            Entry::Occupied(last) if now.duration_since(*last.get()) < self.cooldown => false,
            Entry::Occupied(mut last) => {
                last.insert(now);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    fn schedule_revalidation<T, F, Fut>(
        &self,
        key: &str,
        policy: ReadPolicy,
        cached: &Value,
        fetch: Arc<F>,
    ) where
        T: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if *self.shutdown.borrow() {
            return;
        }
        if !self.claim_revalidation(key) {
            counter!(METRIC_REVALIDATE, "outcome" => "cooldown").increment(1);
            return;
        }

        let tiers = Arc::clone(&self.tiers);
        let key = key.to_string();
        let cached_hash = content_hash(cached);
        let generation = tiers.generation(&key);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let fresh = tokio::select! {
                _ = shutdown.changed() => {
                    debug!(target = SOURCE, key = %key, "revalidation cancelled");
                    return;
                }
                fresh = fetch() => fresh,
            };

            let value = match fresh.and_then(encode) {
                Ok(value) => value,
                Err(err) => {
                    counter!(METRIC_REVALIDATE, "outcome" => "failed").increment(1);
                    warn!(
                        target = SOURCE,
                        key = %key,
                        error = %err,
                        "background revalidation failed"
                    );
                    return;
                }
            };

            if tiers.generation(&key) != generation {
                counter!(METRIC_REVALIDATE, "outcome" => "superseded").increment(1);
                debug!(target = SOURCE, key = %key, "revalidation superseded by a newer write");
                return;
            }

            if content_hash(&value) == cached_hash {
                if let Some(persistent) = &tiers.persistent {
                    persistent.touch(&key).await;
                }
                counter!(METRIC_REVALIDATE, "outcome" => "unchanged").increment(1);
                debug!(target = SOURCE, key = %key, "revalidation found identical payload");
                return;
            }

            tiers.bump_generation(&key);
            tiers.memory.set(&key, &value, policy.ttl).await;
            tiers.write_through(&key, &value, policy).await;
            counter!(METRIC_REVALIDATE, "outcome" => "updated").increment(1);
            debug!(target = SOURCE, key = %key, "revalidation stored a newer payload");
        });
    }

    /// Drops `key` from every tier so the next read goes upstream.
    pub async fn invalidate(&self, key: &str) {
        self.tiers.bump_generation(key);
        self.tiers.memory.delete(key).await;
        if let Some(persistent) = &self.tiers.persistent {
            persistent.delete(key).await;
        }
        if let Some(remote) = &self.tiers.remote {
            remote.delete(key).await;
        }
    }

    pub async fn clear_memory(&self) {
        self.tiers.memory.clear().await;
    }

    pub async fn clear(&self) {
        self.tiers.memory.clear().await;
        if let Some(persistent) = &self.tiers.persistent {
            persistent.clear().await;
        }
        if let Some(remote) = &self.tiers.remote {
            remote.clear().await;
        }
        self.tiers.generations.clear();
        self.cooldowns.clear();
    }

    /// Sweeps expired entries from every tier and forgets elapsed cooldowns.
    pub async fn cleanup(&self) -> CleanupReport {
        let now = Instant::now();
        self.cooldowns
            .retain(|_, claimed| now.duration_since(*claimed) < self.cooldown);
        self.tiers
            .generations
            .retain(|key, _| self.cooldowns.contains_key(key));

        let mut report = CleanupReport {
            memory: self.tiers.memory.cleanup().await,
            ..CleanupReport::default()
        };
        if let Some(persistent) = &self.tiers.persistent {
            report.persistent = persistent.cleanup().await;
        }
        if let Some(remote) = &self.tiers.remote {
            report.remote = remote.cleanup().await;
        }
        gauge!(METRIC_MEMORY_ENTRIES).set(self.tiers.memory.len() as f64);
        report
    }

    /// Cancels pending background revalidations; later reads still work but
    /// no longer schedule any.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Flips to `true` once [`TieredCache::shutdown`] runs or the cache drops.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

impl Drop for TieredCache {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

fn decode<T: DeserializeOwned>(key: &str, tier: &'static str, value: &Value) -> Option<T> {
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            warn!(
                target = SOURCE,
                cache = tier,
                key,
                error = %err,
                "cached payload no longer decodes; treating as miss"
            );
            None
        }
    }
}

fn encode<T: Serialize>(value: T) -> Result<Value, FetchError> {
    serde_json::to_value(value).map_err(|err| FetchError::malformed("cache", err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use time::OffsetDateTime;

    use super::*;
    use crate::cache::tier::TierEntry;

    #[derive(Default)]
    struct RecordingTier {
        entries: Mutex<HashMap<String, TierEntry>>,
        touches: AtomicUsize,
        writes: AtomicUsize,
    }

    impl RecordingTier {
        fn seed(&self, key: &str, value: Value) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), TierEntry::new(value));
        }

        fn value(&self, key: &str) -> Option<Value> {
            self.entries
                .lock()
                .unwrap()
                .get(key)
                .map(|entry| entry.value.clone())
        }
    }

    #[async_trait]
    impl CacheTier for RecordingTier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn get(&self, key: &str) -> Option<TierEntry> {
            self.entries.lock().unwrap().get(key).cloned()
        }

        async fn set(&self, key: &str, value: &Value, _ttl: Duration) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.seed(key, value.clone());
        }

        async fn delete(&self, key: &str) {
            self.entries.lock().unwrap().remove(key);
        }

        async fn clear(&self) {
            self.entries.lock().unwrap().clear();
        }

        async fn cleanup(&self) -> usize {
            0
        }

        async fn touch(&self, key: &str) {
            self.touches.fetch_add(1, Ordering::SeqCst);
            if let Some(entry) = self.entries.lock().unwrap().get_mut(key) {
                entry.written_at = OffsetDateTime::now_utc();
            }
        }
    }

    struct Harness {
        cache: TieredCache,
        persistent: Arc<RecordingTier>,
        remote: Arc<RecordingTier>,
    }

    fn harness() -> Harness {
        let config = CacheConfig::default();
        let persistent = Arc::new(RecordingTier::default());
        let remote = Arc::new(RecordingTier::default());
        let cache = TieredCache::new(
            Arc::new(MemoryCache::new(&config)),
            Some(persistent.clone() as Arc<dyn CacheTier>),
            Some(remote.clone() as Arc<dyn CacheTier>),
            &config,
        );
        Harness {
            cache,
            persistent,
            remote,
        }
    }

    const POLICY: ReadPolicy =
        ReadPolicy::persisted(Duration::from_secs(30), Duration::from_secs(3600));

    type Ready = futures::future::Ready<Result<Value, FetchError>>;

    fn counting(
        calls: &Arc<AtomicUsize>,
        payload: Value,
    ) -> impl Fn() -> Ready + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(payload.clone()))
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn full_miss_writes_through_enabled_tiers() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));

        let value: Value = h
            .cache
            .get_or_fetch("reddit:index", POLICY.shared(), counting(&calls, json!({"k": 1})))
            .await
            .expect("fetch succeeds");

        assert_eq!(value, json!({"k": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.persistent.value("reddit:index"), Some(json!({"k": 1})));
        assert_eq!(h.remote.value("reddit:index"), Some(json!({"k": 1})));

        let again: Value = h
            .cache
            .get_or_fetch("reddit:index", POLICY.shared(), counting(&calls, json!({"k": 2})))
            .await
            .expect("memory hit");
        assert_eq!(again, json!({"k": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memory_only_policy_skips_other_tiers() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));

        let _: Value = h
            .cache
            .get_or_fetch(
                "boxscore:1",
                ReadPolicy::memory(Duration::from_secs(15)),
                counting(&calls, json!(1)),
            )
            .await
            .expect("fetch succeeds");

        assert_eq!(h.persistent.writes.load(Ordering::SeqCst), 0);
        assert_eq!(h.remote.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresh_persistent_entry_is_served_and_revalidated() {
        let h = harness();
        h.persistent.seed("scoreboard", json!({"events": ["old"]}));
        let calls = Arc::new(AtomicUsize::new(0));

        let served: Value = h
            .cache
            .get_or_fetch("scoreboard", POLICY, counting(&calls, json!({"events": ["new"]})))
            .await
            .expect("persistent hit");
        assert_eq!(served, json!({"events": ["old"]}));

        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.persistent.value("scoreboard"), Some(json!({"events": ["new"]})));

        let refreshed: Value = h
            .cache
            .get_or_fetch("scoreboard", POLICY, counting(&calls, json!(null)))
            .await
            .expect("memory hit");
        assert_eq!(refreshed, json!({"events": ["new"]}));
    }

    #[tokio::test]
    async fn identical_revalidation_only_touches_timestamp() {
        let h = harness();
        h.persistent.seed("scoreboard", json!({"events": []}));
        let calls = Arc::new(AtomicUsize::new(0));

        let _: Value = h
            .cache
            .get_or_fetch("scoreboard", POLICY, counting(&calls, json!({"events": []})))
            .await
            .expect("persistent hit");
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.persistent.touches.load(Ordering::SeqCst), 1);
        assert_eq!(h.persistent.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cooldown_limits_revalidation_per_key() {
        let h = harness();
        h.persistent.seed("scoreboard", json!({"events": []}));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            h.cache.clear_memory().await;
            let _: Value = h
                .cache
                .get_or_fetch("scoreboard", POLICY, counting(&calls, json!({"events": []})))
                .await
                .expect("persistent hit");
            settle().await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_persistent_entry_goes_upstream() {
        let h = harness();
        h.persistent.seed("scoreboard", json!("old"));
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = ReadPolicy::persisted(Duration::from_secs(30), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let value: Value = h
            .cache
            .get_or_fetch("scoreboard", policy, counting(&calls, json!("new")))
            .await
            .expect("upstream fetch");

        assert_eq!(value, json!("new"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_hit_fills_local_tiers() {
        let h = harness();
        h.remote.seed("reddit:comments:abc:top", json!({"comments": []}));
        let calls = Arc::new(AtomicUsize::new(0));

        let value: Value = h
            .cache
            .get_or_fetch(
                "reddit:comments:abc:top",
                POLICY.shared(),
                counting(&calls, json!(null)),
            )
            .await
            .expect("remote hit");

        assert_eq!(value, json!({"comments": []}));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.persistent.value("reddit:comments:abc:top"),
            Some(json!({"comments": []}))
        );
    }

    #[tokio::test]
    async fn invalidation_supersedes_inflight_revalidation() {
        let h = harness();
        h.persistent.seed("scoreboard", json!("cached"));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let gate = Arc::new(tokio::sync::Mutex::new(Some(gate)));

        let fetch = move || {
            let gate = Arc::clone(&gate);
            async move {
                if let Some(gate) = gate.lock().await.take() {
                    let _ = gate.await;
                }
                Ok::<_, FetchError>(json!("revalidated"))
            }
        };

        let _: Value = h
            .cache
            .get_or_fetch("scoreboard", POLICY, fetch)
            .await
            .expect("persistent hit");
        settle().await;

        h.cache.invalidate("scoreboard").await;
        h.persistent.seed("scoreboard", json!("written later"));
        let _ = release.send(());
        settle().await;

        assert_eq!(h.persistent.value("scoreboard"), Some(json!("written later")));
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_revalidation() {
        let h = harness();
        h.persistent.seed("scoreboard", json!("cached"));

        let fetch = || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, FetchError>(json!("never"))
        };
        let _: Value = h
            .cache
            .get_or_fetch("scoreboard", POLICY, fetch)
            .await
            .expect("persistent hit");

        h.cache.shutdown();
        settle().await;

        assert_eq!(h.persistent.value("scoreboard"), Some(json!("cached")));
        assert_eq!(h.persistent.writes.load(Ordering::SeqCst), 0);
    }
}
