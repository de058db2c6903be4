//! Caching layers for upstream payloads.
//!
//! - [`TtlCache`]: bounded map with per-entry expiry and insertion-order eviction.
//! - [`Coalescer`]: single-flight for concurrent fetches of one key.
//! - [`MemoryCache`]: the two above behind the [`CacheTier`] capability.
//! - [`TieredCache`]: stale-while-revalidate over memory, persistent and remote tiers.
//!
//! Persistent and remote tiers live in `infra` and are injected at bootstrap.

mod coalesce;
mod config;
mod keys;
mod lock;
mod tier;
mod tiered;
mod ttl;

pub use coalesce::Coalescer;
pub use config::CacheConfig;
pub use keys::{CacheKey, content_hash};
pub use tier::{CacheTier, FetchFuture, MemoryCache, TierEntry};
pub use tiered::{CleanupReport, ReadPolicy, TieredCache};
pub use ttl::TtlCache;

/// Metric names recorded by this module.
pub mod metric_names {
    pub use super::coalesce::METRIC_JOIN;
    pub use super::tier::{METRIC_HIT, METRIC_MISS};
    pub use super::tiered::{METRIC_MEMORY_ENTRIES, METRIC_REVALIDATE};
    pub use super::ttl::METRIC_EVICT;
}
