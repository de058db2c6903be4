//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 400;
const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;
const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 6 * 60 * 60;
const DEFAULT_REVALIDATE_COOLDOWN_SECS: u64 = 60;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries held by the in-memory tier.
    pub capacity: usize,
    /// TTL applied when a caller does not pass one.
    pub default_ttl_ms: u64,
    /// How long a persistent-tier entry is served without going upstream.
    pub freshness_window_secs: u64,
    /// Minimum gap between two background revalidations of one key.
    pub revalidate_cooldown_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_ttl_ms: DEFAULT_TTL_MS,
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
            revalidate_cooldown_secs: DEFAULT_REVALIDATE_COOLDOWN_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            capacity: settings.capacity.get(),
            default_ttl_ms: settings.default_ttl_ms,
            freshness_window_secs: settings.freshness_window_secs,
            revalidate_cooldown_secs: settings.revalidate_cooldown_secs,
            cleanup_interval_secs: settings.cleanup_interval_secs.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn revalidate_cooldown(&self) -> Duration {
        Duration::from_secs(self.revalidate_cooldown_secs)
    }

    /// Cleanup cadence, never shorter than one second.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}
