//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides, StorageOverrides, WarmArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "courtside";
const ENV_PREFIX: &str = "COURTSIDE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_CACHE_CAPACITY: usize = 400;
const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;
const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 6 * 60 * 60;
const DEFAULT_REVALIDATE_COOLDOWN_SECS: u64 = 60;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
const DEFAULT_STORE_URL: &str = "sqlite://courtside-cache.db";
const DEFAULT_STORE_RETENTION_SECS: u64 = 2 * 24 * 60 * 60;
const DEFAULT_REMOTE_TABLE: &str = "reddit_cache";
const DEFAULT_ESPN_SITE_BASE: &str = "https://site.api.espn.com";
const DEFAULT_ESPN_WEB_BASE: &str = "https://site.web.api.espn.com";
const DEFAULT_NBA_STATS_BASE: &str = "https://stats.nba.com";
const DEFAULT_REDDIT_BASE: &str = "https://www.reddit.com";
const DEFAULT_SUBREDDIT: &str = "nba";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SYNC_DISCOVER_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_SYNC_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_SYNC_POLL_BATCH: usize = 3;
const DEFAULT_SYNC_STALE_AFTER_SECS: u64 = 36 * 60 * 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub store: StoreSettings,
    pub remote: RemoteSettings,
    pub upstream: UpstreamSettings,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub capacity: NonZeroUsize,
    pub default_ttl_ms: u64,
    pub freshness_window_secs: u64,
    pub revalidate_cooldown_secs: u64,
    pub cleanup_interval_secs: NonZeroU64,
}

/// Persistent local tier; `url: None` disables it.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: Option<String>,
    pub retention: Duration,
}

/// Remote shared tier; `url: None` disables it.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub url: Option<Url>,
    pub api_key: Option<String>,
    pub table: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub espn_site_base: Url,
    pub espn_web_base: Url,
    pub nba_stats_base: Url,
    pub reddit_base: Url,
    /// Same-origin bridge for Reddit; direct requests when `None`.
    pub reddit_proxy_base: Option<Url>,
    pub subreddit: String,
    pub timeout: Duration,
}

/// Background thread warmer that keeps tracked comment trees in the shared tier.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub enabled: bool,
    pub discover_interval: Duration,
    pub poll_interval: Duration,
    pub poll_batch: NonZeroUsize,
    /// Threads created longer ago than this are dropped.
    pub stale_after: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Warm(args)) => raw.apply_storage_overrides(&args.storage),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    store: RawStoreSettings,
    remote: RawRemoteSettings,
    upstream: RawUpstreamSettings,
    sync: RawSyncSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(enabled) = overrides.sync {
            self.sync.enabled = Some(enabled);
        }
        self.apply_storage_overrides(&overrides.storage);
    }

    fn apply_storage_overrides(&mut self, overrides: &StorageOverrides) {
        if let Some(url) = overrides.store_url.as_ref() {
            self.store.url = Some(url.clone());
        }
        if let Some(url) = overrides.remote_url.as_ref() {
            self.remote.url = Some(url.clone());
        }
        if let Some(base) = overrides.reddit_proxy_base.as_ref() {
            self.upstream.reddit_proxy_base = Some(base.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            store,
            remote,
            upstream,
            sync,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            store: build_store_settings(store)?,
            remote: build_remote_settings(remote)?,
            upstream: build_upstream_settings(upstream)?,
            sync: build_sync_settings(sync)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;
    let default_ttl_ms = cache.default_ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS);
    if default_ttl_ms == 0 {
        return Err(LoadError::invalid(
            "cache.default_ttl_ms",
            "must be greater than zero",
        ));
    }
    let cleanup_interval_secs = non_zero_u64(
        cache
            .cleanup_interval_secs
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
        "cache.cleanup_interval_secs",
    )?;

    Ok(CacheSettings {
        capacity,
        default_ttl_ms,
        freshness_window_secs: cache
            .freshness_window_secs
            .unwrap_or(DEFAULT_FRESHNESS_WINDOW_SECS),
        revalidate_cooldown_secs: cache
            .revalidate_cooldown_secs
            .unwrap_or(DEFAULT_REVALIDATE_COOLDOWN_SECS),
        cleanup_interval_secs,
    })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let url = match store.url {
        Some(value) => trimmed(value),
        None => Some(DEFAULT_STORE_URL.to_string()),
    };
    if let Some(url) = url.as_deref()
        && !url.starts_with("sqlite:")
    {
        return Err(LoadError::invalid(
            "store.url",
            format!("`{url}` is not a sqlite URL"),
        ));
    }
    let retention = non_zero_u64(
        store.retention_secs.unwrap_or(DEFAULT_STORE_RETENTION_SECS),
        "store.retention_secs",
    )?;

    Ok(StoreSettings {
        url,
        retention: Duration::from_secs(retention.get()),
    })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let url = remote
        .url
        .and_then(trimmed)
        .map(|value| parse_url(&value, "remote.url"))
        .transpose()?;
    let table = remote
        .table
        .and_then(trimmed)
        .unwrap_or_else(|| DEFAULT_REMOTE_TABLE.to_string());

    Ok(RemoteSettings {
        url,
        api_key: remote.api_key.and_then(trimmed),
        table,
    })
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let base = |value: Option<String>, default: &str, key: &'static str| {
        let value = value.and_then(trimmed).unwrap_or_else(|| default.to_string());
        parse_url(&value, key)
    };
    let timeout = non_zero_u64(
        upstream.timeout_secs.unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        "upstream.timeout_secs",
    )?;
    let subreddit = upstream
        .subreddit
        .and_then(trimmed)
        .unwrap_or_else(|| DEFAULT_SUBREDDIT.to_string());
    if !subreddit
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(LoadError::invalid(
            "upstream.subreddit",
            format!("`{subreddit}` is not a subreddit name"),
        ));
    }

    Ok(UpstreamSettings {
        espn_site_base: base(
            upstream.espn_site_base,
            DEFAULT_ESPN_SITE_BASE,
            "upstream.espn_site_base",
        )?,
        espn_web_base: base(
            upstream.espn_web_base,
            DEFAULT_ESPN_WEB_BASE,
            "upstream.espn_web_base",
        )?,
        nba_stats_base: base(
            upstream.nba_stats_base,
            DEFAULT_NBA_STATS_BASE,
            "upstream.nba_stats_base",
        )?,
        reddit_base: base(
            upstream.reddit_base,
            DEFAULT_REDDIT_BASE,
            "upstream.reddit_base",
        )?,
        reddit_proxy_base: upstream
            .reddit_proxy_base
            .and_then(trimmed)
            .map(|value| parse_url(&value, "upstream.reddit_proxy_base"))
            .transpose()?,
        subreddit,
        timeout: Duration::from_secs(timeout.get()),
    })
}

fn build_sync_settings(sync: RawSyncSettings) -> Result<SyncSettings, LoadError> {
    let seconds = |value: Option<u64>, default: u64, key: &'static str| {
        non_zero_u64(value.unwrap_or(default), key).map(|secs| Duration::from_secs(secs.get()))
    };

    Ok(SyncSettings {
        enabled: sync.enabled.unwrap_or(false),
        discover_interval: seconds(
            sync.discover_interval_secs,
            DEFAULT_SYNC_DISCOVER_INTERVAL_SECS,
            "sync.discover_interval_secs",
        )?,
        poll_interval: seconds(
            sync.poll_interval_secs,
            DEFAULT_SYNC_POLL_INTERVAL_SECS,
            "sync.poll_interval_secs",
        )?,
        poll_batch: NonZeroUsize::new(sync.poll_batch.unwrap_or(DEFAULT_SYNC_POLL_BATCH))
            .ok_or_else(|| LoadError::invalid("sync.poll_batch", "must be greater than zero"))?,
        stale_after: seconds(
            sync.stale_after_secs,
            DEFAULT_SYNC_STALE_AFTER_SECS,
            "sync.stale_after_secs",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    capacity: Option<usize>,
    default_ttl_ms: Option<u64>,
    freshness_window_secs: Option<u64>,
    revalidate_cooldown_secs: Option<u64>,
    cleanup_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    url: Option<String>,
    retention_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    url: Option<String>,
    api_key: Option<String>,
    table: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    espn_site_base: Option<String>,
    espn_web_base: Option<String>,
    nba_stats_base: Option<String>,
    reddit_base: Option<String>,
    reddit_proxy_base: Option<String>,
    subreddit: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSyncSettings {
    enabled: Option<bool>,
    discover_interval_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    poll_batch: Option<usize>,
    stale_after_secs: Option<u64>,
}

fn trimmed(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    Url::parse(value).map_err(|err| LoadError::invalid(key, format!("`{value}`: {err}")))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
