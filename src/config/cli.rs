use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the courtside binary.
#[derive(Debug, Parser)]
#[command(
    name = "courtside",
    version,
    about = "NBA scores and Reddit game threads behind a tiered cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "COURTSIDE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Load today's scoreboard, box scores and threads into the cache, then exit.
    Warm(WarmArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverrides {
    /// Override the persistent cache store URL; an empty value disables the tier.
    #[arg(long = "store-url", value_name = "URL")]
    pub store_url: Option<String>,

    /// Override the remote shared cache URL.
    #[arg(long = "remote-url", value_name = "URL")]
    pub remote_url: Option<String>,

    /// Route Reddit requests through a same-origin proxy at this base URL.
    #[arg(long = "reddit-proxy-base", value_name = "URL")]
    pub reddit_proxy_base: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub storage: StorageOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the in-memory cache capacity.
    #[arg(long = "cache-capacity", value_name = "ENTRIES")]
    pub cache_capacity: Option<usize>,

    /// Toggle the background comment warmer.
    #[arg(
        long = "sync",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub sync: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WarmArgs {
    #[command(flatten)]
    pub storage: StorageOverrides,

    /// Scoreboard date to warm (`YYYYMMDD`); today when omitted.
    #[arg(long = "date", value_name = "YYYYMMDD")]
    pub date: Option<String>,
}
