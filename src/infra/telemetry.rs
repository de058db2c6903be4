use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{reddit, sync},
    cache,
    config::{LogFormat, LoggingSettings},
};

use super::{error::InfraError, upstream};

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            cache::metric_names::METRIC_HIT,
            Unit::Count,
            "Cache hits, labelled by tier."
        );
        describe_counter!(
            cache::metric_names::METRIC_MISS,
            Unit::Count,
            "Cache misses, labelled by tier."
        );
        describe_counter!(
            cache::metric_names::METRIC_EVICT,
            Unit::Count,
            "Memory cache evictions due to capacity."
        );
        describe_counter!(
            cache::metric_names::METRIC_JOIN,
            Unit::Count,
            "Callers that joined an in-flight fetch instead of starting one."
        );
        describe_counter!(
            cache::metric_names::METRIC_REVALIDATE,
            Unit::Count,
            "Background revalidations of stale persisted entries, labelled by outcome."
        );
        describe_gauge!(
            cache::metric_names::METRIC_MEMORY_ENTRIES,
            Unit::Count,
            "Entries held by the memory tier after the last cleanup."
        );
        describe_counter!(
            upstream::METRIC_UPSTREAM_ERROR,
            Unit::Count,
            "Failed upstream requests, labelled by provider and kind."
        );
        describe_histogram!(
            upstream::METRIC_UPSTREAM_FETCH_MS,
            Unit::Milliseconds,
            "Upstream request latency in milliseconds."
        );
        describe_counter!(
            reddit::METRIC_FALLBACK,
            Unit::Count,
            "Reddit lookups served by a subreddit-feed fallback, labelled by stage."
        );
        describe_counter!(
            sync::METRIC_SYNC_POLL,
            Unit::Count,
            "Background comment refreshes, labelled by outcome."
        );
        describe_gauge!(
            sync::METRIC_SYNC_ACTIVE,
            Unit::Count,
            "Threads the background warmer is tracking."
        );
    });
}
