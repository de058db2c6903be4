use std::{process, sync::Arc, time::Duration};

use courtside::{
    application::{
        LeadersService, NbaService, RedditService, SyncConfig, ThreadResolver, ThreadSync,
        error::AppError, threads::Matchup,
    },
    cache::{CacheConfig, CacheTier, MemoryCache, TieredCache},
    config,
    infra::{
        error::InfraError,
        espn::EspnClient,
        http::{self, AppState, RedditBridge},
        nba_stats::StatsClient,
        reddit::RedditClient,
        remote::RemoteCache,
        store::SqliteStore,
        telemetry, upstream,
    },
};
use futures::future::join_all;
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const SOURCE: &str = "courtside::bootstrap";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Warm(args) => run_warm(settings, args).await,
    }
}

struct ApplicationContext {
    cache: Arc<TieredCache>,
    nba: NbaService,
    leaders: LeadersService,
    threads: ThreadResolver,
    bridge: RedditBridge,
    cleanup_interval: Duration,
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let client = upstream::build_client(settings.upstream.timeout)?;
    let cache_config = CacheConfig::from(&settings.cache);

    let persistent: Option<Arc<dyn CacheTier>> = match settings.store.url.as_deref() {
        Some(url) => {
            let store = SqliteStore::connect(url, settings.store.retention).await?;
            info!(target = SOURCE, url, "persistent cache enabled");
            Some(Arc::new(store))
        }
        None => None,
    };
    let remote: Option<Arc<dyn CacheTier>> =
        RemoteCache::from_settings(client.clone(), &settings.remote).map(|remote| {
            info!(target = SOURCE, table = %settings.remote.table, "remote cache enabled");
            Arc::new(remote) as Arc<dyn CacheTier>
        });

    let cache = Arc::new(TieredCache::new(
        Arc::new(MemoryCache::new(&cache_config)),
        persistent,
        remote,
        &cache_config,
    ));

    let nba = NbaService::new(
        Arc::new(EspnClient::from_settings(client.clone(), &settings.upstream)),
        Arc::clone(&cache),
        cache_config.freshness_window(),
    );
    let leaders = LeadersService::new(
        Arc::new(StatsClient::from_settings(client.clone(), &settings.upstream)),
        Arc::clone(&cache),
    );
    let reddit = RedditService::new(
        Arc::new(RedditClient::from_settings(client.clone(), &settings.upstream)),
        Arc::clone(&cache),
        settings.upstream.subreddit.as_str(),
    );
    if settings.upstream.reddit_proxy_base.is_some() {
        info!(target = SOURCE, "reddit requests routed through the proxy bridge");
    }

    Ok(ApplicationContext {
        cache,
        nba,
        leaders,
        threads: ThreadResolver::new(reddit),
        bridge: RedditBridge::new(settings.upstream.timeout)?,
        cleanup_interval: cache_config.cleanup_interval(),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    let cleanup_handle = {
        let cache = Arc::clone(&app.cache);
        let interval = app.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip the first immediate tick
            loop {
                ticker.tick().await;
                let report = cache.cleanup().await;
                info!(
                    target = SOURCE,
                    memory = report.memory,
                    persistent = report.persistent,
                    remote = report.remote,
                    "cache cleanup finished"
                );
            }
        })
    };

    let sync_handle = settings.sync.enabled.then(|| {
        let sync = Arc::new(ThreadSync::new(
            app.threads.reddit().clone(),
            SyncConfig::from(&settings.sync),
        ));
        sync.spawn(app.cache.shutdown_signal())
    });

    let state = AppState {
        nba: app.nba,
        leaders: app.leaders,
        threads: app.threads,
        bridge: app.bridge,
    };
    let result = serve_http(&settings, state).await;

    cleanup_handle.abort();
    let _ = cleanup_handle.await;
    app.cache.shutdown();
    if let Some(handle) = sync_handle {
        let _ = handle.await;
    }

    result
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = SOURCE, addr = %settings.server.addr, "listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        finished = &mut server => {
            return match finished {
                Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
                Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
            };
        }
        _ = shutdown_signal() => {
            info!(target = SOURCE, "shutdown requested; draining connections");
        }
    }

    let _ = stop_tx.send(());
    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(Ok(result)) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server task failed: {err}"))),
        Err(_) => {
            warn!(
                target = SOURCE,
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = SOURCE, error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = SOURCE, error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run_warm(settings: config::Settings, args: config::WarmArgs) -> Result<(), AppError> {
    let date = args.date.filter(|date| !date.is_empty());
    if let Some(date) = date.as_deref()
        && (date.len() != 8 || !date.bytes().all(|byte| byte.is_ascii_digit()))
    {
        return Err(AppError::validation(format!(
            "warm --date must be YYYYMMDD, got `{date}`"
        )));
    }
    let app = build_application_context(&settings).await?;

    let scoreboard = app.nba.scoreboard(date.as_deref()).await?;
    let event_ids: Vec<String> = scoreboard
        .events
        .iter()
        .map(|event| event.id.clone())
        .collect();
    let boxscores = app.nba.prewarm_boxscores(&event_ids).await;

    let matchups: Vec<Matchup> = scoreboard
        .events
        .iter()
        .filter_map(|event| {
            let (away, home) = event.team_names()?;
            Some(Matchup {
                event_date: Some(event.date.clone()),
                event_id: Some(event.id.clone()),
                ..Matchup::new(away, home)
            })
        })
        .collect();
    let resolved = join_all(matchups.iter().map(|matchup| app.threads.prewarm(matchup))).await;
    let threads = resolved
        .iter()
        .map(|threads| {
            usize::from(threads.live_thread.is_some()) + usize::from(threads.post_thread.is_some())
        })
        .sum::<usize>();

    info!(
        target = SOURCE,
        events = event_ids.len(),
        boxscores,
        threads,
        "cache warm finished"
    );
    app.cache.shutdown();
    Ok(())
}
