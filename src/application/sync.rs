//! Background warmer for game-thread comments.
//!
//! Threads linked from the daily index are tracked until they go stale. Each
//! poll refetches the comment trees that waited longest, bypassing every
//! cached copy so the fresh tree lands in the shared tier for other replicas.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::join_all;
use metrics::{counter, gauge};
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::application::reddit::RedditService;
use crate::config::SyncSettings;
use crate::domain::reddit::{CommentSort, RedditPost, ThreadKind};

const SOURCE: &str = "courtside::application::sync";
pub const METRIC_SYNC_POLL: &str = "courtside_sync_poll_total";
pub const METRIC_SYNC_ACTIVE: &str = "courtside_sync_active_threads";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub discover_interval: Duration,
    pub poll_interval: Duration,
    /// Threads refreshed per poll.
    pub batch: usize,
    pub stale_after: Duration,
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            discover_interval: settings.discover_interval,
            poll_interval: settings.poll_interval,
            batch: settings.poll_batch.get(),
            stale_after: settings.stale_after,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveThread {
    pub post: RedditPost,
    pub kind: ThreadKind,
    pub pair_key: String,
    pub last_polled: Option<Instant>,
    pub tracked_at: Instant,
}

impl ActiveThread {
    /// Live threads read newest-first; post-game threads read best-first.
    pub fn sort(&self) -> CommentSort {
        match self.kind {
            ThreadKind::Live => CommentSort::New,
            ThreadKind::Post => CommentSort::Top,
        }
    }
}

pub struct ThreadSync {
    reddit: RedditService,
    active: DashMap<String, ActiveThread>,
    config: SyncConfig,
}

impl ThreadSync {
    pub fn new(reddit: RedditService, config: SyncConfig) -> Self {
        Self {
            reddit,
            active: DashMap::new(),
            config,
        }
    }

    /// Starts tracking `post`. Returns `false` when it is already tracked or
    /// was created too long ago to be worth polling.
    pub fn track(&self, post: RedditPost, kind: ThreadKind, pair_key: impl Into<String>) -> bool {
        if post.id.is_empty() || self.created_too_long_ago(&post) {
            return false;
        }
        match self.active.entry(post.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let pair_key = pair_key.into();
                debug!(
                    target = SOURCE,
                    post_id = %post.id,
                    kind = %kind,
                    pair_key = %pair_key,
                    "tracking thread"
                );
                slot.insert(ActiveThread {
                    post,
                    kind,
                    pair_key,
                    last_polled: None,
                    tracked_at: Instant::now(),
                });
                true
            }
        }
    }

    /// Tracks every thread the daily index links; returns how many are new.
    pub async fn discover(&self) -> usize {
        let index = self.reddit.index().await;
        let mut added = 0;
        for (pair_key, pair) in index {
            let threads = [(pair.gdt, ThreadKind::Live), (pair.pgt, ThreadKind::Post)];
            for (post, kind) in threads {
                if let Some(post) = post
                    && self.track(post, kind, pair_key.clone())
                {
                    added += 1;
                }
            }
        }
        self.record_active();
        if added > 0 {
            info!(
                target = SOURCE,
                added,
                active = self.active.len(),
                "threads discovered"
            );
        }
        added
    }

    /// Refetches the comment trees polled least recently, at most one batch.
    /// Returns how many refreshed successfully.
    pub async fn poll_once(&self) -> usize {
        self.prune();

        let mut due: Vec<(Option<Instant>, Instant, String)> = self
            .active
            .iter()
            .map(|entry| (entry.last_polled, entry.tracked_at, entry.key().clone()))
            .collect();
        due.sort();
        let batch: Vec<ActiveThread> = due
            .into_iter()
            .take(self.config.batch)
            .filter_map(|(_, _, id)| self.active.get(&id).map(|entry| entry.value().clone()))
            .collect();

        let results = join_all(batch.iter().map(|thread| {
            self.reddit.comments(
                &thread.post.id,
                thread.sort(),
                thread.post.permalink.as_deref(),
                true,
            )
        }))
        .await;

        let mut refreshed = 0;
        for (thread, result) in batch.iter().zip(results) {
            if let Some(mut entry) = self.active.get_mut(&thread.post.id) {
                entry.last_polled = Some(Instant::now());
            }
            match result {
                Ok(comments) => {
                    refreshed += 1;
                    counter!(METRIC_SYNC_POLL, "outcome" => "ok").increment(1);
                    debug!(
                        target = SOURCE,
                        post_id = %thread.post.id,
                        comments = comments.comments.len(),
                        "thread comments refreshed"
                    );
                }
                Err(err) => {
                    counter!(METRIC_SYNC_POLL, "outcome" => "error").increment(1);
                    warn!(
                        target = SOURCE,
                        post_id = %thread.post.id,
                        error = %err,
                        "thread poll failed"
                    );
                }
            }
        }
        refreshed
    }

    /// Snapshot of tracked threads, ordered by post id.
    pub fn active(&self) -> Vec<ActiveThread> {
        let mut threads: Vec<ActiveThread> =
            self.active.iter().map(|entry| entry.value().clone()).collect();
        threads.sort_by(|a, b| a.post.id.cmp(&b.post.id));
        threads
    }

    /// Runs discovery and polling on their intervals until `shutdown` flips.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut discover = tokio::time::interval(self.config.discover_interval);
            let mut poll = tokio::time::interval(self.config.poll_interval);
            discover.set_missed_tick_behavior(MissedTickBehavior::Delay);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                target = SOURCE,
                poll_secs = self.config.poll_interval.as_secs(),
                batch = self.config.batch,
                "thread sync started"
            );

            while !*shutdown.borrow() {
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = discover.tick() => {
                        self.discover().await;
                    }
                    _ = poll.tick() => {
                        self.poll_once().await;
                    }
                }
            }
            info!(target = SOURCE, "thread sync stopped");
        })
    }

    fn prune(&self) {
        let stale_after = self.config.stale_after;
        let before = self.active.len();
        self.active.retain(|_, thread| {
            thread.tracked_at.elapsed() <= stale_after && !self.created_too_long_ago(&thread.post)
        });
        let dropped = before.saturating_sub(self.active.len());
        if dropped > 0 {
            debug!(target = SOURCE, dropped, "stale threads dropped");
        }
        self.record_active();
    }

    fn created_too_long_ago(&self, post: &RedditPost) -> bool {
        post.created_utc.is_some_and(|created| {
            let now = OffsetDateTime::now_utc().unix_timestamp() as f64;
            now - created > self.config.stale_after.as_secs_f64()
        })
    }

    fn record_active(&self) {
        gauge!(METRIC_SYNC_ACTIVE).set(self.active.len() as f64);
    }
}
