//! Scores façade: scoreboard, box scores and standings behind the tiered cache.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::application::providers::ScoresProvider;
use crate::application::transform::{transform_boxscore, transform_scoreboard, transform_standings};
use crate::cache::{CacheKey, ReadPolicy, TieredCache};
use crate::domain::error::FetchError;
use crate::domain::nba::{BoxscoreResponse, ScoreboardResponse, StandingsResponse};

const SOURCE: &str = "courtside::application::nba";
const SCOREBOARD_TTL: Duration = Duration::from_secs(30);
const BOXSCORE_TTL: Duration = Duration::from_secs(15);
const STANDINGS_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct NbaService {
    provider: Arc<dyn ScoresProvider>,
    cache: Arc<TieredCache>,
    /// Age under which a persisted scoreboard is served while it revalidates.
    freshness: Duration,
}

impl NbaService {
    pub fn new(
        provider: Arc<dyn ScoresProvider>,
        cache: Arc<TieredCache>,
        freshness: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            freshness,
        }
    }

    /// Scoreboard for a `YYYYMMDD` date, or today.
    pub async fn scoreboard(&self, date: Option<&str>) -> Result<ScoreboardResponse, FetchError> {
        let key = CacheKey::Scoreboard(date).render();
        let provider = Arc::clone(&self.provider);
        let date = date.map(str::to_string);

        self.cache
            .get_or_fetch(
                &key,
                ReadPolicy::persisted(SCOREBOARD_TTL, self.freshness),
                move || {
                    let provider = Arc::clone(&provider);
                    let date = date.clone();
                    async move {
                        provider
                            .scoreboard(date.as_deref())
                            .await
                            .map(transform_scoreboard)
                    }
                },
            )
            .await
    }

    pub async fn boxscore(&self, event_id: &str) -> Result<BoxscoreResponse, FetchError> {
        let key = CacheKey::Boxscore(event_id).render();
        let service = self.clone();
        let event_id = event_id.to_string();

        self.cache
            .get_or_fetch(&key, ReadPolicy::memory(BOXSCORE_TTL), move || {
                let service = service.clone();
                let event_id = event_id.clone();
                async move { service.fetch_boxscore(&event_id).await }
            })
            .await
    }

    /// Summary and today's scoreboard are fetched together; a failed or
    /// non-matching scoreboard leaves a summary-only box score.
    async fn fetch_boxscore(&self, event_id: &str) -> Result<BoxscoreResponse, FetchError> {
        let (summary, scoreboard) =
            tokio::join!(self.provider.summary(event_id), self.scoreboard(None));
        let summary = summary?;

        let scoreboard = match scoreboard {
            Ok(scoreboard) => Some(scoreboard),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    event_id,
                    error = %err,
                    "scoreboard unavailable for box score join"
                );
                None
            }
        };
        let event = scoreboard
            .as_ref()
            .and_then(|scoreboard| scoreboard.event(event_id));
        if event.is_none() {
            debug!(target = SOURCE, event_id, "event not on today's scoreboard");
        }

        Ok(transform_boxscore(&summary, event))
    }

    /// League standings; `force_refresh` drops the cached copy first.
    pub async fn standings(&self, force_refresh: bool) -> Result<StandingsResponse, FetchError> {
        let key = CacheKey::Standings.render();
        if force_refresh {
            self.cache.invalidate(&key).await;
        }
        let provider = Arc::clone(&self.provider);

        self.cache
            .get_or_fetch(&key, ReadPolicy::memory(STANDINGS_TTL), move || {
                let provider = Arc::clone(&provider);
                async move {
                    let raw = provider.standings().await?;
                    Ok(transform_standings(&raw))
                }
            })
            .await
    }

    /// Warms every box score concurrently; returns how many succeeded.
    pub async fn prewarm_boxscores(&self, event_ids: &[String]) -> usize {
        let results = join_all(event_ids.iter().map(|id| self.boxscore(id))).await;
        let mut warmed = 0;
        for (event_id, result) in event_ids.iter().zip(results) {
            match result {
                Ok(_) => warmed += 1,
                Err(err) => warn!(
                    target = SOURCE,
                    event_id = %event_id,
                    error = %err,
                    "box score prewarm failed"
                ),
            }
        }
        warmed
    }
}
