//! Season leaders façade: league dashboards behind the memory tier.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::debug;

use crate::application::providers::{DashTable, LeadersProvider};
use crate::application::transform::stat_table;
use crate::cache::{CacheKey, ReadPolicy, TieredCache};
use crate::domain::error::FetchError;
use crate::domain::leaders::{BulkLeaders, PerMode, SeasonLeaders, SeasonPlayers, season_for};

const SOURCE: &str = "courtside::application::leaders";
const LEADERS_TTL: Duration = Duration::from_secs(10 * 60);
const LEADERS_POLICY: ReadPolicy = ReadPolicy::memory(LEADERS_TTL);

#[derive(Clone)]
pub struct LeadersService {
    provider: Arc<dyn LeadersProvider>,
    cache: Arc<TieredCache>,
}

impl LeadersService {
    pub fn new(provider: Arc<dyn LeadersProvider>, cache: Arc<TieredCache>) -> Self {
        Self { provider, cache }
    }

    /// Label of the season in progress (or the last one, over the summer).
    pub fn current_season() -> String {
        season_for(OffsetDateTime::now_utc().date())
    }

    /// Player and team dashboards for `season`, fetched together.
    pub async fn season_leaders(
        &self,
        season: &str,
        per_mode: PerMode,
    ) -> Result<SeasonLeaders, FetchError> {
        let key = CacheKey::SeasonLeaders { season, per_mode }.render();
        let provider = Arc::clone(&self.provider);
        let season = season.to_string();

        self.cache
            .get_or_fetch(&key, LEADERS_POLICY, move || {
                let provider = Arc::clone(&provider);
                let season = season.clone();
                async move {
                    let (players, teams) = tokio::try_join!(
                        provider.league_dash(DashTable::Players, &season, per_mode),
                        provider.league_dash(DashTable::Teams, &season, per_mode),
                    )?;
                    Ok(SeasonLeaders {
                        season,
                        players: stat_table(&players),
                        teams: stat_table(&teams),
                    })
                }
            })
            .await
    }

    /// Per-game player dashboard for one season.
    pub async fn season_players(&self, season: &str) -> Result<SeasonPlayers, FetchError> {
        let key = CacheKey::SeasonPlayers(season).render();
        let provider = Arc::clone(&self.provider);
        let season = season.to_string();

        self.cache
            .get_or_fetch(&key, LEADERS_POLICY, move || {
                let provider = Arc::clone(&provider);
                let season = season.clone();
                async move {
                    let players = provider
                        .league_dash(DashTable::Players, &season, PerMode::PerGame)
                        .await?;
                    Ok(SeasonPlayers {
                        season,
                        players: stat_table(&players),
                    })
                }
            })
            .await
    }

    /// Player dashboards for several seasons, one at a time and in the
    /// order given. The first failure fails the whole batch.
    pub async fn bulk(&self, seasons: &[String]) -> Result<BulkLeaders, FetchError> {
        let mut tables = Vec::with_capacity(seasons.len());
        for season in seasons {
            tables.push(self.season_players(season).await?);
        }
        debug!(target = SOURCE, seasons = tables.len(), "bulk leaders assembled");
        Ok(BulkLeaders { seasons: tables })
    }
}
