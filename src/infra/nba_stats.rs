//! Leaders provider backed by the stats.nba.com league dashboards.
//!
//! The dashboards refuse requests that do not look like they come from
//! nba.com, so every call carries the site's origin and referer.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::Value;
use url::Url;

use crate::application::providers::{DashTable, LeadersProvider};
use crate::config::UpstreamSettings;
use crate::domain::error::FetchError;
use crate::domain::leaders::PerMode;

use super::upstream::{ACCEPT_JSON, BROWSER_USER_AGENT, Upstream, join_path};

const PROVIDER: &str = "nba_stats";
const ORIGIN: &str = "https://www.nba.com";
const REFERER: &str = "https://www.nba.com/";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const SEASON_TYPE: &str = "Regular Season";

/// Filters every dashboard request pins to "whole league, whole season".
const DASH_FILTERS: [(&str, &str); 22] = [
    ("DateFrom", ""),
    ("DateTo", ""),
    ("GameScope", ""),
    ("GameSegment", ""),
    ("LastNGames", "0"),
    ("LeagueID", "00"),
    ("Location", ""),
    ("MeasureType", "Base"),
    ("Month", "0"),
    ("OpponentTeamID", "0"),
    ("Outcome", ""),
    ("PORound", "0"),
    ("PaceAdjust", "N"),
    ("Period", "0"),
    ("PlusMinus", "N"),
    ("Rank", "N"),
    ("SeasonSegment", ""),
    ("ShotClockRange", ""),
    ("TeamID", "0"),
    ("TwoWay", "0"),
    ("VsConference", ""),
    ("VsDivision", ""),
];

#[derive(Clone, Debug)]
pub struct StatsClient {
    upstream: Upstream,
    base: Url,
}

impl StatsClient {
    pub fn new(client: Client, base: Url) -> Self {
        Self {
            upstream: Upstream::new(client, PROVIDER),
            base,
        }
    }

    pub fn from_settings(client: Client, settings: &UpstreamSettings) -> Self {
        Self::new(client, settings.nba_stats_base.clone())
    }

    fn dash_url(&self, table: DashTable, season: &str, per_mode: PerMode) -> Url {
        let mut url = join_path(&self.base, &["stats", table.endpoint()]);
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in DASH_FILTERS {
                query.append_pair(name, value);
            }
            query
                .append_pair("PerMode", per_mode.as_str())
                .append_pair("Season", season)
                .append_pair("SeasonType", SEASON_TYPE);
            if table == DashTable::Players {
                query.append_pair("StarterBench", "");
            }
        }
        url
    }
}

#[async_trait]
impl LeadersProvider for StatsClient {
    async fn league_dash(
        &self,
        table: DashTable,
        season: &str,
        per_mode: PerMode,
    ) -> Result<Value, FetchError> {
        let request = self
            .upstream
            .get(self.dash_url(table, season, per_mode))
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .header(header::ACCEPT, ACCEPT_JSON)
            .header(header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .header(header::ORIGIN, ORIGIN)
            .header(header::REFERER, REFERER);
        self.upstream.get_json(table.endpoint(), request).await
    }
}
