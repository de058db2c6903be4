//! Scores provider backed by ESPN's public site APIs.

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::application::providers::{RawScoreboard, RawStandings, RawSummary, ScoresProvider};
use crate::config::UpstreamSettings;
use crate::domain::error::FetchError;

use super::upstream::{Upstream, join_path};

const PROVIDER: &str = "espn";
const SITE_PATH: [&str; 6] = ["apis", "site", "v2", "sports", "basketball", "nba"];
const STANDINGS_PATH: [&str; 6] = ["apis", "v2", "sports", "basketball", "nba", "standings"];

#[derive(Clone, Debug)]
pub struct EspnClient {
    upstream: Upstream,
    site_base: Url,
    web_base: Url,
}

impl EspnClient {
    pub fn new(client: Client, site_base: Url, web_base: Url) -> Self {
        Self {
            upstream: Upstream::new(client, PROVIDER),
            site_base,
            web_base,
        }
    }

    pub fn from_settings(client: Client, settings: &UpstreamSettings) -> Self {
        Self::new(
            client,
            settings.espn_site_base.clone(),
            settings.espn_web_base.clone(),
        )
    }

    fn site_url(&self, base: &Url, endpoint: &str) -> Url {
        let mut segments = SITE_PATH.to_vec();
        segments.push(endpoint);
        join_path(base, &segments)
    }
}

#[async_trait]
impl ScoresProvider for EspnClient {
    async fn scoreboard(&self, date: Option<&str>) -> Result<RawScoreboard, FetchError> {
        let mut url = self.site_url(&self.site_base, "scoreboard");
        if let Some(date) = date {
            url.query_pairs_mut().append_pair("dates", date);
        }
        self.upstream
            .get_json("scoreboard", self.upstream.get(url))
            .await
    }

    async fn summary(&self, event_id: &str) -> Result<RawSummary, FetchError> {
        let mut url = self.site_url(&self.web_base, "summary");
        url.query_pairs_mut().append_pair("event", event_id);
        self.upstream
            .get_json("summary", self.upstream.get(url))
            .await
    }

    async fn standings(&self) -> Result<RawStandings, FetchError> {
        let url = join_path(&self.site_base, &STANDINGS_PATH);
        self.upstream
            .get_json("standings", self.upstream.get(url))
            .await
    }
}
