//! Upstream provider contracts consumed by the service façades.
//!
//! Adapters raise [`FetchError::Upstream`] on any non-2xx answer and never
//! retry; fallback decisions belong to the façades.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::FetchError;
use crate::domain::leaders::PerMode;
use crate::domain::reddit::CommentSort;

pub mod espn;
pub mod lenient;
pub mod reddit;

pub use espn::{RawScoreboard, RawStandings, RawSummary};

/// Scores and box-score source.
#[async_trait]
pub trait ScoresProvider: Send + Sync {
    /// Scoreboard for a `YYYYMMDD` date, or today when `None`.
    async fn scoreboard(&self, date: Option<&str>) -> Result<RawScoreboard, FetchError>;

    async fn summary(&self, event_id: &str) -> Result<RawSummary, FetchError>;

    async fn standings(&self) -> Result<RawStandings, FetchError>;
}

/// League stats source for season leader tables.
#[async_trait]
pub trait LeadersProvider: Send + Sync {
    /// Raw result-set payload of one dashboard for a `YYYY-YY` season.
    async fn league_dash(
        &self,
        table: DashTable,
        season: &str,
        per_mode: PerMode,
    ) -> Result<Value, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashTable {
    Players,
    Teams,
}

impl DashTable {
    pub fn endpoint(self) -> &'static str {
        match self {
            DashTable::Players => "leaguedashplayerstats",
            DashTable::Teams => "leaguedashteamstats",
        }
    }
}

/// Discussion-thread source.
///
/// Payloads are handed back untouched; transformers decode them.
#[async_trait]
pub trait ThreadProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Value, FetchError>;

    /// Comment listing for a post, addressed by permalink when one is known.
    async fn comments(
        &self,
        post_id: &str,
        sort: CommentSort,
        permalink: Option<&str>,
    ) -> Result<Value, FetchError>;

    async fn thread_content(&self, permalink: &str) -> Result<Value, FetchError>;

    async fn subreddit_feed(&self, subreddit: &str, sort: FeedSort) -> Result<Value, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Day,
    Week,
    Year,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSort {
    New,
    Relevance,
}

impl SearchSort {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchSort::New => "new",
            SearchSort::Relevance => "relevance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub time_range: TimeRange,
    pub sort: SearchSort,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, time_range: TimeRange, sort: SearchSort) -> Self {
        Self {
            text: text.into(),
            time_range,
            sort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSort {
    New,
    Hot,
}

impl FeedSort {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedSort::New => "new",
            FeedSort::Hot => "hot",
        }
    }

    /// Unknown names fall back to `hot`.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("new") {
            FeedSort::New
        } else {
            FeedSort::Hot
        }
    }
}

impl fmt::Display for FeedSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
