//! Scripted providers and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courtside::application::providers::{
    DashTable, FeedSort, LeadersProvider, RawScoreboard, RawStandings, RawSummary, ScoresProvider,
    SearchQuery, ThreadProvider,
};
use courtside::application::{LeadersService, NbaService, RedditService, ThreadResolver};
use courtside::cache::{CacheConfig, CacheTier, MemoryCache, TieredCache};
use courtside::domain::error::FetchError;
use courtside::domain::leaders::PerMode;
use courtside::domain::reddit::CommentSort;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use time::OffsetDateTime;

pub const INDEX_QUERY: &str = "Daily Game Thread Index";

pub type Scripted = Result<Value, FetchError>;

fn decode<T: DeserializeOwned>(provider: &'static str, scripted: Scripted) -> Result<T, FetchError> {
    serde_json::from_value(scripted?).map_err(|err| FetchError::malformed(provider, err.to_string()))
}

#[derive(Default)]
pub struct Calls(Mutex<HashMap<&'static str, usize>>);

impl Calls {
    pub fn record(&self, op: &'static str) {
        *self.0.lock().expect("calls lock").entry(op).or_insert(0) += 1;
    }

    pub fn get(&self, op: &'static str) -> usize {
        self.0.lock().expect("calls lock").get(op).copied().unwrap_or(0)
    }
}

/// Scores provider answering from scripted payloads after `delay`.
pub struct FakeScores {
    pub calls: Calls,
    pub delay: Duration,
    pub scoreboard: Mutex<Scripted>,
    pub summary: Mutex<Scripted>,
    pub standings: Mutex<Scripted>,
}

impl FakeScores {
    pub fn new() -> Self {
        Self {
            calls: Calls::default(),
            delay: Duration::from_millis(20),
            scoreboard: Mutex::new(Ok(scoreboard_fixture())),
            summary: Mutex::new(Ok(summary_fixture())),
            standings: Mutex::new(Ok(standings_fixture())),
        }
    }

    pub fn script(slot: &Mutex<Scripted>, value: Scripted) {
        *slot.lock().expect("script lock") = value;
    }

    async fn answer<T: DeserializeOwned>(
        &self,
        op: &'static str,
        slot: &Mutex<Scripted>,
    ) -> Result<T, FetchError> {
        self.calls.record(op);
        tokio::time::sleep(self.delay).await;
        let scripted = slot.lock().expect("script lock").clone();
        decode("espn", scripted)
    }
}

#[async_trait]
impl ScoresProvider for FakeScores {
    async fn scoreboard(&self, _date: Option<&str>) -> Result<RawScoreboard, FetchError> {
        self.answer("scoreboard", &self.scoreboard).await
    }

    async fn summary(&self, _event_id: &str) -> Result<RawSummary, FetchError> {
        self.answer("summary", &self.summary).await
    }

    async fn standings(&self) -> Result<RawStandings, FetchError> {
        self.answer("standings", &self.standings).await
    }
}

/// Thread provider answering from scripted payloads; records search queries.
pub struct FakeThreads {
    pub calls: Calls,
    pub queries: Mutex<Vec<SearchQuery>>,
    /// Post id and sort of every comments request, in arrival order.
    pub comment_requests: Mutex<Vec<(String, CommentSort)>>,
    /// Answer to the daily index query.
    pub index_search: Mutex<Scripted>,
    /// Answer to every other search.
    pub search: Mutex<Scripted>,
    pub new_feed: Mutex<Scripted>,
    pub hot_feed: Mutex<Scripted>,
    pub content: Mutex<Scripted>,
    pub comments: Mutex<Scripted>,
}

impl FakeThreads {
    pub fn new() -> Self {
        Self {
            calls: Calls::default(),
            queries: Mutex::new(Vec::new()),
            comment_requests: Mutex::new(Vec::new()),
            index_search: Mutex::new(Ok(listing(Vec::new()))),
            search: Mutex::new(Ok(listing(Vec::new()))),
            new_feed: Mutex::new(Ok(listing(Vec::new()))),
            hot_feed: Mutex::new(Ok(listing(Vec::new()))),
            content: Mutex::new(Ok(json!([]))),
            comments: Mutex::new(Ok(comments_fixture())),
        }
    }

    pub fn script(slot: &Mutex<Scripted>, value: Scripted) {
        *slot.lock().expect("script lock") = value;
    }

    fn answer(&self, op: &'static str, slot: &Mutex<Scripted>) -> Scripted {
        self.calls.record(op);
        slot.lock().expect("script lock").clone()
    }

    pub fn comment_requests(&self) -> Vec<(String, CommentSort)> {
        self.comment_requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ThreadProvider for FakeThreads {
    async fn search(&self, query: &SearchQuery) -> Result<Value, FetchError> {
        self.queries.lock().expect("queries lock").push(query.clone());
        if query.text == INDEX_QUERY {
            return self.answer("index_search", &self.index_search);
        }
        self.answer("search", &self.search)
    }

    async fn comments(
        &self,
        post_id: &str,
        sort: CommentSort,
        _permalink: Option<&str>,
    ) -> Result<Value, FetchError> {
        self.comment_requests
            .lock()
            .expect("requests lock")
            .push((post_id.to_string(), sort));
        self.answer("comments", &self.comments)
    }

    async fn thread_content(&self, _permalink: &str) -> Result<Value, FetchError> {
        self.answer("thread_content", &self.content)
    }

    async fn subreddit_feed(&self, _subreddit: &str, sort: FeedSort) -> Result<Value, FetchError> {
        match sort {
            FeedSort::New => self.answer("feed_new", &self.new_feed),
            FeedSort::Hot => self.answer("feed_hot", &self.hot_feed),
        }
    }
}

/// Leaders provider answering every dashboard with a scripted payload.
pub struct FakeLeaders {
    pub calls: Calls,
    /// Season and per-mode of every request, in arrival order.
    pub requests: Mutex<Vec<(DashTable, String, PerMode)>>,
    pub players: Mutex<Scripted>,
    pub teams: Mutex<Scripted>,
}

impl FakeLeaders {
    pub fn new() -> Self {
        Self {
            calls: Calls::default(),
            requests: Mutex::new(Vec::new()),
            players: Mutex::new(Ok(dash_fixture(
                &["PLAYER_NAME", "PTS"],
                json!(["Luka Doncic", 33.9]),
            ))),
            teams: Mutex::new(Ok(dash_fixture(
                &["TEAM_NAME", "W"],
                json!(["Boston Celtics", 64]),
            ))),
        }
    }

    pub fn script(slot: &Mutex<Scripted>, value: Scripted) {
        *slot.lock().expect("script lock") = value;
    }

    pub fn requests(&self) -> Vec<(DashTable, String, PerMode)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl LeadersProvider for FakeLeaders {
    async fn league_dash(
        &self,
        table: DashTable,
        season: &str,
        per_mode: PerMode,
    ) -> Result<Value, FetchError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push((table, season.to_string(), per_mode));
        tokio::time::sleep(Duration::from_millis(10)).await;
        match table {
            DashTable::Players => {
                self.calls.record("players");
                self.players.lock().expect("script lock").clone()
            }
            DashTable::Teams => {
                self.calls.record("teams");
                self.teams.lock().expect("script lock").clone()
            }
        }
    }
}

pub fn dash_fixture(headers: &[&str], row: Value) -> Value {
    json!({"resultSets": [{"name": "LeagueDash", "headers": headers, "rowSet": [row]}]})
}

pub fn tiered(persistent: Option<Arc<dyn CacheTier>>) -> Arc<TieredCache> {
    let config = CacheConfig::default();
    Arc::new(TieredCache::new(
        Arc::new(MemoryCache::new(&config)),
        persistent,
        None,
        &config,
    ))
}

pub struct Harness {
    pub cache: Arc<TieredCache>,
    pub scores: Arc<FakeScores>,
    pub threads: Arc<FakeThreads>,
    pub stats: Arc<FakeLeaders>,
    pub nba: NbaService,
    pub leaders: LeadersService,
    pub resolver: ThreadResolver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cache(tiered(None))
    }

    pub fn with_cache(cache: Arc<TieredCache>) -> Self {
        let scores = Arc::new(FakeScores::new());
        let threads = Arc::new(FakeThreads::new());
        let stats = Arc::new(FakeLeaders::new());
        let nba = NbaService::new(
            scores.clone(),
            Arc::clone(&cache),
            Duration::from_secs(6 * 60 * 60),
        );
        let leaders = LeadersService::new(stats.clone(), Arc::clone(&cache));
        let reddit = RedditService::new(threads.clone(), Arc::clone(&cache), "nba");
        Self {
            cache,
            scores,
            threads,
            stats,
            nba,
            leaders,
            resolver: ThreadResolver::new(reddit),
        }
    }

    pub fn reddit(&self) -> &RedditService {
        self.resolver.reddit()
    }
}

pub fn now_secs() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp() as f64
}

pub fn post(id: &str, title: &str, created_utc: f64) -> Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "title": title,
            "permalink": format!("/r/nba/comments/{id}/thread/"),
            "created_utc": created_utc,
            "score": 10
        }
    })
}

pub fn listing(children: Vec<Value>) -> Value {
    json!({"kind": "Listing", "data": {"children": children}})
}

pub fn index_content(lines: &[&str]) -> Value {
    json!([{
        "data": {"children": [{"kind": "t3", "data": {"id": "idx", "selftext": lines.join("\n")}}]}
    }])
}

pub fn scoreboard_fixture() -> Value {
    json!({
        "events": [{
            "id": "401",
            "date": "2024-01-15T00:30Z",
            "name": "Los Angeles Lakers at Boston Celtics",
            "shortName": "LAL @ BOS",
            "competitions": [{
                "id": "401",
                "competitors": [
                    {"homeAway": "home", "score": "110",
                     "team": {"id": "2", "abbreviation": "BOS", "displayName": "Boston Celtics"},
                     "linescores": [{"value": 30}, {"value": 25}, {"value": 28}, {"value": 27}]},
                    {"homeAway": "away", "score": "104",
                     "team": {"id": "13", "abbreviation": "LAL", "displayName": "Los Angeles Lakers"},
                     "linescores": [{"value": 20}, {"value": 30}, {"value": 24}, {"value": 30}]}
                ],
                "status": {"displayClock": "0.0", "period": 4,
                           "type": {"name": "STATUS_FINAL", "shortDetail": "Final", "completed": true}}
            }]
        }]
    })
}

pub fn summary_fixture() -> Value {
    let line = |name: &str, minutes: &str| {
        json!({"athlete": {"id": "1", "displayName": name}, "stats": [minutes, "10-20", "30"]})
    };
    json!({
        "header": {"id": "401", "competitions": [{"id": "401"}]},
        "boxscore": {
            "teams": [
                {"team": {"id": "2"}, "homeAway": "home"},
                {"team": {"id": "13"}, "homeAway": "away"}
            ],
            "players": [
                {"team": {"id": "2"}, "statistics": [{"names": ["MIN", "FG", "PTS"],
                    "athletes": [line("Jayson Tatum", "36")]}]},
                {"team": {"id": "13"}, "statistics": [{"names": ["MIN", "FG", "PTS"],
                    "athletes": [line("LeBron James", "35")]}]}
            ]
        }
    })
}

pub fn standings_fixture() -> Value {
    let entry = |id: &str, name: &str, wins: u32, losses: u32| {
        json!({
            "team": {"id": id, "displayName": name},
            "stats": [
                {"name": "wins", "value": wins},
                {"name": "losses", "value": losses},
                {"name": "winPercent", "value": f64::from(wins) / f64::from(wins + losses)}
            ]
        })
    };
    json!({
        "children": [{
            "name": "Eastern Conference",
            "abbreviation": "East",
            "standings": {"entries": [
                entry("1", "Atlanta Hawks", 10, 30),
                entry("2", "Boston Celtics", 31, 9)
            ]}
        }]
    })
}

pub fn comments_fixture() -> Value {
    json!([
        {"kind": "Listing", "data": {"children": []}},
        {"kind": "Listing", "data": {"children": [
            {"kind": "t1", "data": {"id": "c1", "author": "fan", "body": "what a game", "score": 5,
                                    "created_utc": 1_705_300_000.0, "replies": ""}},
            {"kind": "more", "data": {"id": "more1"}}
        ]}}
    ])
}

/// Index post in search results plus a body linking `lines`.
pub fn script_index(threads: &FakeThreads, lines: &[&str]) {
    FakeThreads::script(
        &threads.index_search,
        Ok(listing(vec![post(
            "idx",
            "Daily Game Thread Index - January 15",
            now_secs() - 600.0,
        )])),
    );
    FakeThreads::script(&threads.content, Ok(index_content(lines)));
}

pub const LAKERS_CELTICS_GDT: &str = "| [GAME THREAD: Los Angeles Lakers at Boston Celtics (7:30 PM ET)](https://www.reddit.com/r/nba/comments/abc123/game_thread/) |";

pub const LAKERS_CELTICS_PGT: &str = "| [POST GAME THREAD: Los Angeles Lakers at Boston Celtics](https://www.reddit.com/r/nba/comments/pgt456/post_game_thread/) |";
