use std::time::Duration;

use courtside::application::providers::{
    DashTable, FeedSort, LeadersProvider, ScoresProvider, SearchQuery, SearchSort, ThreadProvider,
    TimeRange,
};
use courtside::domain::error::FetchError;
use courtside::domain::leaders::PerMode;
use courtside::domain::reddit::CommentSort;
use courtside::infra::espn::EspnClient;
use courtside::infra::nba_stats::StatsClient;
use courtside::infra::reddit::{RedditClient, RedditRoute};
use courtside::infra::upstream::{self, BROWSER_USER_AGENT};
use httpmock::MockServer;
use serde_json::json;
use url::Url;

fn base(server: &MockServer) -> Url {
    Url::parse(&server.base_url()).expect("mock server url")
}

fn client() -> reqwest::Client {
    upstream::build_client(Duration::from_secs(5)).expect("http client")
}

fn espn(server: &MockServer) -> EspnClient {
    EspnClient::new(client(), base(server), base(server))
}

fn reddit(server: &MockServer, route: RedditRoute) -> RedditClient {
    RedditClient::new(client(), base(server), "nba", route)
}

#[tokio::test]
async fn scoreboard_requests_date_and_decodes_events() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/apis/site/v2/sports/basketball/nba/scoreboard")
                .query_param("dates", "20240115");
            then.status(200).json_body(json!({
                "events": [{
                    "id": "401585",
                    "name": "Los Angeles Lakers at Boston Celtics",
                    "competitions": [{
                        "id": 401585,
                        "competitors": [
                            {"homeAway": "home", "score": "101", "team": {"id": "2", "displayName": "Boston Celtics"}},
                            {"homeAway": "away", "score": 99, "team": {"id": "13", "displayName": "Los Angeles Lakers"}}
                        ]
                    }]
                }]
            }));
        })
        .await;

    let scoreboard = espn(&server)
        .scoreboard(Some("20240115"))
        .await
        .expect("scoreboard");

    mock.assert_async().await;
    assert_eq!(scoreboard.events.len(), 1);
    assert_eq!(scoreboard.events[0].id, "401585");
    assert_eq!(scoreboard.events[0].competitions[0].id, "401585");
}

#[tokio::test]
async fn summary_failure_carries_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/apis/site/v2/sports/basketball/nba/summary")
                .query_param("event", "42");
            then.status(503).body("maintenance");
        })
        .await;

    let err = espn(&server).summary("42").await.expect_err("503 must fail");

    assert_eq!(err, FetchError::upstream("espn", "summary", 503));
    assert!(!err.is_blocked());
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/apis/v2/sports/basketball/nba/standings");
            then.status(200).body("<html>oops</html>");
        })
        .await;

    let err = espn(&server).standings().await.expect_err("html must fail");
    assert!(err.is_malformed());
}

#[tokio::test]
async fn direct_search_sends_browser_identity_and_query() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/r/nba/search.json")
                .query_param("q", "\"GAME THREAD\" \"Lakers\"")
                .query_param("restrict_sr", "1")
                .query_param("sort", "new")
                .query_param("t", "week")
                .header("user-agent", BROWSER_USER_AGENT);
            then.status(200)
                .json_body(json!({"data": {"children": []}}));
        })
        .await;

    let query = SearchQuery::new("\"GAME THREAD\" \"Lakers\"", TimeRange::Week, SearchSort::New);
    let listing = reddit(&server, RedditRoute::Direct)
        .search(&query)
        .await
        .expect("search");

    mock.assert_async().await;
    assert_eq!(listing, json!({"data": {"children": []}}));
}

#[tokio::test]
async fn rate_limited_search_is_blocked() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/r/nba/search.json");
            then.status(429).body("Too Many Requests");
        })
        .await;

    let query = SearchQuery::new("x", TimeRange::Year, SearchSort::Relevance);
    let err = reddit(&server, RedditRoute::Direct)
        .search(&query)
        .await
        .expect_err("429 must fail");

    assert!(err.is_blocked());
    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn comments_prefer_permalink_over_post_id() {
    let server = MockServer::start_async().await;
    let by_permalink = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/r/nba/comments/abc123/game_thread.json")
                .query_param("sort", "top");
            then.status(200).json_body(json!([{}, {"data": {"children": []}}]));
        })
        .await;
    let by_id = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/comments/xyz789.json")
                .query_param("sort", "new");
            then.status(200).json_body(json!([]));
        })
        .await;

    let client = reddit(&server, RedditRoute::Direct);
    client
        .comments(
            "abc123",
            CommentSort::Top,
            Some("/r/nba/comments/abc123/game_thread/"),
        )
        .await
        .expect("permalink comments");
    client
        .comments("xyz789", CommentSort::New, None)
        .await
        .expect("id comments");

    by_permalink.assert_async().await;
    by_id.assert_async().await;
}

#[tokio::test]
async fn proxy_mode_wraps_every_request() {
    let reddit_server = MockServer::start_async().await;
    let proxy_server = MockServer::start_async().await;
    let target = format!("{}/r/nba/hot.json?limit=100", reddit_server.base_url());
    let bridged = proxy_server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/reddit/proxy")
                .query_param("url", target.as_str());
            then.status(200)
                .json_body(json!({"data": {"children": [{"kind": "t3", "data": {"id": "p1"}}]}}));
        })
        .await;

    let proxy = Url::parse(&format!("{}/api/reddit/proxy", proxy_server.base_url()))
        .expect("proxy url");
    let feed = reddit(&reddit_server, RedditRoute::Proxy(proxy))
        .subreddit_feed("nba", FeedSort::Hot)
        .await
        .expect("feed through proxy");

    bridged.assert_async().await;
    assert_eq!(feed["data"]["children"][0]["data"]["id"], "p1");
}

#[tokio::test]
async fn league_dashboard_sends_nba_origin_and_filters() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/stats/leaguedashplayerstats")
                .query_param("Season", "2024-25")
                .query_param("PerMode", "Per36")
                .query_param("SeasonType", "Regular Season")
                .query_param("LeagueID", "00")
                .header("origin", "https://www.nba.com")
                .header("referer", "https://www.nba.com/")
                .header("user-agent", BROWSER_USER_AGENT);
            then.status(200).json_body(json!({
                "resultSets": [{"headers": ["PLAYER_NAME"], "rowSet": [["Nikola Jokic"]]}]
            }));
        })
        .await;

    let payload = StatsClient::new(client(), base(&server))
        .league_dash(DashTable::Players, "2024-25", PerMode::Per36)
        .await
        .expect("dashboard");

    mock.assert_async().await;
    assert_eq!(payload["resultSets"][0]["rowSet"][0][0], "Nikola Jokic");
}

#[tokio::test]
async fn league_dashboard_refusal_is_an_upstream_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/stats/leaguedashteamstats");
            then.status(403).body("Access Denied");
        })
        .await;

    let err = StatsClient::new(client(), base(&server))
        .league_dash(DashTable::Teams, "2024-25", PerMode::PerGame)
        .await
        .expect_err("refused");

    assert!(err.is_blocked());
    assert_eq!(err.status(), Some(403));
}
