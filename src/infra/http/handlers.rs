//! JSON endpoints over the service façades.
//!
//! Upstream failures never become error statuses here: every handler answers
//! 200 with either its payload or the endpoint's empty shape plus `error`.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::application::LeadersService;
use crate::application::error::ErrorReport;
use crate::application::providers::FeedSort;
use crate::application::threads::Matchup;
use crate::domain::error::FetchError;
use crate::domain::leaders::{PerMode, is_season_label};
use crate::domain::reddit::{CommentSort, SearchRequest, ThreadMapping};

use super::AppState;

/// Post id under which `/api/reddit/comments/{id}` serves raw thread content.
const CONTENT_POST_ID: &str = "none";

pub async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct ScoreboardQuery {
    date: Option<String>,
}

pub async fn scoreboard(
    State(state): State<AppState>,
    query: Result<Query<ScoreboardQuery>, QueryRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::scoreboard";
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return invalid(SOURCE, json!({ "events": [] }), rejection.body_text()),
    };
    let date = query.date.filter(|date| !date.is_empty());
    if let Some(date) = date.as_deref()
        && !is_compact_date(date)
    {
        return invalid(SOURCE, json!({ "events": [] }), "date must be YYYYMMDD");
    }
    respond(
        SOURCE,
        state.nba.scoreboard(date.as_deref()).await,
        json!({ "events": [] }),
    )
}

pub async fn boxscore(State(state): State<AppState>, Path(event_id): Path<String>) -> Response {
    respond(
        "infra::http::boxscore",
        state.nba.boxscore(&event_id).await,
        json!({}),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsQuery {
    force_refresh: Option<String>,
}

pub async fn standings(
    State(state): State<AppState>,
    query: Result<Query<StandingsQuery>, QueryRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::standings";
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return invalid(SOURCE, json!({ "conferences": [] }), rejection.body_text());
        }
    };
    let force = is_truthy(query.force_refresh.as_deref());
    respond(
        SOURCE,
        state.nba.standings(force).await,
        json!({ "conferences": [] }),
    )
}

pub async fn reddit_index(State(state): State<AppState>) -> Json<ThreadMapping> {
    Json(state.threads.reddit().index().await)
}

pub async fn reddit_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::reddit_search";
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return invalid(SOURCE, json!({ "post": null }), rejection.body_text());
        }
    };
    respond(
        SOURCE,
        state.threads.reddit().search_thread(&request).await,
        json!({ "post": null }),
    )
}

const MAX_BULK_SEASONS: usize = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsQuery {
    sort: Option<String>,
    permalink: Option<String>,
    bypass_cache: Option<String>,
    #[serde(rename = "_refresh")]
    refresh: Option<String>,
}

pub async fn reddit_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    query: Result<Query<CommentsQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return invalid(
                "infra::http::reddit_comments",
                json!({ "comments": [] }),
                rejection.body_text(),
            );
        }
    };
    let reddit = state.threads.reddit();
    let permalink = query.permalink.filter(|permalink| !permalink.is_empty());

    if post_id == CONTENT_POST_ID {
        const SOURCE: &str = "infra::http::reddit_thread_content";
        let Some(permalink) = permalink else {
            return invalid(SOURCE, json!([]), "permalink is required");
        };
        return respond(SOURCE, reddit.thread_content(&permalink).await, json!([]));
    }

    let sort = query
        .sort
        .as_deref()
        .map(CommentSort::parse)
        .unwrap_or_default();
    let bypass = is_truthy(query.bypass_cache.as_deref()) || is_truthy(query.refresh.as_deref());
    respond(
        "infra::http::reddit_comments",
        reddit
            .comments(&post_id, sort, permalink.as_deref(), bypass)
            .await,
        json!({ "comments": [] }),
    )
}

pub async fn reddit_threads(
    State(state): State<AppState>,
    query: Result<Query<Matchup>, QueryRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::reddit_threads";
    let matchup = match query {
        Ok(Query(matchup)) => matchup,
        Err(rejection) => return invalid(SOURCE, json!({}), rejection.body_text()),
    };
    if matchup.away.trim().is_empty() || matchup.home.trim().is_empty() {
        return invalid(SOURCE, json!({}), "away and home are required");
    }
    Json(state.threads.resolve(&matchup).await).into_response()
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    sort: Option<String>,
}

pub async fn reddit_subreddit(
    State(state): State<AppState>,
    Path(subreddit): Path<String>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::reddit_subreddit";
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return invalid(SOURCE, json!({ "data": { "children": [] } }), rejection.body_text());
        }
    };
    let sort = query
        .sort
        .as_deref()
        .map(FeedSort::parse)
        .unwrap_or(FeedSort::New);
    respond(
        SOURCE,
        state
            .threads
            .reddit()
            .subreddit_feed(&subreddit, sort)
            .await,
        json!({ "data": { "children": [] } }),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadersQuery {
    season: Option<String>,
    per_mode: Option<String>,
}

pub async fn season_leaders(
    State(state): State<AppState>,
    query: Result<Query<LeadersQuery>, QueryRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::season_leaders";
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return invalid(SOURCE, empty_leaders(None), rejection.body_text());
        }
    };
    let season = query
        .season
        .filter(|season| !season.is_empty())
        .unwrap_or_else(LeadersService::current_season);
    if !is_season_label(&season) {
        return invalid(
            SOURCE,
            empty_leaders(None),
            "season must look like 2024-25",
        );
    }
    let per_mode = match query.per_mode.as_deref().filter(|raw| !raw.is_empty()) {
        None => PerMode::default(),
        Some(raw) => match PerMode::parse(raw) {
            Some(per_mode) => per_mode,
            None => {
                return invalid(
                    SOURCE,
                    empty_leaders(Some(&season)),
                    format!("unknown perMode `{raw}`"),
                );
            }
        },
    };
    respond(
        SOURCE,
        state.leaders.season_leaders(&season, per_mode).await,
        empty_leaders(Some(&season)),
    )
}

#[derive(Debug, Deserialize)]
pub struct BulkLeadersQuery {
    seasons: Option<String>,
}

pub async fn season_leaders_bulk(
    State(state): State<AppState>,
    query: Result<Query<BulkLeadersQuery>, QueryRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::season_leaders_bulk";
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return invalid(SOURCE, json!({ "seasons": [] }), rejection.body_text()),
    };
    let seasons: Vec<String> = query
        .seasons
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|season| !season.is_empty())
        .map(str::to_string)
        .collect();
    if seasons.is_empty() {
        return invalid(SOURCE, json!({ "seasons": [] }), "Missing seasons");
    }
    if seasons.len() > MAX_BULK_SEASONS {
        return invalid(
            SOURCE,
            json!({ "seasons": [] }),
            format!("at most {MAX_BULK_SEASONS} seasons per request"),
        );
    }
    if let Some(bad) = seasons.iter().find(|season| !is_season_label(season)) {
        return invalid(
            SOURCE,
            json!({ "seasons": [] }),
            format!("`{bad}` is not a season like 2024-25"),
        );
    }
    respond(
        SOURCE,
        state.leaders.bulk(&seasons).await,
        json!({ "seasons": [] }),
    )
}

fn empty_leaders(season: Option<&str>) -> Value {
    json!({
        "season": season,
        "players": { "headers": [], "rows": [] },
        "teams": { "headers": [], "rows": [] },
    })
}

fn respond<T: Serialize>(
    source: &'static str,
    result: Result<T, FetchError>,
    empty: Value,
) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => {
            let mut response = Json(with_error(empty, err.to_string())).into_response();
            ErrorReport::from_error(source, StatusCode::BAD_GATEWAY, &err).attach(&mut response);
            response
        }
    }
}

fn invalid(source: &'static str, empty: Value, message: impl Into<String>) -> Response {
    let message = message.into();
    let mut response = Json(with_error(empty, message.clone())).into_response();
    ErrorReport::from_message(source, StatusCode::BAD_REQUEST, message).attach(&mut response);
    response
}

/// Adds `error` to an object body; any other shape is replaced by `{error}`.
fn with_error(empty: Value, message: String) -> Value {
    match empty {
        Value::Object(mut body) => {
            body.insert("error".to_string(), Value::String(message));
            Value::Object(body)
        }
        _ => json!({ "error": message }),
    }
}

fn is_truthy(raw: Option<&str>) -> bool {
    matches!(raw, Some("1" | "true" | "yes"))
}

fn is_compact_date(raw: &str) -> bool {
    raw.len() == 8 && raw.bytes().all(|byte| byte.is_ascii_digit())
}
