//! Thread search ranking, comment trees and daily-index parsing.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::warn;
use url::Url;

use crate::application::providers::reddit::{RawComment, RawListing, RawPostData};
use crate::application::providers::{SearchQuery, SearchSort, TimeRange};
use crate::domain::reddit::{
    CommentNode, CommentsResponse, RedditPost, SearchRequest, SearchResponse, ThreadKind,
    ThreadMapping,
};
use crate::domain::teams::{classify_title, pair_key, title_matches_kind, title_mentions_team};

const SOURCE: &str = "courtside::transform::reddit";
pub const REDDIT_WEB: &str = "https://www.reddit.com";
const INDEX_TITLE: &str = "daily game thread index";
/// Reply levels expanded below the top-level comments.
const MAX_COMMENT_DEPTH: usize = 2;
const LIVE_MAX_AGE_SECS: f64 = 24.0 * 3600.0;
const POST_MAX_AGE_SECS: f64 = 36.0 * 3600.0;
const HISTORIC_AFTER_SECS: i64 = 6 * 24 * 3600;

static INDEX_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]+)\]\((https?://[^)]+)\)").expect("index link pattern compiles")
});
static POST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"comments/([a-z0-9]+)/").expect("post id pattern compiles"));

/// Quoted thread marker and team terms; live searches exclude post-game titles.
pub fn build_search_query(request: &SearchRequest) -> String {
    let base = match request.kind {
        ThreadKind::Post => r#""POST GAME THREAD""#,
        ThreadKind::Live => r#""GAME THREAD""#,
    };
    let terms = request
        .away_candidates
        .iter()
        .chain(&request.home_candidates)
        .map(|team| format!("\"{team}\""))
        .collect::<Vec<_>>()
        .join(" ");
    let exclusion = match request.kind {
        ThreadKind::Live => r#" -"POST GAME THREAD""#,
        ThreadKind::Post => "",
    };
    format!("{base} {terms}{exclusion}")
}

/// How candidates are aged and ranked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Recency {
    /// Keep recent posts only and prefer the newest.
    Recent { now: f64 },
    /// Prefer the post created closest to the game.
    Historic { event_time: f64 },
}

impl Recency {
    /// Historic when the request's event date lies more than six days back.
    pub fn for_request(request: &SearchRequest, now: OffsetDateTime) -> Self {
        let event = request.event_date.as_deref().and_then(parse_event_time);
        match event {
            Some(event) if (now - event).whole_seconds() > HISTORIC_AFTER_SECS => {
                Recency::Historic {
                    event_time: event.unix_timestamp() as f64,
                }
            }
            _ => Recency::Recent {
                now: now.unix_timestamp() as f64,
            },
        }
    }

    pub fn search_query(self, request: &SearchRequest) -> SearchQuery {
        let text = build_search_query(request);
        match self {
            Recency::Recent { .. } => SearchQuery::new(text, TimeRange::Week, SearchSort::New),
            Recency::Historic { .. } => {
                SearchQuery::new(text, TimeRange::Year, SearchSort::Relevance)
            }
        }
    }
}

/// Whether the team filter may be dropped when it leaves nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamFilter {
    Lenient,
    Strict,
}

/// Accepts RFC 3339, the provider's minute-precision `2024-01-15T00:30Z`,
/// and bare `YYYY-MM-DD` / `YYYYMMDD` dates.
pub fn parse_event_time(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]Z"),
    ) {
        return Some(parsed.assume_utc());
    }
    [
        format_description!("[year]-[month]-[day]"),
        format_description!("[year][month][day]"),
    ]
    .into_iter()
    .find_map(|format| Date::parse(raw, format).ok())
    .map(|date| date.midnight().assume_utc())
}

fn max_age(kind: ThreadKind) -> f64 {
    match kind {
        ThreadKind::Live => LIVE_MAX_AGE_SECS,
        ThreadKind::Post => POST_MAX_AGE_SECS,
    }
}

/// Picks the best thread for `request` among `posts`.
pub fn transform_search(
    posts: &[RawPostData],
    request: &SearchRequest,
    recency: Recency,
    filter: TeamFilter,
) -> SearchResponse {
    let typed: Vec<&RawPostData> = posts
        .iter()
        .filter(|post| title_matches_kind(&post.title, request.kind))
        .filter(|post| match recency {
            Recency::Recent { now } => {
                now - post.created_utc.unwrap_or(now) <= max_age(request.kind)
            }
            Recency::Historic { .. } => true,
        })
        .collect();

    let mentions = |post: &&RawPostData| {
        let away = request.away_candidates.is_empty()
            || title_mentions_team(&post.title, &request.away_candidates);
        let home = request.home_candidates.is_empty()
            || title_mentions_team(&post.title, &request.home_candidates);
        away && home
    };
    let matched: Vec<&RawPostData> = typed.iter().copied().filter(mentions).collect();
    let pool = if matched.is_empty() && filter == TeamFilter::Lenient {
        typed
    } else {
        matched
    };

    let best = pool.into_iter().reduce(|best, post| {
        let better = match recency {
            Recency::Recent { .. } => post.created_or_zero() > best.created_or_zero(),
            Recency::Historic { event_time } => {
                (post.created_or_zero() - event_time).abs()
                    < (best.created_or_zero() - event_time).abs()
            }
        };
        if better { post } else { best }
    });

    SearchResponse {
        post: best.map(reddit_post),
    }
}

fn reddit_post(raw: &RawPostData) -> RedditPost {
    let permalink = Some(raw.permalink.clone()).filter(|permalink| !permalink.is_empty());
    RedditPost {
        id: raw.id.clone(),
        title: raw.title.clone(),
        url: permalink
            .as_ref()
            .map(|permalink| format!("{REDDIT_WEB}{permalink}")),
        permalink,
        created_utc: raw.created_utc,
        score: raw.score,
    }
}

/// Concatenates listings, keeping the first post seen for each id.
pub fn merge_listings(listings: impl IntoIterator<Item = RawListing>) -> Vec<RawPostData> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .flat_map(RawListing::into_posts)
        .filter(|post| seen.insert(post.id.clone()))
        .collect()
}

/// Newest post titled as the daily game-thread index.
pub fn find_index_post(posts: &[RawPostData]) -> Option<&RawPostData> {
    posts
        .iter()
        .filter(|post| post.title.to_lowercase().contains(INDEX_TITLE))
        .reduce(|best, post| {
            if post.created_or_zero() > best.created_or_zero() {
                post
            } else {
                best
            }
        })
}

/// Comment tree from a `[post, comments]` thread payload.
///
/// Anything other than that array yields no comments.
pub fn transform_comments(value: &Value) -> CommentsResponse {
    let Some(parts) = value.as_array() else {
        warn!(target = SOURCE, "comment payload is not an array");
        return CommentsResponse::default();
    };
    CommentsResponse {
        comments: parts
            .get(1)
            .map(|listing| comment_tree(listing, 0))
            .unwrap_or_default(),
    }
}

fn comment_tree(listing: &Value, depth: usize) -> Vec<CommentNode> {
    let Some(children) = listing.pointer("/data/children").and_then(Value::as_array) else {
        if depth == 0 {
            warn!(target = SOURCE, "comment listing has no children");
        }
        return Vec::new();
    };

    children
        .iter()
        .filter(|child| child.get("kind").and_then(Value::as_str) == Some("t1"))
        .map(|child| {
            let data = child.get("data").unwrap_or(&Value::Null);
            let raw = RawComment::deserialize(data).unwrap_or_default();
            let replies = match data.get("replies") {
                Some(replies @ Value::Object(_)) if depth < MAX_COMMENT_DEPTH => {
                    Some(comment_tree(replies, depth + 1))
                }
                _ => None,
            };
            CommentNode {
                id: raw.id,
                author: raw.author,
                body: raw.body.unwrap_or_default(),
                score: raw.score.unwrap_or(0),
                created_utc: raw.created_utc.unwrap_or(0.0),
                replies,
            }
        })
        .collect()
}

/// Matchup links listed in the index post body, keyed by pair key.
pub fn transform_index(value: &Value) -> ThreadMapping {
    let mut mapping = ThreadMapping::new();
    let Some(body) = value
        .pointer("/0/data/children/0/data/selftext")
        .and_then(Value::as_str)
    else {
        warn!(target = SOURCE, "index thread carries no body");
        return mapping;
    };

    for line in body.lines() {
        let Some(link) = INDEX_LINK.captures(line) else {
            continue;
        };
        let (title, url) = (link[1].trim(), &link[2]);
        let Some((away, home)) = matchup(title) else {
            continue;
        };
        let Some(id) = POST_ID.captures(url).map(|found| found[1].to_string()) else {
            continue;
        };

        let post = RedditPost {
            id,
            title: title.to_string(),
            url: Some(url.to_string()),
            permalink: reddit_path(url),
            ..RedditPost::default()
        };
        let threads = mapping.entry(pair_key(away, home)).or_default();
        match classify_title(title) {
            Some(ThreadKind::Post) => threads.pgt = Some(post),
            _ => threads.gdt = Some(post),
        }
    }

    mapping
}

/// Path part of a reddit.com link, usable as a permalink.
fn reddit_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    (host == "reddit.com" || host.ends_with(".reddit.com")).then(|| parsed.path().to_string())
}

/// `"GAME THREAD: Lakers at Celtics (7:30 PM ET)"` to `("Lakers", "Celtics")`.
fn matchup(title: &str) -> Option<(&str, &str)> {
    let teams = title.split_once(':').map_or(title, |(_, rest)| rest);
    let (away, home) = teams.split_once(" at ")?;
    let away = away.trim();
    let home = home.split(" (").next().unwrap_or(home).trim();
    (!away.is_empty() && !home.is_empty()).then_some((away, home))
}
