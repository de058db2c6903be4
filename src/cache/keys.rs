//! Cache key definitions and content hashing.

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::leaders::PerMode;
use crate::domain::reddit::{CommentSort, SearchRequest};

/// Identifies one cached payload across every tier.
#[derive(Debug, Clone, Copy)]
pub enum CacheKey<'a> {
    /// Scoreboard for a `YYYYMMDD` date, or today when absent.
    Scoreboard(Option<&'a str>),
    Boxscore(&'a str),
    Standings,
    /// Player and team tables for one season and aggregation.
    SeasonLeaders {
        season: &'a str,
        per_mode: PerMode,
    },
    /// Per-game player table for one season, as served by the bulk route.
    SeasonPlayers(&'a str),
    RedditIndex,
    RedditSearch(&'a SearchRequest),
    RedditComments {
        post_id: &'a str,
        sort: CommentSort,
    },
}

impl CacheKey<'_> {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Scoreboard(None) => f.write_str("scoreboard"),
            CacheKey::Scoreboard(Some(date)) => write!(f, "scoreboard:{date}"),
            CacheKey::Boxscore(event_id) => write!(f, "boxscore:{event_id}"),
            CacheKey::Standings => f.write_str("standings"),
            CacheKey::SeasonLeaders { season, per_mode } => {
                write!(f, "season-stats:{season}:{per_mode}")
            }
            CacheKey::SeasonPlayers(season) => write!(f, "season-stats:{season}"),
            CacheKey::RedditIndex => f.write_str("reddit:index"),
            CacheKey::RedditSearch(request) => {
                // Field order is fixed by the struct, so equal requests render equally.
                let canonical = serde_json::to_string(request).map_err(|_| fmt::Error)?;
                write!(f, "reddit:search:{canonical}")
            }
            CacheKey::RedditComments { post_id, sort } => {
                write!(f, "reddit:comments:{post_id}:{}", sort.as_str())
            }
        }
    }
}

/// Hex SHA-256 of the canonical JSON encoding of `value`.
pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::reddit::ThreadKind;

    #[test]
    fn keys_render_with_stable_prefixes() {
        assert_eq!(CacheKey::Scoreboard(None).render(), "scoreboard");
        assert_eq!(
            CacheKey::Scoreboard(Some("20240115")).render(),
            "scoreboard:20240115"
        );
        assert_eq!(CacheKey::Boxscore("401585").render(), "boxscore:401585");
        assert_eq!(
            CacheKey::RedditComments {
                post_id: "abc123",
                sort: CommentSort::Top
            }
            .render(),
            "reddit:comments:abc123:top"
        );
        assert_eq!(
            CacheKey::SeasonLeaders {
                season: "2024-25",
                per_mode: PerMode::Per36
            }
            .render(),
            "season-stats:2024-25:Per36"
        );
        assert_eq!(
            CacheKey::SeasonPlayers("2024-25").render(),
            "season-stats:2024-25"
        );
    }

    #[test]
    fn search_key_embeds_canonical_request() {
        let mut request = SearchRequest::new(ThreadKind::Live);
        request.away_candidates.push("Lakers".into());
        request.home_candidates.push("Celtics".into());

        assert_eq!(
            CacheKey::RedditSearch(&request).render(),
            r#"reddit:search:{"type":"live","awayCandidates":["Lakers"],"homeCandidates":["Celtics"]}"#
        );
    }

    #[test]
    fn content_hash_ignores_object_key_order() {
        let left = json!({"a": 1, "b": [1, 2]});
        let right: Value =
            serde_json::from_str(r#"{"b": [1, 2], "a": 1}"#).expect("valid json");
        assert_eq!(content_hash(&left), content_hash(&right));
        assert_ne!(content_hash(&left), content_hash(&json!({"a": 2, "b": [1, 2]})));
    }
}
