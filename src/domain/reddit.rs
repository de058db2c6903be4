//! Reddit thread, comment and index shapes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_utc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

/// Game thread and post-game thread for one matchup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPair {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdt: Option<RedditPost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pgt: Option<RedditPost>,
}

/// Pair key (`"Celtics|Lakers"`) to the threads the daily index links.
pub type ThreadMapping = BTreeMap<String, ThreadPair>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    Live,
    Post,
}

impl ThreadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadKind::Live => "live",
            ThreadKind::Post => "post",
        }
    }
}

impl fmt::Display for ThreadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    New,
    Top,
}

impl CommentSort {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentSort::New => "new",
            CommentSort::Top => "top",
        }
    }

    /// Anything other than `top` reads as `new`.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("top") {
            CommentSort::Top
        } else {
            CommentSort::New
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(rename = "type")]
    pub kind: ThreadKind,
    #[serde(default)]
    pub away_candidates: Vec<String>,
    #[serde(default)]
    pub home_candidates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl SearchRequest {
    pub fn new(kind: ThreadKind) -> Self {
        Self {
            kind,
            away_candidates: Vec::new(),
            home_candidates: Vec::new(),
            event_date: None,
            event_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub post: Option<RedditPost>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentNode {
    pub id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<CommentNode>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentsResponse {
    pub comments: Vec<CommentNode>,
}

/// Live and post-game threads resolved for one game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedThreads {
    pub live_thread: Option<RedditPost>,
    pub post_thread: Option<RedditPost>,
}

impl ResolvedThreads {
    pub fn get(&self, kind: ThreadKind) -> Option<&RedditPost> {
        match kind {
            ThreadKind::Live => self.live_thread.as_ref(),
            ThreadKind::Post => self.post_thread.as_ref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.live_thread.is_some() && self.post_thread.is_some()
    }
}
