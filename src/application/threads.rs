//! Live and post-game thread resolution for a matchup.
//!
//! The daily index is consulted first; each thread kind it lacks is looked
//! up through [`RedditService::search_thread`], which carries its own feed
//! fallback. Nothing here fails: an unresolved kind is simply absent.

use serde::Deserialize;
use tracing::warn;

use crate::application::reddit::RedditService;
use crate::domain::error::FetchError;
use crate::domain::reddit::{
    CommentSort, CommentsResponse, RedditPost, ResolvedThreads, SearchRequest, ThreadKind,
};
use crate::domain::teams::{mascot_name, pair_key};

const SOURCE: &str = "courtside::application::threads";

/// Teams of one game, as named by the scoreboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matchup {
    pub away: String,
    pub home: String,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

impl Matchup {
    pub fn new(away: impl Into<String>, home: impl Into<String>) -> Self {
        Self {
            away: away.into(),
            home: home.into(),
            ..Self::default()
        }
    }

    pub fn pair_key(&self) -> String {
        pair_key(&self.away, &self.home)
    }

    fn search_request(&self, kind: ThreadKind) -> SearchRequest {
        SearchRequest {
            away_candidates: vec![mascot_name(&self.away)],
            home_candidates: vec![mascot_name(&self.home)],
            event_date: self.event_date.clone(),
            event_id: self.event_id.clone(),
            ..SearchRequest::new(kind)
        }
    }
}

#[derive(Clone)]
pub struct ThreadResolver {
    reddit: RedditService,
}

impl ThreadResolver {
    pub fn new(reddit: RedditService) -> Self {
        Self { reddit }
    }

    pub fn reddit(&self) -> &RedditService {
        &self.reddit
    }

    pub async fn resolve(&self, matchup: &Matchup) -> ResolvedThreads {
        let index = self.reddit.index().await;
        let indexed = index.get(&matchup.pair_key()).cloned().unwrap_or_default();

        let (live_thread, post_thread) = tokio::join!(
            self.pick(indexed.gdt, matchup, ThreadKind::Live),
            self.pick(indexed.pgt, matchup, ThreadKind::Post)
        );
        ResolvedThreads {
            live_thread,
            post_thread,
        }
    }

    async fn pick(
        &self,
        indexed: Option<RedditPost>,
        matchup: &Matchup,
        kind: ThreadKind,
    ) -> Option<RedditPost> {
        if indexed.is_some() {
            return indexed;
        }
        match self
            .reddit
            .search_thread(&matchup.search_request(kind))
            .await
        {
            Ok(found) => found.post,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    away = %matchup.away,
                    home = %matchup.home,
                    kind = %kind,
                    error = %err,
                    "thread search failed"
                );
                None
            }
        }
    }

    /// Resolves threads, then loads their comments into the cache:
    /// newest first for the live thread, top for the post-game thread.
    pub async fn prewarm(&self, matchup: &Matchup) -> ResolvedThreads {
        let resolved = self.resolve(matchup).await;
        tokio::join!(
            self.warm_comments(resolved.live_thread.as_ref(), CommentSort::New),
            self.warm_comments(resolved.post_thread.as_ref(), CommentSort::Top)
        );
        resolved
    }

    async fn warm_comments(&self, post: Option<&RedditPost>, sort: CommentSort) {
        let Some(post) = post else {
            return;
        };
        if let Err(err) = self
            .reddit
            .comments(&post.id, sort, post.permalink.as_deref(), false)
            .await
        {
            warn!(
                target = SOURCE,
                post_id = %post.id,
                sort = sort.as_str(),
                error = %err,
                "comment prewarm failed"
            );
        }
    }

    /// Fresh live-thread comments, bypassing every cache; `None` when the
    /// game has no live thread.
    pub async fn refresh_live(
        &self,
        matchup: &Matchup,
    ) -> Result<Option<CommentsResponse>, FetchError> {
        let resolved = self.resolve(matchup).await;
        let Some(live) = resolved.live_thread else {
            return Ok(None);
        };
        self.reddit
            .comments(&live.id, CommentSort::New, live.permalink.as_deref(), true)
            .await
            .map(Some)
    }
}
