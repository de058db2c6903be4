//! Reddit façade: daily index, thread search with fallbacks, comments.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::application::providers::reddit::{RawListing, RawPostData};
use crate::application::providers::{FeedSort, SearchQuery, SearchSort, ThreadProvider, TimeRange};
use crate::application::transform::{
    Recency, TeamFilter, find_index_post, merge_listings, transform_comments, transform_index,
    transform_search,
};
use crate::cache::{CacheKey, ReadPolicy, TieredCache};
use crate::domain::error::FetchError;
use crate::domain::reddit::{
    CommentSort, CommentsResponse, SearchRequest, SearchResponse, ThreadMapping,
};

const SOURCE: &str = "courtside::application::reddit";
pub const METRIC_FALLBACK: &str = "courtside_fallback_total";

const INDEX_QUERY: &str = "Daily Game Thread Index";
const INDEX_TTL: Duration = Duration::from_secs(10 * 60);
const SEARCH_TTL: Duration = Duration::from_secs(60);
const INDEX_POLICY: ReadPolicy = ReadPolicy::persisted(INDEX_TTL, INDEX_TTL).shared();
const SEARCH_POLICY: ReadPolicy = ReadPolicy::memory(SEARCH_TTL).shared();

pub fn comments_ttl(sort: CommentSort) -> Duration {
    match sort {
        CommentSort::Top => Duration::from_secs(2 * 60),
        CommentSort::New => Duration::from_secs(30),
    }
}

#[derive(Clone)]
pub struct RedditService {
    provider: Arc<dyn ThreadProvider>,
    cache: Arc<TieredCache>,
    subreddit: Arc<str>,
}

impl RedditService {
    pub fn new(
        provider: Arc<dyn ThreadProvider>,
        cache: Arc<TieredCache>,
        subreddit: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            provider,
            cache,
            subreddit: subreddit.into(),
        }
    }

    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }

    /// Matchups linked from today's index post. Never fails: any problem
    /// yields an empty mapping, and nothing is cached in that case.
    pub async fn index(&self) -> ThreadMapping {
        let service = self.clone();
        let result = self
            .cache
            .get_or_fetch(&CacheKey::RedditIndex.render(), INDEX_POLICY, move || {
                let service = service.clone();
                async move { service.fetch_index().await }
            })
            .await;

        match result {
            Ok(mapping) => mapping,
            Err(err @ FetchError::NotFound { .. }) => {
                debug!(target = SOURCE, error = %err, "no daily index available");
                ThreadMapping::new()
            }
            Err(err) => {
                warn!(target = SOURCE, error = %err, "daily index lookup failed");
                ThreadMapping::new()
            }
        }
    }

    async fn fetch_index(&self) -> Result<ThreadMapping, FetchError> {
        let post = self.locate_index_post().await?;
        let content = self.provider.thread_content(&post.permalink).await?;
        let mapping = transform_index(&content);
        if mapping.is_empty() {
            return Err(FetchError::not_found("reddit", "matchups in the daily index"));
        }
        info!(
            target = SOURCE,
            post_id = %post.id,
            matchups = mapping.len(),
            "daily index parsed"
        );
        Ok(mapping)
    }

    /// Search first; the hot feed stands in when search is blocked or finds nothing.
    async fn locate_index_post(&self) -> Result<RawPostData, FetchError> {
        let query = SearchQuery::new(INDEX_QUERY, TimeRange::Week, SearchSort::New);
        match self.provider.search(&query).await {
            Ok(value) => {
                let posts = RawListing::decode(&value)?.into_posts();
                if let Some(post) = find_index_post(&posts) {
                    return Ok(post.clone());
                }
            }
            Err(err) if err.is_blocked() => {
                counter!(METRIC_FALLBACK, "stage" => "index_feed").increment(1);
                warn!(
                    target = SOURCE,
                    status = err.status(),
                    "index search blocked; trying the hot feed"
                );
            }
            Err(err) => return Err(err),
        }

        let hot = self
            .provider
            .subreddit_feed(&self.subreddit, FeedSort::Hot)
            .await?;
        let posts = RawListing::decode(&hot)?.into_posts();
        find_index_post(&posts)
            .cloned()
            .ok_or_else(|| FetchError::not_found("reddit", "daily game thread index"))
    }

    /// Best thread for the request, or `post: None` when nothing matches.
    pub async fn search_thread(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, FetchError> {
        let key = CacheKey::RedditSearch(request).render();
        let service = self.clone();
        let request = request.clone();

        self.cache
            .get_or_fetch(&key, SEARCH_POLICY, move || {
                let service = service.clone();
                let request = request.clone();
                async move { service.fetch_search(&request).await }
            })
            .await
    }

    async fn fetch_search(&self, request: &SearchRequest) -> Result<SearchResponse, FetchError> {
        let recency = Recency::for_request(request, OffsetDateTime::now_utc());
        let query = recency.search_query(request);

        match self.provider.search(&query).await {
            Ok(value) => match RawListing::decode(&value) {
                Ok(listing) => Ok(transform_search(
                    &listing.into_posts(),
                    request,
                    recency,
                    TeamFilter::Lenient,
                )),
                Err(err) => {
                    warn!(target = SOURCE, error = %err, "search payload ignored");
                    Ok(SearchResponse::default())
                }
            },
            Err(err) if err.is_blocked() => {
                counter!(METRIC_FALLBACK, "stage" => "search_feed").increment(1);
                warn!(
                    target = SOURCE,
                    status = err.status(),
                    kind = %request.kind,
                    "thread search blocked; falling back to feeds"
                );
                Ok(self.search_feeds(request, recency).await)
            }
            Err(err) => Err(err),
        }
    }

    /// Client-side search over the `new` and `hot` feeds with the strict team filter.
    async fn search_feeds(&self, request: &SearchRequest, recency: Recency) -> SearchResponse {
        let (new, hot) = tokio::join!(
            self.provider.subreddit_feed(&self.subreddit, FeedSort::New),
            self.provider.subreddit_feed(&self.subreddit, FeedSort::Hot)
        );

        let listings: Vec<RawListing> = [(FeedSort::New, new), (FeedSort::Hot, hot)]
            .into_iter()
            .filter_map(|(sort, feed)| {
                match feed.and_then(|value| RawListing::decode(&value)) {
                    Ok(listing) => Some(listing),
                    Err(err) => {
                        warn!(
                            target = SOURCE,
                            feed = %sort,
                            error = %err,
                            "feed fallback unavailable"
                        );
                        None
                    }
                }
            })
            .collect();

        transform_search(
            &merge_listings(listings),
            request,
            recency,
            TeamFilter::Strict,
        )
    }

    /// Comment tree for a post. `bypass` discards cached copies first.
    pub async fn comments(
        &self,
        post_id: &str,
        sort: CommentSort,
        permalink: Option<&str>,
        bypass: bool,
    ) -> Result<CommentsResponse, FetchError> {
        let key = CacheKey::RedditComments { post_id, sort }.render();
        if bypass {
            self.cache.invalidate(&key).await;
        }
        let ttl = comments_ttl(sort);
        let provider = Arc::clone(&self.provider);
        let post_id = post_id.to_string();
        let permalink = permalink
            .filter(|permalink| !permalink.is_empty())
            .map(str::to_string);

        self.cache
            .get_or_fetch(&key, ReadPolicy::persisted(ttl, ttl).shared(), move || {
                let provider = Arc::clone(&provider);
                let post_id = post_id.clone();
                let permalink = permalink.clone();
                async move {
                    let value = provider
                        .comments(&post_id, sort, permalink.as_deref())
                        .await?;
                    Ok(transform_comments(&value))
                }
            })
            .await
    }

    /// Raw listing of a subreddit feed, uncached.
    pub async fn subreddit_feed(&self, subreddit: &str, sort: FeedSort) -> Result<Value, FetchError> {
        self.provider.subreddit_feed(subreddit, sort).await
    }

    /// Raw thread payload for a permalink, uncached.
    pub async fn thread_content(&self, permalink: &str) -> Result<Value, FetchError> {
        self.provider.thread_content(permalink).await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear_memory().await;
    }
}
