//! Thread provider backed by Reddit's public JSON listings.
//!
//! Direct mode talks to Reddit with browser headers. Proxy mode wraps every
//! target URL as `{proxy}?url=<target>` and sends no custom headers; the
//! bridge adds them.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use serde_json::Value;
use url::Url;

use crate::application::providers::{FeedSort, SearchQuery, ThreadProvider};
use crate::config::UpstreamSettings;
use crate::domain::error::FetchError;
use crate::domain::reddit::CommentSort;

use super::upstream::{ACCEPT_JSON, BROWSER_USER_AGENT, Upstream, join_path};

const PROVIDER: &str = "reddit";
const FEED_LIMIT: &str = "100";

#[derive(Clone, Debug)]
pub enum RedditRoute {
    Direct,
    Proxy(Url),
}

#[derive(Clone, Debug)]
pub struct RedditClient {
    upstream: Upstream,
    base: Url,
    subreddit: String,
    route: RedditRoute,
}

impl RedditClient {
    pub fn new(client: Client, base: Url, subreddit: impl Into<String>, route: RedditRoute) -> Self {
        Self {
            upstream: Upstream::new(client, PROVIDER),
            base,
            subreddit: subreddit.into(),
            route,
        }
    }

    pub fn from_settings(client: Client, settings: &UpstreamSettings) -> Self {
        let route = match settings.reddit_proxy_base.clone() {
            Some(proxy) => RedditRoute::Proxy(proxy),
            None => RedditRoute::Direct,
        };
        Self::new(
            client,
            settings.reddit_base.clone(),
            settings.subreddit.clone(),
            route,
        )
    }

    /// `{base}{permalink}.json`, tolerating a missing leading or trailing slash.
    fn permalink_url(&self, permalink: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        let permalink = permalink.trim_matches('/');
        url.set_path(&format!("{prefix}/{permalink}.json"));
        url
    }

    fn request(&self, target: Url) -> RequestBuilder {
        match &self.route {
            RedditRoute::Direct => self
                .upstream
                .get(target)
                .header(header::USER_AGENT, BROWSER_USER_AGENT)
                .header(header::ACCEPT, ACCEPT_JSON),
            RedditRoute::Proxy(proxy) => {
                let mut bridged = proxy.clone();
                bridged
                    .query_pairs_mut()
                    .append_pair("url", target.as_str());
                self.upstream.get(bridged)
            }
        }
    }
}

#[async_trait]
impl ThreadProvider for RedditClient {
    async fn search(&self, query: &SearchQuery) -> Result<Value, FetchError> {
        let mut url = join_path(&self.base, &["r", self.subreddit.as_str(), "search.json"]);
        url.query_pairs_mut()
            .append_pair("q", &query.text)
            .append_pair("restrict_sr", "1")
            .append_pair("sort", query.sort.as_str())
            .append_pair("t", query.time_range.as_str());
        self.upstream.get_json("search", self.request(url)).await
    }

    async fn comments(
        &self,
        post_id: &str,
        sort: CommentSort,
        permalink: Option<&str>,
    ) -> Result<Value, FetchError> {
        let mut url = match permalink {
            Some(permalink) => self.permalink_url(permalink),
            None => join_path(&self.base, &["comments", format!("{post_id}.json").as_str()]),
        };
        url.query_pairs_mut().append_pair("sort", sort.as_str());
        self.upstream.get_json("comments", self.request(url)).await
    }

    async fn thread_content(&self, permalink: &str) -> Result<Value, FetchError> {
        let url = self.permalink_url(permalink);
        self.upstream
            .get_json("thread_content", self.request(url))
            .await
    }

    async fn subreddit_feed(&self, subreddit: &str, sort: FeedSort) -> Result<Value, FetchError> {
        let listing = format!("{}.json", sort.as_str());
        let mut url = join_path(&self.base, &["r", subreddit, listing.as_str()]);
        url.query_pairs_mut().append_pair("limit", FEED_LIMIT);
        self.upstream.get_json("feed", self.request(url)).await
    }
}
