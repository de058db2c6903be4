//! Same-origin bridge that fetches reddit.com URLs with full browser headers.

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, redirect};
use serde::Deserialize;
use url::Url;

use crate::application::error::HttpError;
use crate::infra::error::InfraError;
use crate::infra::upstream::{ACCEPT_JSON, BROWSER_USER_AGENT};

const SOURCE: &str = "infra::http::proxy";
const MAX_REDIRECTS: usize = 5;

const BROWSER_HEADERS: [(&str, &str); 8] = [
    ("accept-language", "en-US,en;q=0.9"),
    (
        "sec-ch-ua",
        "\"Not A(Brand\";v=\"99\", \"Google Chrome\";v=\"121\", \"Chromium\";v=\"121\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
    ("referer", "https://www.reddit.com/"),
];

#[derive(Clone, Debug)]
pub struct RedditBridge {
    client: Client,
}

impl RedditBridge {
    /// The bridge owns its client: redirects are followed only while they stay
    /// on reddit hosts.
    pub fn new(timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::custom(|attempt| {
                let on_reddit = is_reddit_url(attempt.url());
                if attempt.previous().len() >= MAX_REDIRECTS || !on_reddit {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            }))
            .build()?;
        Ok(Self { client })
    }

    async fn forward(&self, target: Url) -> Result<Response, HttpError> {
        let mut request = self
            .client
            .get(target.clone())
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .header(header::ACCEPT, ACCEPT_JSON);
        for (name, value) in BROWSER_HEADERS {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|err| {
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Bridge failed to fetch",
                &err,
            )
        })?;
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let body: Bytes = response.bytes().await.map_err(|err| {
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Bridge failed to fetch",
                &err,
            )
        })?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body).into_owned();
            return Err(HttpError::new(
                SOURCE,
                status,
                text,
                format!("upstream answered {status} for {target}"),
            ));
        }

        if serde_json::from_slice::<serde::de::IgnoredAny>(&body).is_err() {
            return Err(HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Bridge failed to fetch",
                format!("non-JSON body from {target}"),
            ));
        }

        Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
}

fn is_reddit_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
        && url
            .host_str()
            .is_some_and(|host| host == "reddit.com" || host.ends_with(".reddit.com"))
}

/// Only `reddit.com` and its subdomains pass.
pub fn allowed_target(raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw).map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid url parameter", &err)
    })?;
    if !is_reddit_url(&url) {
        return Err(HttpError::new(
            SOURCE,
            StatusCode::FORBIDDEN,
            "Only reddit.com URLs are allowed",
            format!("rejected proxy target {raw}"),
        ));
    }
    Ok(url)
}

pub async fn reddit_proxy(
    State(bridge): State<RedditBridge>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, HttpError> {
    let raw = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Missing url parameter",
                "url query parameter absent",
            )
        })?;
    let target = allowed_target(&raw)?;
    bridge.forward(target).await
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    #[test]
    fn reddit_hosts_are_allowed() {
        assert!(allowed_target("https://www.reddit.com/r/nba/new.json").is_ok());
        assert!(allowed_target("https://old.reddit.com/r/nba.json").is_ok());
        assert!(allowed_target("https://reddit.com/comments/abc.json").is_ok());
    }

    #[test]
    fn lookalike_hosts_are_rejected() {
        for raw in [
            "https://evilreddit.com/r/nba.json",
            "https://reddit.com.evil.example/r/nba.json",
            "https://example.com/?q=reddit.com",
            "ftp://www.reddit.com/r/nba.json",
        ] {
            let err = allowed_target(raw).expect_err("host must be rejected");
            assert_eq!(err.status(), StatusCode::FORBIDDEN, "{raw}");
        }
    }

    #[test]
    fn unparsable_target_is_a_bad_request() {
        let err = allowed_target("not a url").expect_err("must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn redirects_off_reddit_are_not_followed() {
        let landing = MockServer::start_async().await;
        landing
            .mock_async(|when, then| {
                when.method("GET").path("/landing");
                then.status(200).json_body(serde_json::json!({"leaked": true}));
            })
            .await;
        let origin = MockServer::start_async().await;
        origin
            .mock_async(|when, then| {
                when.method("GET").path("/r/nba/new.json");
                then.status(302)
                    .header("location", landing.url("/landing").as_str());
            })
            .await;

        let bridge = RedditBridge::new(Duration::from_secs(5)).expect("bridge client");
        let target = Url::parse(&origin.url("/r/nba/new.json")).expect("target url");
        let err = bridge
            .forward(target)
            .await
            .expect_err("redirect must not be followed");

        assert_eq!(err.status(), StatusCode::FOUND);
    }
}
