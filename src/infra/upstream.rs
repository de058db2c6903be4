//! Shared HTTP plumbing for the upstream adapters.

use std::time::Duration;

use metrics::{counter, histogram};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::domain::error::FetchError;

use super::error::InfraError;

const SOURCE: &str = "courtside::infra::upstream";
pub const METRIC_UPSTREAM_ERROR: &str = "courtside_upstream_error_total";
pub const METRIC_UPSTREAM_FETCH_MS: &str = "courtside_upstream_fetch_ms";

/// Desktop-browser identity sent on direct Reddit requests and by the bridge.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
pub const ACCEPT_JSON: &str = "application/json, text/plain, */*";

const BODY_PREVIEW_CHARS: usize = 100;

pub fn user_agent() -> &'static str {
    concat!("courtside/", env!("CARGO_PKG_VERSION"))
}

/// Client shared by every adapter. The timeout bounds each whole request.
pub fn build_client(timeout: Duration) -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(timeout)
        .build()
        .map_err(InfraError::from)
}

/// One upstream, identified by name in errors, logs and metrics.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client,
    provider: &'static str,
}

impl Upstream {
    pub fn new(client: Client, provider: &'static str) -> Self {
        Self { client, provider }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    /// GET `url` and decode the body as JSON.
    ///
    /// Any non-2xx answer becomes [`FetchError::Upstream`]; no retries.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, FetchError> {
        let started = Instant::now();
        let result = self.send(operation, request).await;
        histogram!(
            METRIC_UPSTREAM_FETCH_MS,
            "provider" => self.provider,
            "operation" => operation
        )
        .record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, FetchError> {
        let response = request
            .send()
            .await
            .map_err(|err| {
                self.record_error("transport");
                warn!(
                    target = SOURCE,
                    provider = self.provider,
                    operation,
                    error = %err,
                    "upstream request failed"
                );
                FetchError::transport(self.provider, err.to_string())
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            self.record_error("transport");
            FetchError::transport(self.provider, err.to_string())
        })?;

        if !status.is_success() {
            self.record_error(if matches!(status.as_u16(), 403 | 429) {
                "blocked"
            } else {
                "status"
            });
            let preview: String = String::from_utf8_lossy(&bytes)
                .chars()
                .take(BODY_PREVIEW_CHARS)
                .collect();
            warn!(
                target = SOURCE,
                provider = self.provider,
                operation,
                status = status.as_u16(),
                body = %preview,
                "upstream answered with an error status"
            );
            return Err(FetchError::upstream(
                self.provider,
                operation,
                status.as_u16(),
            ));
        }

        debug!(
            target = SOURCE,
            provider = self.provider,
            operation,
            bytes = bytes.len(),
            "upstream answered"
        );
        serde_json::from_slice(&bytes).map_err(|err| {
            self.record_error("malformed");
            FetchError::malformed(self.provider, err.to_string())
        })
    }

    fn record_error(&self, kind: &'static str) {
        counter!(METRIC_UPSTREAM_ERROR, "provider" => self.provider, "kind" => kind).increment(1);
    }
}

/// Appends path segments to `base`, keeping any path `base` already has.
pub fn join_path(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    url
}
