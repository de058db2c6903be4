//! Remote shared cache over a PostgREST table.
//!
//! Rows are `{key, data, expires_at, updated_at}`; timestamps are RFC 3339.
//! Any failure is logged and reads as a miss.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheTier, TierEntry};
use crate::config::RemoteSettings;

use super::error::InfraError;
use super::upstream::join_path;

const SOURCE: &str = "courtside::infra::remote";

#[derive(Debug, Deserialize)]
struct RemoteRow {
    data: Value,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    key: &'a str,
    data: &'a Value,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct RemoteCache {
    client: Client,
    table_url: Url,
    api_key: Option<String>,
}

impl RemoteCache {
    pub fn new(client: Client, base: &Url, table: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            table_url: join_path(base, &[table]),
            api_key,
        }
    }

    /// `None` when no remote URL is configured.
    pub fn from_settings(client: Client, settings: &RemoteSettings) -> Option<Self> {
        let base = settings.url.as_ref()?;
        Some(Self::new(
            client,
            base,
            &settings.table,
            settings.api_key.clone(),
        ))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    fn filtered(&self, filters: &[(&str, &str)]) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (column, filter) in filters {
                pairs.append_pair(column, filter);
            }
        }
        url
    }

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, InfraError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(InfraError::storage(format!(
            "remote cache answered {status}: {}",
            body.chars().take(100).collect::<String>()
        )))
    }

    async fn try_get(&self, key: &str) -> Result<Option<TierEntry>, InfraError> {
        let url = self.filtered(&[
            ("key", format!("eq.{key}").as_str()),
            ("select", "data,expires_at,updated_at"),
        ]);
        let rows: Vec<RemoteRow> = self.execute(self.client.get(url)).await?.json().await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc();
        if row.expires_at < now {
            debug!(target = SOURCE, key, "remote entry expired");
            self.try_delete(key).await?;
            return Ok(None);
        }
        Ok(Some(TierEntry {
            value: row.data,
            written_at: row.updated_at.unwrap_or(now),
        }))
    }

    async fn try_set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), InfraError> {
        let now = OffsetDateTime::now_utc();
        let row = UpsertRow {
            key,
            data: value,
            expires_at: now + ttl,
            updated_at: now,
        };
        let url = self.filtered(&[("on_conflict", "key")]);
        let request = self
            .client
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);
        self.execute(request).await.map(|_| ())
    }

    async fn try_delete(&self, key: &str) -> Result<(), InfraError> {
        let url = self.filtered(&[("key", format!("eq.{key}").as_str())]);
        self.execute(self.client.delete(url)).await.map(|_| ())
    }

    async fn try_cleanup(&self) -> Result<usize, InfraError> {
        let cutoff = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| InfraError::storage(err.to_string()))?;
        let url = self.filtered(&[("expires_at", format!("lt.{cutoff}").as_str()), ("select", "key")]);
        let response = self
            .execute(
                self.client
                    .delete(url)
                    .header("Prefer", "return=representation"),
            )
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(0);
        }
        let removed: Vec<Value> = response.json().await?;
        Ok(removed.len())
    }

    fn report(&self, op: &'static str, key: &str, err: &InfraError) {
        warn!(target = SOURCE, op, key, error = %err, "remote cache operation failed");
    }
}

#[async_trait]
impl CacheTier for RemoteCache {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &str) -> Option<TierEntry> {
        self.try_get(key).await.unwrap_or_else(|err| {
            self.report("get", key, &err);
            None
        })
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        if let Err(err) = self.try_set(key, value, ttl).await {
            self.report("set", key, &err);
        }
    }

    async fn delete(&self, key: &str) {
        if let Err(err) = self.try_delete(key).await {
            self.report("delete", key, &err);
        }
    }

    async fn clear(&self) {
        let url = self.filtered(&[("key", "neq.")]);
        if let Err(err) = self.execute(self.client.delete(url)).await {
            self.report("clear", "*", &err);
        }
    }

    async fn cleanup(&self) -> usize {
        self.try_cleanup().await.unwrap_or_else(|err| {
            self.report("cleanup", "*", &err);
            0
        })
    }
}
