//! Raw thread-provider payloads.

use serde::Deserialize;
use serde_json::Value;

use super::lenient;
use crate::domain::error::FetchError;

/// `{kind: "Listing", data: {children: [...]}}` as returned by search and feeds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawListing {
    pub data: RawListingData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawListingData {
    pub children: Vec<RawThing>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawThing {
    pub kind: String,
    pub data: RawPostData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPostData {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub title: String,
    pub permalink: String,
    pub selftext: String,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub created_utc: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub score: Option<i64>,
}

/// One `t1` node; replies are walked separately from the raw value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawComment {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub author: String,
    pub body: Option<String>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub score: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub created_utc: Option<f64>,
}

impl RawListing {
    pub fn decode(value: &Value) -> Result<Self, FetchError> {
        Self::deserialize(value).map_err(|err| FetchError::malformed("reddit", err.to_string()))
    }

    pub fn posts(&self) -> impl Iterator<Item = &RawPostData> {
        self.data.children.iter().map(|child| &child.data)
    }

    pub fn into_posts(self) -> Vec<RawPostData> {
        self.data.children.into_iter().map(|child| child.data).collect()
    }
}

impl RawPostData {
    /// Creation time with a missing stamp read as zero, for ordering.
    pub fn created_or_zero(&self) -> f64 {
        self.created_utc.unwrap_or(0.0)
    }
}
