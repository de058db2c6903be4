//! League-wide season stat tables.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::Date;

/// One stats result set: column headers and one object per row keyed by header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatTable {
    pub headers: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonLeaders {
    pub season: String,
    pub players: StatTable,
    pub teams: StatTable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonPlayers {
    pub season: String,
    pub players: StatTable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkLeaders {
    pub seasons: Vec<SeasonPlayers>,
}

/// Aggregation applied to every stat column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PerMode {
    #[default]
    PerGame,
    Totals,
    Per36,
    Per48,
    Per100Possessions,
}

impl PerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PerMode::PerGame => "PerGame",
            PerMode::Totals => "Totals",
            PerMode::Per36 => "Per36",
            PerMode::Per48 => "Per48",
            PerMode::Per100Possessions => "Per100Possessions",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        [
            PerMode::PerGame,
            PerMode::Totals,
            PerMode::Per36,
            PerMode::Per48,
            PerMode::Per100Possessions,
        ]
        .into_iter()
        .find(|mode| mode.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for PerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Season label (`2024-25`) containing `date`. Seasons roll over in October.
pub fn season_for(date: Date) -> String {
    let start = if u8::from(date.month()) >= 10 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{start}-{:02}", (start + 1).rem_euclid(100))
}

/// Whether `raw` is a `YYYY-YY` label of two consecutive years.
pub fn is_season_label(raw: &str) -> bool {
    let Some((start, end)) = raw.split_once('-') else {
        return false;
    };
    let digits = |part: &str, len: usize| {
        part.len() == len && part.bytes().all(|byte| byte.is_ascii_digit())
    };
    if !digits(start, 4) || !digits(end, 2) {
        return false;
    }
    match (start.parse::<i32>(), end.parse::<i32>()) {
        (Ok(start), Ok(end)) => (start + 1).rem_euclid(100) == end,
        _ => false,
    }
}
