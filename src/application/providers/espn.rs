//! Raw scores-provider payloads.
//!
//! Every field defaults, identifiers accept strings or numbers, and scores
//! stay as loose JSON values until a transformer reads them.

use serde::Deserialize;
use serde_json::Value;

use super::lenient;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawScoreboard {
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub date: String,
    pub name: String,
    pub short_name: String,
    pub competitions: Vec<RawCompetition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCompetition {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub date: String,
    pub competitors: Vec<RawCompetitor>,
    pub status: RawStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCompetitor {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub home_away: Option<String>,
    pub team: RawTeam,
    pub score: Value,
    pub linescores: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTeam {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub abbreviation: String,
    pub display_name: String,
    pub short_display_name: String,
    pub name: String,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub logo: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub home_away: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawStatus {
    pub display_clock: String,
    #[serde(deserialize_with = "lenient::u32")]
    pub period: u32,
    #[serde(rename = "type")]
    pub kind: RawStatusType,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawStatusType {
    pub name: String,
    pub state: String,
    pub description: String,
    pub short_detail: String,
    pub completed: bool,
}

/// Game summary: header plus per-team box score.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSummary {
    pub header: RawHeader,
    pub boxscore: RawBoxscore,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawHeader {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub competitions: Vec<RawCompetition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBoxscore {
    pub teams: Vec<RawBoxscoreTeam>,
    pub players: Vec<RawPlayerGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawBoxscoreTeam {
    pub team: RawTeam,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub home_away: Option<String>,
    pub linescores: Vec<Value>,
    pub score: Value,
    pub points: Value,
}

impl RawBoxscoreTeam {
    pub fn side_flag(&self) -> Option<&str> {
        self.home_away
            .as_deref()
            .or(self.team.home_away.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPlayerGroup {
    pub team: RawTeam,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub home_away: Option<String>,
    pub statistics: Vec<RawStatBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStatBlock {
    pub names: Vec<String>,
    pub athletes: Vec<RawAthleteLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAthleteLine {
    pub athlete: RawAthlete,
    pub stats: Vec<Value>,
    pub did_not_play: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAthlete {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub display_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub short_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub jersey: Option<String>,
    pub position: Option<RawPosition>,
    /// String URL or an object carrying `href`/`url`.
    pub headshot: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPosition {
    pub abbreviation: String,
    pub name: String,
}

/// League standings grouped by conference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStandings {
    pub children: Vec<RawConference>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConference {
    pub name: String,
    pub abbreviation: String,
    pub standings: RawStandingsTable,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStandingsTable {
    pub entries: Vec<RawStandingEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStandingEntry {
    pub team: RawTeam,
    pub stats: Vec<RawStat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawStat {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
    pub display_value: String,
}
