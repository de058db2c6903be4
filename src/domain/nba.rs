//! Normalized scoreboard, box score and standings shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "home" => Some(Side::Home),
            "away" => Some(Side::Away),
            _ => None,
        }
    }
}

/// A value held once per side of a matchup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidePair<T> {
    pub home: T,
    pub away: T,
}

impl<T> SidePair<T> {
    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamRef {
    pub id: String,
    pub abbreviation: String,
    pub display_name: String,
    pub short_display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl TeamRef {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.display_name.is_empty() && self.abbreviation.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusType {
    pub name: String,
    pub state: String,
    pub description: String,
    pub short_detail: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameStatus {
    pub display_clock: String,
    pub period: u32,
    #[serde(rename = "type")]
    pub kind: StatusType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodScore {
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub team: TeamRef,
    pub home_away: Side,
    pub score: u32,
    pub linescores: Vec<PeriodScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Competition {
    pub id: String,
    pub competitors: Vec<Competitor>,
    pub status: GameStatus,
}

impl Competition {
    pub fn competitor(&self, side: Side) -> Option<&Competitor> {
        self.competitors.iter().find(|c| c.home_away == side)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameEvent {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub date: String,
    pub competitions: Vec<Competition>,
}

impl GameEvent {
    pub fn competition(&self) -> Option<&Competition> {
        self.competitions.first()
    }

    /// Away and home display names, when both competitors are present.
    pub fn team_names(&self) -> Option<(String, String)> {
        let competition = self.competition()?;
        let away = competition.competitor(Side::Away)?;
        let home = competition.competitor(Side::Home)?;
        if away.team.display_name.is_empty() || home.team.display_name.is_empty() {
            return None;
        }
        Some((
            away.team.display_name.clone(),
            home.team.display_name.clone(),
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreboardResponse {
    pub events: Vec<GameEvent>,
}

impl ScoreboardResponse {
    pub fn event(&self, event_id: &str) -> Option<&GameEvent> {
        self.events.iter().find(|event| event.id == event_id)
    }
}

/// Box score cell: counting stats are numeric, minutes stay textual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(i64),
    Text(String),
}

impl StatValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StatValue::Text(text) => Some(text),
            StatValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            StatValue::Number(value) => Some(*value),
            StatValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub name: String,
    pub dnp: bool,
    pub stats: BTreeMap<String, StatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jersey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headshot: Option<String>,
}

impl PlayerRow {
    pub fn stat(&self, key: &str) -> Option<&StatValue> {
        self.stats.get(key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamLine {
    pub team: TeamRef,
    pub periods: Vec<u32>,
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxscoreStatus {
    pub clock: String,
    pub period: u32,
    pub short: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxscoreResponse {
    pub id: String,
    pub event_date: String,
    pub players: SidePair<Vec<PlayerRow>>,
    pub linescores: SidePair<TeamLine>,
    pub names: Vec<String>,
    pub status: BoxscoreStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingRow {
    pub team: TeamRef,
    pub wins: u32,
    pub losses: u32,
    pub win_pct: f64,
    pub games_behind: f64,
    pub streak: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConferenceStandings {
    pub name: String,
    pub abbreviation: String,
    pub teams: Vec<StandingRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandingsResponse {
    pub conferences: Vec<ConferenceStandings>,
}
