//! Scoreboard and box-score normalization.

use serde_json::Value;

use crate::application::providers::espn::{
    RawAthleteLine, RawCompetition, RawCompetitor, RawEvent, RawScoreboard, RawSummary, RawTeam,
};
use crate::application::providers::lenient;
use crate::domain::nba::{
    BoxscoreResponse, BoxscoreStatus, Competition, Competitor, GameEvent, GameStatus, PeriodScore,
    PlayerRow, ScoreboardResponse, Side, SidePair, StatValue, StatusType, TeamLine, TeamRef,
};

const HEADSHOT_CDN: &str = "https://a.espncdn.com/i/headshots/nba/players/full";
/// Stat columns reported as a single `made-attempted` string.
const SHOOTING_COLUMNS: [(&str, &str); 3] = [("FG", "FG"), ("3PT", "3P"), ("FT", "FT")];
/// Column order of every served box score, whatever order the provider uses.
pub const BOXSCORE_COLUMNS: [&str; 14] = [
    "MIN", "PTS", "FG", "3PT", "FT", "REB", "AST", "TO", "STL", "BLK", "OREB", "DREB", "PF", "+/-",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MakesAttempts {
    pub makes: i64,
    pub attempts: i64,
    /// Rounded percentage; zero when nothing was attempted.
    pub pct: i64,
}

/// Splits `"7-12"` into makes, attempts and a rounded percentage.
pub fn parse_makes_attempts(raw: &str) -> MakesAttempts {
    let (made, attempted) = raw.split_once('-').unwrap_or((raw, ""));
    let makes = loose_int(made);
    let attempts = loose_int(attempted);
    let pct = if attempts > 0 {
        (makes as f64 / attempts as f64 * 100.0).round() as i64
    } else {
        0
    };
    MakesAttempts {
        makes,
        attempts,
        pct,
    }
}

fn loose_int(raw: &str) -> i64 {
    lenient::number(&Value::String(raw.to_string())).round() as i64
}

/// Seconds played, reading `"MM:SS"`, plain minute counts and `DNP`.
pub fn minutes_to_seconds(minutes: Option<&StatValue>) -> i64 {
    match minutes {
        Some(StatValue::Number(value)) => *value,
        Some(StatValue::Text(text)) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("DNP") {
                return 0;
            }
            if let Some((mins, secs)) = text.split_once(':')
                && let (Ok(mins), Ok(secs)) = (mins.parse::<i64>(), secs.parse::<i64>())
            {
                return mins * 60 + secs;
            }
            text.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(|value| value.round() as i64)
                .unwrap_or(0)
        }
        None => 0,
    }
}

pub fn transform_scoreboard(raw: RawScoreboard) -> ScoreboardResponse {
    ScoreboardResponse {
        events: raw.events.iter().map(game_event).collect(),
    }
}

fn game_event(raw: &RawEvent) -> GameEvent {
    GameEvent {
        id: raw.id.clone(),
        name: raw.name.clone(),
        short_name: raw.short_name.clone(),
        date: raw.date.clone(),
        competitions: raw.competitions.iter().map(competition).collect(),
    }
}

pub(crate) fn competition(raw: &RawCompetition) -> Competition {
    Competition {
        id: raw.id.clone(),
        competitors: raw
            .competitors
            .iter()
            .enumerate()
            .map(|(index, competitor)| competitor_from(index, competitor))
            .collect(),
        status: GameStatus {
            display_clock: raw.status.display_clock.clone(),
            period: raw.status.period,
            kind: StatusType {
                name: raw.status.kind.name.clone(),
                state: raw.status.kind.state.clone(),
                description: raw.status.kind.description.clone(),
                short_detail: raw.status.kind.short_detail.clone(),
                completed: raw.status.kind.completed,
            },
        },
    }
}

fn competitor_from(index: usize, raw: &RawCompetitor) -> Competitor {
    let home_away = raw
        .home_away
        .as_deref()
        .and_then(Side::from_flag)
        .unwrap_or(positional_side(index));
    Competitor {
        team: team_ref(&raw.team),
        home_away,
        score: lenient::to_u32(&raw.score),
        linescores: raw
            .linescores
            .iter()
            .map(|period| PeriodScore {
                value: period_value(period),
            })
            .collect(),
    }
}

pub(crate) fn team_ref(raw: &RawTeam) -> TeamRef {
    TeamRef {
        id: raw.id.clone(),
        abbreviation: raw.abbreviation.clone(),
        display_name: if raw.display_name.is_empty() {
            raw.name.clone()
        } else {
            raw.display_name.clone()
        },
        short_display_name: raw.short_display_name.clone(),
        logo: raw.logo.clone(),
    }
}

/// First listed team is the visitor.
fn positional_side(index: usize) -> Side {
    if index == 0 { Side::Away } else { Side::Home }
}

/// Period score from `{value}`, `{displayValue}`, `{score}` or a bare scalar.
fn period_value(raw: &Value) -> u32 {
    let scalar = match raw {
        Value::Object(fields) => ["value", "displayValue", "score"]
            .iter()
            .find_map(|field| fields.get(*field).filter(|value| !value.is_null()))
            .unwrap_or(&Value::Null),
        other => other,
    };
    lenient::to_u32(scalar)
}

/// Joins a game summary with its scoreboard event.
///
/// Without the event, sides come from the summary's own flags and the header
/// competition stands in for scores and status.
pub fn transform_boxscore(summary: &RawSummary, event: Option<&GameEvent>) -> BoxscoreResponse {
    let header = summary.header.competitions.first();
    let header_competition = header.map(competition);
    let reference = event
        .and_then(GameEvent::competition)
        .or(header_competition.as_ref());

    let (players, names) = normalize_players(summary, event.and_then(GameEvent::competition));
    let linescores = parse_linescores(summary, reference);

    let status = reference
        .map(|competition| BoxscoreStatus {
            clock: competition.status.display_clock.clone(),
            period: competition.status.period,
            short: competition.status.kind.short_detail.clone(),
            name: competition.status.kind.name.clone(),
        })
        .unwrap_or_default();

    let id = if summary.header.id.is_empty() {
        event.map(|event| event.id.clone()).unwrap_or_default()
    } else {
        summary.header.id.clone()
    };
    let event_date = event
        .map(|event| event.date.clone())
        .filter(|date| !date.is_empty())
        .or_else(|| header.map(|competition| competition.date.clone()))
        .unwrap_or_default();

    BoxscoreResponse {
        id,
        event_date,
        players,
        linescores,
        names,
        status,
    }
}

/// Keys each player's stats by the provider's column labels and assigns each
/// team to a side. The returned names are always [`BOXSCORE_COLUMNS`].
///
/// Side resolution prefers the scoreboard's team ids, then the summary's own
/// `homeAway`, then position. A side already taken pushes the team to the
/// other one.
pub fn normalize_players(
    summary: &RawSummary,
    scoreboard: Option<&Competition>,
) -> (SidePair<Vec<PlayerRow>>, Vec<String>) {
    let mut players = SidePair::<Vec<PlayerRow>>::default();
    let mut taken = SidePair::<bool>::default();
    let names = BOXSCORE_COLUMNS.iter().map(|column| column.to_string()).collect();

    for (index, group) in summary.boxscore.players.iter().enumerate() {
        let by_id = scoreboard.and_then(|competition| {
            competition
                .competitors
                .iter()
                .find(|competitor| !group.team.id.is_empty() && competitor.team.id == group.team.id)
                .map(|competitor| competitor.home_away)
        });
        let declared = group
            .home_away
            .as_deref()
            .or(group.team.home_away.as_deref())
            .and_then(Side::from_flag);
        let mut side = by_id.or(declared).unwrap_or(positional_side(index));
        if *taken.get(side) {
            side = side.opposite();
        }
        *taken.get_mut(side) = true;

        let Some(block) = group.statistics.first() else {
            continue;
        };
        let mut rows: Vec<PlayerRow> = block
            .athletes
            .iter()
            .map(|line| player_row(line, &block.names))
            .collect();
        rows.sort_by_key(bench_rank);
        *players.get_mut(side) = rows;
    }

    (players, names)
}

/// Zero for players who saw the floor; DNP and scoreless minutes sink.
fn bench_rank(row: &PlayerRow) -> u8 {
    if row.dnp || minutes_to_seconds(row.stat("MIN")) <= 0 {
        1
    } else {
        0
    }
}

fn player_row(line: &RawAthleteLine, names: &[String]) -> PlayerRow {
    let mut row = PlayerRow {
        name: line
            .athlete
            .display_name
            .clone()
            .or_else(|| line.athlete.short_name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        id: line.athlete.id.clone(),
        jersey: line.athlete.jersey.clone(),
        position: line.athlete.position.as_ref().and_then(|position| {
            [&position.abbreviation, &position.name]
                .into_iter()
                .find(|value| !value.is_empty())
                .cloned()
        }),
        headshot: headshot(&line.athlete.headshot, line.athlete.id.as_deref()),
        ..PlayerRow::default()
    };

    for (index, column) in names.iter().enumerate() {
        if column.is_empty() {
            continue;
        }
        let raw = line.stats.get(index);
        let shooting = SHOOTING_COLUMNS
            .iter()
            .find(|(name, _)| *name == column.as_str());
        if let Some((_, label)) = shooting {
            let text = match raw {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => "0-0".to_string(),
                Some(other) => other.to_string(),
            };
            let parsed = parse_makes_attempts(&text);
            row.stats
                .insert(format!("{label}M"), StatValue::Number(parsed.makes));
            row.stats
                .insert(format!("{label}A"), StatValue::Number(parsed.attempts));
            row.stats
                .insert(format!("{label}%"), StatValue::Number(parsed.pct));
        } else if column == "MIN" {
            let text = match raw {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            row.stats.insert(column.clone(), StatValue::Text(text));
        } else {
            let value = raw.map(lenient::number).unwrap_or(0.0).round() as i64;
            row.stats.insert(column.clone(), StatValue::Number(value));
        }
    }

    // Columns the provider never reported stay blank.
    for column in BOXSCORE_COLUMNS {
        match SHOOTING_COLUMNS.iter().find(|(name, _)| *name == column) {
            Some((_, label)) => {
                for suffix in ["M", "A", "%"] {
                    row.stats
                        .entry(format!("{label}{suffix}"))
                        .or_insert_with(|| StatValue::Text(String::new()));
                }
            }
            None => {
                row.stats
                    .entry(column.to_string())
                    .or_insert_with(|| StatValue::Text(String::new()));
            }
        }
    }

    let minutes_dnp = row
        .stat("MIN")
        .and_then(StatValue::as_text)
        .is_some_and(|minutes| minutes.trim().eq_ignore_ascii_case("DNP"));
    row.dnp = line.did_not_play || minutes_dnp;
    row
}

fn headshot(raw: &Value, athlete_id: Option<&str>) -> Option<String> {
    let explicit = match raw {
        Value::String(url) => Some(url.clone()),
        Value::Object(fields) => ["href", "url"]
            .iter()
            .find_map(|field| fields.get(*field).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    };
    explicit
        .filter(|url| !url.is_empty())
        .or_else(|| athlete_id.map(|id| format!("{HEADSHOT_CDN}/{id}.png")))
}

/// Per-period and total scores for both sides.
///
/// The summary's team lines are used when both carry periods; otherwise both
/// sides are rebuilt from `reference` (the scoreboard competition, or the
/// summary header's).
pub fn parse_linescores(summary: &RawSummary, reference: Option<&Competition>) -> SidePair<TeamLine> {
    let mut lines = SidePair::<TeamLine>::default();
    let mut taken = SidePair::<bool>::default();

    for team in &summary.boxscore.teams {
        let mut side = match team.side_flag() {
            Some("home") => Side::Home,
            _ => Side::Away,
        };
        if *taken.get(side) {
            side = side.opposite();
        }
        *taken.get_mut(side) = true;

        let periods: Vec<u32> = team.linescores.iter().map(period_value).collect();
        let declared = [&team.score, &team.points]
            .into_iter()
            .find(|value| !value.is_null())
            .map(lenient::to_u32)
            .unwrap_or(0);
        let total = if declared == 0 {
            periods.iter().sum()
        } else {
            declared
        };
        *lines.get_mut(side) = TeamLine {
            team: team_ref(&team.team),
            periods,
            total,
        };
    }

    if lines.home.periods.is_empty() || lines.away.periods.is_empty() {
        if let Some(competition) = reference {
            for side in [Side::Home, Side::Away] {
                if let Some(competitor) = competition.competitor(side) {
                    *lines.get_mut(side) = team_line(competitor);
                }
            }
        }
    }

    lines
}

fn team_line(competitor: &Competitor) -> TeamLine {
    let periods: Vec<u32> = competitor
        .linescores
        .iter()
        .map(|period| period.value)
        .collect();
    let total = if competitor.score == 0 {
        periods.iter().sum()
    } else {
        competitor.score
    };
    TeamLine {
        team: competitor.team.clone(),
        periods,
        total,
    }
}
