//! Conference standings normalization.

use std::cmp::Ordering;

use super::espn::team_ref;
use crate::application::providers::espn::{RawStandingEntry, RawStandings};
use crate::application::providers::lenient;
use crate::domain::nba::{ConferenceStandings, StandingRow, StandingsResponse};

pub fn transform_standings(raw: &RawStandings) -> StandingsResponse {
    StandingsResponse {
        conferences: raw
            .children
            .iter()
            .map(|conference| {
                let mut teams: Vec<StandingRow> =
                    conference.standings.entries.iter().map(standing_row).collect();
                teams.sort_by(rank);
                ConferenceStandings {
                    name: conference.name.clone(),
                    abbreviation: conference.abbreviation.clone(),
                    teams,
                }
            })
            .collect(),
    }
}

/// Seeded rows first by seed, then the rest by win percentage and wins.
fn rank(a: &StandingRow, b: &StandingRow) -> Ordering {
    (a.seed.is_none(), a.seed)
        .cmp(&(b.seed.is_none(), b.seed))
        .then_with(|| b.win_pct.total_cmp(&a.win_pct))
        .then_with(|| b.wins.cmp(&a.wins))
}

fn standing_row(entry: &RawStandingEntry) -> StandingRow {
    let stat = |name: &str| entry.stats.iter().find(|stat| stat.name == name);
    let count = |name: &str| stat(name).map(|stat| lenient::to_u32(&stat.value)).unwrap_or(0);
    let wins = count("wins");
    let losses = count("losses");
    let played = wins.saturating_add(losses);

    StandingRow {
        team: team_ref(&entry.team),
        wins,
        losses,
        win_pct: stat("winPercent")
            .and_then(|stat| lenient::finite(&stat.value))
            .unwrap_or(if played == 0 {
                0.0
            } else {
                f64::from(wins) / f64::from(played)
            }),
        games_behind: stat("gamesBehind")
            .and_then(|stat| lenient::finite(&stat.value))
            .unwrap_or(0.0),
        streak: stat("streak")
            .map(|stat| stat.display_value.clone())
            .unwrap_or_default(),
        seed: stat("playoffSeed")
            .map(|stat| lenient::to_u32(&stat.value))
            .filter(|seed| *seed > 0),
    }
}
