//! Franchise alias table, pair keys and thread title classification.

use super::reddit::ThreadKind;

pub struct Franchise {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

#[rustfmt::skip]
pub const FRANCHISES: &[Franchise] = &[
    Franchise { canonical: "Lakers", aliases: &["Lakers", "Los Angeles Lakers", "LA Lakers", "LAL"] },
    Franchise { canonical: "Celtics", aliases: &["Celtics", "Boston Celtics", "BOS"] },
    Franchise { canonical: "Warriors", aliases: &["Warriors", "Golden State Warriors", "GSW", "Dubs"] },
    Franchise { canonical: "Nets", aliases: &["Nets", "Brooklyn Nets", "BKN"] },
    Franchise { canonical: "Knicks", aliases: &["Knicks", "New York Knicks", "NYK", "NY Knicks"] },
    Franchise { canonical: "76ers", aliases: &["76ers", "Sixers", "Philadelphia 76ers", "PHI", "PHL 76ers"] },
    Franchise { canonical: "Raptors", aliases: &["Raptors", "Toronto Raptors", "TOR"] },
    Franchise { canonical: "Bulls", aliases: &["Bulls", "Chicago Bulls", "CHI"] },
    Franchise { canonical: "Cavaliers", aliases: &["Cavaliers", "Cavs", "Cleveland Cavaliers", "CLE"] },
    Franchise { canonical: "Pistons", aliases: &["Pistons", "Detroit Pistons", "DET"] },
    Franchise { canonical: "Pacers", aliases: &["Pacers", "Indiana Pacers", "IND"] },
    Franchise { canonical: "Bucks", aliases: &["Bucks", "Milwaukee Bucks", "MIL"] },
    Franchise { canonical: "Heat", aliases: &["Heat", "Miami Heat", "MIA"] },
    Franchise { canonical: "Magic", aliases: &["Magic", "Orlando Magic", "ORL"] },
    Franchise { canonical: "Hawks", aliases: &["Hawks", "Atlanta Hawks", "ATL"] },
    Franchise { canonical: "Hornets", aliases: &["Hornets", "Charlotte Hornets", "CHA"] },
    Franchise { canonical: "Wizards", aliases: &["Wizards", "Washington Wizards", "WAS"] },
    Franchise { canonical: "Mavericks", aliases: &["Mavericks", "Mavs", "Dallas Mavericks", "DAL"] },
    Franchise { canonical: "Rockets", aliases: &["Rockets", "Houston Rockets", "HOU"] },
    Franchise { canonical: "Grizzlies", aliases: &["Grizzlies", "Memphis Grizzlies", "MEM"] },
    Franchise { canonical: "Pelicans", aliases: &["Pelicans", "New Orleans Pelicans", "NOP"] },
    Franchise { canonical: "Spurs", aliases: &["Spurs", "San Antonio Spurs", "SAS"] },
    Franchise { canonical: "Nuggets", aliases: &["Nuggets", "Denver Nuggets", "DEN"] },
    Franchise { canonical: "Timberwolves", aliases: &["Timberwolves", "Wolves", "Minnesota Timberwolves", "MIN"] },
    Franchise { canonical: "Trail Blazers", aliases: &["Trail Blazers", "Blazers", "Portland Trail Blazers", "POR"] },
    Franchise { canonical: "Thunder", aliases: &["Thunder", "Oklahoma City Thunder", "OKC"] },
    Franchise { canonical: "Jazz", aliases: &["Jazz", "Utah Jazz", "UTA"] },
    Franchise { canonical: "Clippers", aliases: &["Clippers", "Los Angeles Clippers", "LA Clippers", "LAC"] },
    Franchise { canonical: "Suns", aliases: &["Suns", "Phoenix Suns", "PHX"] },
    Franchise { canonical: "Kings", aliases: &["Kings", "Sacramento Kings", "SAC"] },
];

/// Mascot needles scanned in order; multi-word names come first.
const MASCOTS: &[(&str, &str)] = &[
    ("trail blazers", "Trail Blazers"),
    ("timberwolves", "Timberwolves"),
    ("knicks", "Knicks"),
    ("76ers", "76ers"),
    ("lakers", "Lakers"),
    ("celtics", "Celtics"),
    ("warriors", "Warriors"),
    ("nets", "Nets"),
    ("raptors", "Raptors"),
    ("bulls", "Bulls"),
    ("cavaliers", "Cavaliers"),
    ("pistons", "Pistons"),
    ("pacers", "Pacers"),
    ("bucks", "Bucks"),
    ("heat", "Heat"),
    ("magic", "Magic"),
    ("hawks", "Hawks"),
    ("hornets", "Hornets"),
    ("wizards", "Wizards"),
    ("mavericks", "Mavericks"),
    ("rockets", "Rockets"),
    ("grizzlies", "Grizzlies"),
    ("pelicans", "Pelicans"),
    ("spurs", "Spurs"),
    ("nuggets", "Nuggets"),
    ("suns", "Suns"),
    ("kings", "Kings"),
    ("clippers", "Clippers"),
    ("thunder", "Thunder"),
    ("jazz", "Jazz"),
    ("blazers", "Trail Blazers"),
];

const POST_GAME_MARKERS: &[&str] = &["post game thread", "post-game thread", "postgame thread"];
const GAME_MARKER: &str = "game thread";

/// Whether `needle` occurs in `haystack` delimited by non-alphanumeric characters.
/// Both sides are expected to be lowercase already.
pub(crate) fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn find_franchise(name: &str) -> Option<&'static Franchise> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let exact = FRANCHISES.iter().find(|franchise| {
        franchise
            .aliases
            .iter()
            .any(|alias| alias.to_lowercase() == needle)
    });
    exact.or_else(|| {
        FRANCHISES.iter().find(|franchise| {
            franchise.aliases.iter().any(|alias| {
                let alias = alias.to_lowercase();
                contains_word(&needle, &alias) || contains_word(&alias, &needle)
            })
        })
    })
}

/// Inputs followed by every alias of their franchise, de-duplicated in order.
pub fn expand_team_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    let mut push = |value: &str| {
        if !value.is_empty() && !expanded.iter().any(|existing| existing == value) {
            expanded.push(value.to_string());
        }
    };

    for name in names {
        let name = name.as_ref();
        push(name);
        if let Some(franchise) = find_franchise(name) {
            for alias in franchise.aliases {
                push(alias);
            }
        }
    }

    expanded
}

pub fn normalize_team_name(name: &str) -> String {
    find_franchise(name)
        .map(|franchise| franchise.canonical.to_string())
        .unwrap_or_else(|| name.trim().to_string())
}

/// Canonical mascot used to build pair keys.
pub fn mascot_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    MASCOTS
        .iter()
        .find(|(needle, _)| contains_word(&lowered, needle))
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| normalize_team_name(name))
}

/// Order-independent key for a matchup: `pair_key(a, b) == pair_key(b, a)`.
pub fn pair_key(first: &str, second: &str) -> String {
    let mut names = [mascot_name(first), mascot_name(second)];
    names.sort();
    names.join("|")
}

pub fn is_post_game_title(title: &str) -> bool {
    let lowered = title.to_lowercase();
    POST_GAME_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Post-game markers win over the plain game-thread marker.
pub fn classify_title(title: &str) -> Option<ThreadKind> {
    if is_post_game_title(title) {
        return Some(ThreadKind::Post);
    }
    if title.to_lowercase().contains(GAME_MARKER) {
        return Some(ThreadKind::Live);
    }
    None
}

pub fn title_matches_kind(title: &str, kind: ThreadKind) -> bool {
    classify_title(title) == Some(kind)
}

/// True when the title names any alias of any candidate team.
pub fn title_mentions_team<S: AsRef<str>>(title: &str, candidates: &[S]) -> bool {
    let lowered = title.to_lowercase();
    expand_team_names(candidates)
        .iter()
        .any(|alias| contains_word(&lowered, &alias.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_symmetric_across_aliases() {
        assert_eq!(pair_key("Lakers", "Celtics"), pair_key("Celtics", "Lakers"));
        assert_eq!(pair_key("LA Lakers", "Boston Celtics"), "Celtics|Lakers");
        assert_eq!(
            pair_key("Portland Trail Blazers", "Utah Jazz"),
            pair_key("Jazz", "Blazers")
        );
    }

    #[test]
    fn mascot_matching_respects_word_boundaries() {
        assert_eq!(mascot_name("Charlotte Hornets"), "Hornets");
        assert_eq!(mascot_name("Brooklyn Nets"), "Nets");
        assert_eq!(pair_key("Hornets", "Nets"), "Hornets|Nets");
    }

    #[test]
    fn unknown_names_pass_through_trimmed() {
        assert_eq!(mascot_name("  Team LeBron "), "Team LeBron");
        assert_eq!(normalize_team_name("World Team"), "World Team");
    }

    #[test]
    fn normalize_resolves_abbreviations_and_nicknames() {
        assert_eq!(normalize_team_name("GSW"), "Warriors");
        assert_eq!(normalize_team_name("dubs"), "Warriors");
        assert_eq!(normalize_team_name("Philadelphia 76ers"), "76ers");
        assert_eq!(normalize_team_name("Houston"), "Rockets");
    }

    #[test]
    fn expansion_keeps_input_first_and_deduplicates() {
        let expanded = expand_team_names(&["Golden State Warriors", "Warriors"]);
        assert_eq!(expanded[0], "Golden State Warriors");
        assert!(expanded.contains(&"Dubs".to_string()));
        assert!(expanded.contains(&"GSW".to_string()));
        assert_eq!(
            expanded.iter().filter(|name| *name == "Warriors").count(),
            1
        );
    }

    #[test]
    fn title_classification_handles_post_game_variants() {
        assert_eq!(
            classify_title("Post Game Thread: Lakers at Celtics"),
            Some(ThreadKind::Post)
        );
        assert_eq!(
            classify_title("Post-Game Thread: Lakers at Celtics"),
            Some(ThreadKind::Post)
        );
        assert_eq!(
            classify_title("Postgame Thread: Lakers at Celtics"),
            Some(ThreadKind::Post)
        );
        assert_eq!(
            classify_title("GAME THREAD: Lakers at Celtics"),
            Some(ThreadKind::Live)
        );
        assert_eq!(classify_title("Lakers trade rumours"), None);
    }

    #[test]
    fn title_team_mentions_use_aliases() {
        assert!(title_mentions_team(
            "Game Thread: GSW at LAL",
            &["Golden State Warriors"]
        ));
        assert!(!title_mentions_team(
            "Game Thread: Nuggets at Suns",
            &["Golden State Warriors"]
        ));
        assert!(!title_mentions_team("Game Thread: Golden at Suns", &["DEN"]));
    }
}
