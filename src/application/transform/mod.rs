//! Pure reshaping of raw provider payloads into domain shapes.

pub mod espn;
pub mod leaders;
pub mod reddit;
pub mod standings;

pub use espn::{
    MakesAttempts, minutes_to_seconds, normalize_players, parse_linescores, parse_makes_attempts,
    transform_boxscore, transform_scoreboard,
};
pub use leaders::stat_table;
pub use reddit::{
    Recency, TeamFilter, build_search_query, find_index_post, merge_listings, transform_comments,
    transform_index, transform_search,
};
pub use standings::transform_standings;
