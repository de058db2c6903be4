//! Service façades composing providers, transformers and the tiered cache.

pub mod error;
pub mod leaders;
pub mod nba;
pub mod providers;
pub mod reddit;
pub mod sync;
pub mod threads;
pub mod transform;

pub use leaders::LeadersService;
pub use nba::NbaService;
pub use reddit::RedditService;
pub use sync::{SyncConfig, ThreadSync};
pub use threads::{Matchup, ThreadResolver};
