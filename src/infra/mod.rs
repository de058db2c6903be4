//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod espn;
pub mod http;
pub mod nba_stats;
pub mod reddit;
pub mod remote;
pub mod store;
pub mod telemetry;
pub mod upstream;
