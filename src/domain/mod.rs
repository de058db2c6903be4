//! Domain layer types and invariants.

pub mod error;
pub mod leaders;
pub mod nba;
pub mod reddit;
pub mod teams;
