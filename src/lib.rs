//! Live NBA scores and box scores joined with their Reddit game threads,
//! served from a tiered cache with request coalescing.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
