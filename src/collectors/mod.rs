//! # Collectors Module
//!
//! The collection cycle that runs behind every scrape.
//!
//! ## Architecture
//!
//! - **`cycle`**: the fan-out coordinator — one concurrent fetch per roster
//!   component, joined by an explicit barrier, merged into a [`CycleResult`]
//! - **`call_stats`**: the collector adapter — authenticates, runs the cycle
//!   and reports the scrape outcome; overlapping scrapes share one in-flight
//!   cycle

pub mod call_stats;
pub mod cycle;

pub use call_stats::{
    CallStatsCollector,
    ScrapeOutcome,
};
pub use cycle::{
    run_cycle,
    CycleResult,
};
