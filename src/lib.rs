//! # VoipMonitor Calls Exporter
//!
//! A Prometheus exporter that polls a VoipMonitor GUI server for call-detail
//! (CDR) statistics and exposes them as metrics.
//!
//! ## Architecture
//!
//! On every scrape the exporter runs one full collection cycle:
//!
//! 1. **`upstream::session`**: obtains a fresh session token via the bypass
//!    login endpoint (no token is ever reused across cycles).
//! 2. **`collectors::cycle`**: fans out one stats query per roster component,
//!    all sharing the session and time window, and joins them before merging.
//! 3. **`collectors::call_stats`**: drives the cycle and reports the outcome
//!    (a liveness flag plus the merged observations).
//! 4. **`server`**: renders the outcome into a fresh Prometheus registry and
//!    serves it over HTTP.
//!
//! A failing component is dropped from the cycle it failed in; only a failed
//! login takes the whole scrape down (reported as `voipmonitor_up 0`).

#[macro_use]
extern crate tracing;

pub mod collectors;
pub mod config;
pub mod roster;
pub mod server;
pub mod upstream;

pub use config::Config;
pub use roster::{
    Component,
    Roster,
};
