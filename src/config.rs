//! # Configuration Module
//!
//! Holds the validated, immutable settings for the exporter. The CLI/env
//! surface lives in `main.rs`; everything that reaches the collectors goes
//! through [`Config::new`] exactly once at startup.
//!
//! ## Leniency
//!
//! The polling interval is parsed leniently: an unset, empty, non-numeric or
//! zero `VOIPMONITOR_INTERVAL` falls back to the 5 minute default instead of
//! failing startup. The endpoint URL on the other hand is validated strictly
//! since nothing works without it.

use crate::upstream::NEED_COLUMNS_DEFAULT;
use eyre::{
    bail,
    Context as _,
    Result,
};
use std::{
    net::SocketAddr,
    time::Duration,
};

/// Window length used when `VOIPMONITOR_INTERVAL` is unset or invalid.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the VoipMonitor GUI server, without trailing slash.
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Trailing window queried on every cycle.
    pub interval: Duration,
    /// Per-component deadline for one stats query.
    pub fetch_timeout: Duration,
    /// Raw `needColumns` form value sent upstream.
    pub need_columns: String,
    pub listen_address: SocketAddr,
    pub telemetry_path: String,
}

impl Config {
    pub fn new(
        endpoint: String,
        username: String,
        password: String,
        interval: Option<String>,
        fetch_timeout_secs: u64,
        need_columns: Option<String>,
        listen_address: SocketAddr,
        telemetry_path: String,
    ) -> Result<Self> {
        let endpoint = Self::normalize_endpoint(&endpoint)?;

        if !telemetry_path.starts_with('/') {
            bail!("telemetry path must start with '/': {telemetry_path}");
        }

        Ok(Self {
            endpoint,
            username,
            password,
            interval: Duration::from_secs(interval_minutes(interval.as_deref()) * 60),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            need_columns: need_columns.unwrap_or_else(|| NEED_COLUMNS_DEFAULT.to_string()),
            listen_address,
            telemetry_path,
        })
    }

    /// Validate the endpoint and strip any trailing slash so that paths can
    /// be appended with a plain `format!`.
    fn normalize_endpoint(raw: &str) -> Result<String> {
        let url = url::Url::parse(raw).wrap_err_with(|| format!("invalid endpoint URL: {raw}"))?;

        if !matches!(url.scheme(), "http" | "https") {
            bail!("endpoint must use http or https: {raw}");
        }

        Ok(raw.trim_end_matches('/').to_string())
    }
}

/// Lenient parse of the polling interval. Unset, empty, non-numeric and zero
/// values all fall back to [`DEFAULT_INTERVAL_MINUTES`].
pub fn interval_minutes(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|minutes| *minutes > 0)
        .unwrap_or(DEFAULT_INTERVAL_MINUTES)
}
