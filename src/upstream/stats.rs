//! The CDR stats query: one multipart POST per component per cycle, parsed
//! into per-SIP-response-code observations.

use crate::{
    roster::Component,
    upstream::{
        Session,
        SQL_ENDPOINT_PATH,
    },
    Config,
};
use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use reqwest::{
    header,
    multipart::Form,
};
use serde::Deserialize;
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};

/// Verbatim what the stock CDR group panel sends. The escaping looks wrong
/// (it probably does not select all intended columns) but the upstream
/// contract owner has not confirmed the correct literal, so it ships as-is
/// and can be overridden with `VOIPMONITOR_NEED_COLUMNS`.
pub const NEED_COLUMNS_DEFAULT: &str =
    "%5B%22lastSIPresponse%22%2C%22cnt_all%22%2C%22cnt_ok%22%lastSIPresponseNum%22%sensor_id";

/// Fixed panel identifier the upstream expects on stats queries.
const TIMESTAMP_ID: &str = "1642680756758_CDR-group-panel";

/// One normalized data point parsed from an upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub component: String,
    pub last_sip_response: String,
    pub sip_response_code: i64,
    pub count: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("stats request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("stats query rejected with HTTP {0}")]
    UpstreamStatus(reqwest::StatusCode),
    #[error("stats response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Half-open trailing interval `[now - interval, now)`. The upstream query
/// carries only the lower bound, always UTC.
#[derive(Debug, Clone, Copy)]
pub struct QueryWindow {
    from: DateTime<Utc>,
}

impl QueryWindow {
    /// Window ending now. Computed once per cycle and shared by all fetches.
    pub fn trailing(interval: Duration) -> Self {
        Self::ending_at(Utc::now(), interval)
    }

    pub fn ending_at(now: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            from: now - chrono::Duration::seconds(interval.as_secs() as i64),
        }
    }

    /// The `fdatefrom` form value, RFC3339 with `Z` suffix.
    pub fn fdatefrom(&self) -> String {
        self.from.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// The seam between the fan-out coordinator and the network. Implemented by
/// [`StatsFetcher`] for the real upstream and by mocks in tests.
pub trait FetchStats: Send + Sync {
    fn fetch<'a>(
        &'a self,
        session: &'a Session,
        component: &'a Component,
        window: QueryWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Observation>, FetchError>> + Send + 'a>>;
}

/// Issues authenticated stats queries against the VoipMonitor GUI server.
pub struct StatsFetcher {
    client: reqwest::Client,
    query_url: String,
    need_columns: String,
    deadline: Duration,
}

/// Upstream body shape. The panel omits fields for empty result sets, so
/// everything defaults to its zero value.
#[derive(Debug, Deserialize)]
struct CallStats {
    #[serde(default)]
    total: i64,
    #[serde(default)]
    results: Vec<SipResponseRow>,
}

#[derive(Debug, Deserialize)]
struct SipResponseRow {
    #[serde(rename = "cnt_all", default)]
    count: f64,
    #[serde(rename = "lastSIPresponse", default)]
    last_sip_response: String,
    #[serde(rename = "lastSIPresponseNum", default)]
    last_sip_response_num: i64,
}

impl StatsFetcher {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            query_url: format!("{}{SQL_ENDPOINT_PATH}", config.endpoint),
            need_columns: config.need_columns.clone(),
            deadline: config.fetch_timeout,
        }
    }

    fn form(&self, sensor_id: &str, window: QueryWindow) -> Form {
        Form::new()
            .text("task", "LISTING")
            .text("module", "CDR_stats")
            .text("fdatefrom", window.fdatefrom())
            .text("fsensor_id", sensor_id.to_string())
            .text("group_by", "4")
            .text("needColumns", self.need_columns.clone())
            .text("needPercentile", "1")
            .text("page", "1")
            .text("start", "0")
            .text("limit", "-1")
            .text("timestampId", TIMESTAMP_ID)
            .text("clientTimezone", "UTC")
            .text("clientOsTimezone", "UTC")
            .text("timeout", "3600")
            .text("check_active_request", "true")
    }

    async fn query(
        &self,
        session: &Session,
        component: &Component,
        window: QueryWindow,
    ) -> Result<Vec<Observation>, FetchError> {
        let response = self
            .client
            .post(&self.query_url)
            .header(header::COOKIE, session.cookie_header())
            .multipart(self.form(&component.sensor_id, window))
            // Bounded deadline so one stalled sensor cannot hang the cycle
            // barrier. A timeout surfaces as a network error for this
            // component only.
            .timeout(self.deadline)
            .send()
            .await
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus(status));
        }

        let stats: CallStats = response.json().await.map_err(FetchError::Decode)?;
        debug!(
            component = %component.name,
            total = stats.total,
            rows = stats.results.len(),
            "call stats received"
        );

        Ok(observations_for(component, stats))
    }
}

impl FetchStats for StatsFetcher {
    fn fetch<'a>(
        &'a self,
        session: &'a Session,
        component: &'a Component,
        window: QueryWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Observation>, FetchError>> + Send + 'a>> {
        Box::pin(self.query(session, component, window))
    }
}

fn observations_for(component: &Component, stats: CallStats) -> Vec<Observation> {
    stats
        .results
        .into_iter()
        .map(|row| Observation {
            component: component.name.clone(),
            last_sip_response: row.last_sip_response,
            sip_response_code: row.last_sip_response_num,
            count: row.count,
        })
        .collect()
}
