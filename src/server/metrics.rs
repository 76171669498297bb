//! Metrics endpoint handler.
//!
//! Every scrape triggers one collection cycle and renders its outcome into a
//! fresh registry, so the response is always a consistent snapshot of a
//! single cycle. There are no long-lived series to go stale and nothing for
//! concurrent scrapes to race on.

use crate::{
    collectors::ScrapeOutcome,
    server::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
};
use prometheus::{
    GaugeVec,
    IntGauge,
    Opts,
    Registry,
    TextEncoder,
};

const NAMESPACE: &str = "voipmonitor";

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("failed to encode metrics: {0}")]
    Encoding(#[from] prometheus::Error),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
    }
}

/// Handler for the telemetry path.
pub async fn handler(State(state): State<AppState>) -> Result<String, MetricsError> {
    let outcome = state.collector.collect().await;
    render(&outcome).inspect_err(|err| error!(error = %err, "could not render scrape outcome"))
}

/// Render one scrape outcome in the Prometheus text format.
pub fn render(outcome: &ScrapeOutcome) -> Result<String, MetricsError> {
    let registry = Registry::new();

    let up = IntGauge::with_opts(
        Opts::new("up", "Was the last VoipMonitor query successful.").namespace(NAMESPACE),
    )?;
    registry.register(Box::new(up.clone()))?;
    up.set(outcome.up as i64);

    let call_stats = GaugeVec::new(
        Opts::new(
            "call_stats_total",
            "How many calls have occurred (per last SIP response code).",
        )
        .namespace(NAMESPACE),
        &["last_sip_response", "sip_response_code", "component"],
    )?;
    registry.register(Box::new(call_stats.clone()))?;

    for observation in &outcome.observations {
        let code = observation.sip_response_code.to_string();
        call_stats
            .with_label_values(&[
                observation.last_sip_response.as_str(),
                code.as_str(),
                observation.component.as_str(),
            ])
            .set(observation.count);
    }

    let encoder = TextEncoder::new();
    Ok(encoder.encode_to_string(&registry.gather())?)
}
