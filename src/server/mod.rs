//! HTTP exposition: the axum router serving the metrics endpoint and a
//! landing page linking to it.

pub mod metrics;

use crate::collectors::CallStatsCollector;
use axum::{
    extract::State,
    response::Html,
    routing::get,
    Router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<CallStatsCollector>,
    pub telemetry_path: String,
}

pub fn create_router(collector: Arc<CallStatsCollector>, telemetry_path: impl ToString) -> Router {
    let telemetry_path = telemetry_path.to_string();
    let state = AppState {
        collector,
        telemetry_path: telemetry_path.clone(),
    };

    Router::new()
        .route("/", get(landing))
        .route(&telemetry_path, get(metrics::handler))
        .with_state(state)
}

async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>VoipMonitor Calls Exporter</title></head>\n\
         <body>\n\
         <h1>VoipMonitor Calls Exporter</h1>\n\
         <p><a href='{}'>Metrics</a></p>\n\
         </body>\n\
         </html>",
        state.telemetry_path
    ))
}
