//! Collector adapter: drives one authenticate-then-fan-out cycle per scrape.
//!
//! Scrapes arriving while a cycle is in flight do not start a second cycle;
//! they await and share the in-flight outcome. Sequential scrapes always run
//! fresh, independent cycles (each with its own login).

use crate::{
    collectors::cycle::run_cycle,
    config::Config,
    roster::Roster,
    upstream::{
        FetchStats,
        Observation,
        QueryWindow,
        Session,
        StatsFetcher,
    },
};
use futures::future::{
    BoxFuture,
    FutureExt as _,
    Shared,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;

/// What one scrape reports: the liveness flag plus the merged observations.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    /// True iff the cycle completed authentication.
    pub up: bool,
    pub observations: Vec<Observation>,
}

impl ScrapeOutcome {
    fn down() -> Self {
        Self {
            up: false,
            observations: Vec::new(),
        }
    }
}

type SharedCycle = Shared<BoxFuture<'static, ScrapeOutcome>>;

/// Runs the full collection cycle on demand. No state survives a scrape
/// besides the shared HTTP client; every cycle authenticates from scratch.
pub struct CallStatsCollector {
    inner: Arc<Inner>,
    /// Single-flight slot: the currently running cycle, if any.
    inflight: Mutex<Option<SharedCycle>>,
}

struct Inner {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    interval: Duration,
    fetcher: Arc<dyn FetchStats>,
    roster: Roster,
}

impl CallStatsCollector {
    pub fn new(config: &Config, client: reqwest::Client, roster: Roster) -> Self {
        let fetcher = Arc::new(StatsFetcher::new(client.clone(), config));
        Self {
            inner: Arc::new(Inner {
                client,
                endpoint: config.endpoint.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
                interval: config.interval,
                fetcher,
                roster,
            }),
            inflight: Mutex::new(None),
        }
    }

    /// Run one collection cycle, or join the one already in flight.
    pub async fn collect(&self) -> ScrapeOutcome {
        let cycle = {
            let mut inflight = self.inflight.lock().await;
            match inflight.clone() {
                Some(cycle) => cycle,
                None => {
                    let inner = Arc::clone(&self.inner);
                    let cycle = async move { inner.scrape().await }.boxed().shared();
                    *inflight = Some(cycle.clone());
                    cycle
                }
            }
        };

        let outcome = cycle.clone().await;

        // Clear the slot so the next scrape runs a fresh cycle. Every waiter
        // attempts this; only the first one actually finds the slot occupied.
        let mut inflight = self.inflight.lock().await;
        if inflight.as_ref().is_some_and(|current| cycle.ptr_eq(current)) {
            *inflight = None;
        }

        outcome
    }
}

impl Inner {
    async fn scrape(&self) -> ScrapeOutcome {
        let session =
            match Session::authenticate(&self.client, &self.endpoint, &self.username, &self.password).await {
                Ok(session) => session,
                Err(err) => {
                    error!(error = %err, "authentication failed, skipping fan-out");
                    return ScrapeOutcome::down();
                }
            };

        let window = QueryWindow::trailing(self.interval);
        let cycle = run_cycle(Arc::clone(&self.fetcher), &self.roster, &session, window).await;

        if !cycle.is_complete() {
            warn!(
                failed = cycle.failures.len(),
                total = self.roster.len(),
                "cycle finished with partial results"
            );
        }
        info!(observations = cycle.observations.len(), "endpoint scraped");

        ScrapeOutcome {
            up: true,
            observations: cycle.observations,
        }
    }
}
