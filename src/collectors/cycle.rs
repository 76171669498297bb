//! Fan-out coordinator: one concurrent fetch per roster component, joined by
//! an explicit barrier before anything is merged.
//!
//! A component failure is recorded and logged but never aborts the cycle;
//! partial results beat no results when a single upstream shard is flaky.

use crate::{
    roster::Roster,
    upstream::{
        FetchError,
        FetchStats,
        Observation,
        QueryWindow,
        Session,
    },
};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::JoinSet,
};

/// Everything one cycle produced. Assembled once after the barrier clears
/// and never mutated afterwards.
#[derive(Debug, Default)]
pub struct CycleResult {
    pub observations: Vec<Observation>,
    /// Component-scoped failures, by component name.
    pub failures: Vec<(String, FetchError)>,
}

impl CycleResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run one fan-out cycle: spawn one fetch task per roster component, wait
/// for all of them to settle, then drain the result sink.
///
/// All fetches share the same session and window but own everything else
/// they touch; the mpsc channel is the only synchronized state.
pub async fn run_cycle(
    fetcher: Arc<dyn FetchStats>,
    roster: &Roster,
    session: &Session,
    window: QueryWindow,
) -> CycleResult {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut tasks = JoinSet::new();

    for component in roster.components() {
        let fetcher = Arc::clone(&fetcher);
        let session = session.clone();
        let component = component.clone();
        let tx = tx.clone();

        tasks.spawn(async move {
            let result = fetcher.fetch(&session, &component, window).await;
            // The receiver outlives the barrier below, so a send can only
            // fail if the cycle itself was dropped.
            let _ = tx.send((component.name, result));
        });
    }
    drop(tx);

    // Barrier: nothing is read from the sink until every launched fetch has
    // either produced observations or failed.
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            error!(?err, "fetch task panicked");
        }
    }

    let mut cycle = CycleResult::default();
    while let Ok((component, result)) = rx.try_recv() {
        match result {
            Ok(observations) => cycle.observations.extend(observations),
            Err(err) => {
                warn!(component = %component, error = %err, "dropping component from this cycle");
                cycle.failures.push((component, err));
            }
        }
    }

    cycle
}
