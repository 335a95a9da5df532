use dashmap::DashSet;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::executor::ProbeExecutor;
use super::transition::{Evaluation, TransitionHandler};
use super::types::Check;
use super::validation::validate_check;
use crate::database::{CHECKS, Database};

/// Marks a check as being evaluated until dropped
struct InFlightGuard {
    in_flight: Arc<DashSet<String>>,
    check_id: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<DashSet<String>>, check_id: &str) -> Option<Self> {
        if !in_flight.insert(check_id.to_string()) {
            return None;
        }
        Some(Self { in_flight: in_flight.clone(), check_id: check_id.to_string() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.check_id);
    }
}

/// What one check cycle did
#[derive(Debug, Default)]
pub struct Cycle {
    /// Evaluations started this cycle, still running in the background
    pub dispatched: Vec<JoinHandle<Evaluation>>,
    /// Records that failed validation
    pub invalid: usize,
    /// Records that could not be read
    pub unreadable: usize,
    /// Checks whose previous evaluation had not finished yet
    pub skipped_in_flight: usize,
}

impl Cycle {
    /// Wait for every evaluation dispatched in this cycle
    pub async fn join(self) -> Vec<Evaluation> {
        join_all(self.dispatched)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(evaluation) => Some(evaluation),
                Err(e) => {
                    error!("Check evaluation task failed: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Check cycle scheduler - lists, validates and dispatches every check on a fixed cadence
pub struct CheckScheduler {
    database: Arc<dyn Database>,
    executor: Arc<ProbeExecutor>,
    handler: Arc<TransitionHandler>,
    in_flight: Arc<DashSet<String>>,
}

impl CheckScheduler {
    /// Create a new check scheduler
    pub fn new(
        database: Arc<dyn Database>,
        executor: Arc<ProbeExecutor>,
        handler: Arc<TransitionHandler>,
    ) -> Self {
        Self { database, executor, handler, in_flight: Arc::new(DashSet::new()) }
    }

    /// Run one cycle over every stored check
    ///
    /// Returns as soon as every valid check has been dispatched; the
    /// evaluations themselves keep running.
    pub async fn run_cycle(&self) -> Cycle {
        let mut cycle = Cycle::default();

        let keys = match self.database.list(CHECKS).await {
            Ok(keys) => keys,
            Err(e) => {
                error!("Could not list checks: {}", e);
                return cycle;
            }
        };

        if keys.is_empty() {
            debug!("Could not find any checks to process");
            return cycle;
        }

        for key in &keys {
            let record = match self.database.read(CHECKS, key).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(check = %key, "Error reading check data: {}", e);
                    cycle.unreadable += 1;
                    continue;
                }
            };

            let check = match validate_check(&record) {
                Ok(check) => check,
                Err(errors) => {
                    for error in &errors {
                        warn!(
                            check = %key,
                            field = error.field(),
                            "Check is not properly formatted: {}",
                            error
                        );
                    }
                    cycle.invalid += 1;
                    continue;
                }
            };

            match self.dispatch(check) {
                Some(handle) => cycle.dispatched.push(handle),
                None => cycle.skipped_in_flight += 1,
            }
        }

        info!(
            checks = keys.len(),
            dispatched = cycle.dispatched.len(),
            invalid = cycle.invalid,
            unreadable = cycle.unreadable,
            skipped = cycle.skipped_in_flight,
            "Check cycle dispatched"
        );
        cycle
    }

    /// Start probing `check` in the background
    ///
    /// Returns `None` without doing anything if the check's previous
    /// evaluation is still running.
    pub fn dispatch(&self, check: Check) -> Option<JoinHandle<Evaluation>> {
        let Some(guard) = InFlightGuard::acquire(&self.in_flight, &check.id) else {
            info!(check_id = %check.id, "Skipped: prior evaluation still running");
            return None;
        };

        let executor = self.executor.clone();
        let handler = self.handler.clone();

        Some(tokio::spawn(async move {
            let _guard = guard;
            let outcome = executor.probe(&check).await;
            handler.process(&check, outcome).await
        }))
    }

    /// Number of evaluations currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Start the periodic check loop; the first cycle runs immediately
    pub fn start_periodic_checks(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                // Evaluations are not awaited; the next tick fires on schedule
                let _ = self.run_cycle().await;
            }
        })
    }
}
