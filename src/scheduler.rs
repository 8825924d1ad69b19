//! Fixed-interval scheduler around the aggregation pipeline.
//!
//! The first tick fires immediately as the bootstrap run; every later tick
//! is a scheduled run. Ticks that land while a run is in flight are
//! dropped, not queued, and a failed run is logged and retried at the next
//! tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::aggregator::{Aggregator, RunOutcome, Trigger};

pub struct Scheduler {
    aggregator: Arc<Aggregator>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(aggregator: Arc<Aggregator>, interval: Duration) -> Self {
        Self {
            aggregator,
            interval,
        }
    }

    /// Run the aggregation loop until the task is cancelled.
    pub async fn run(&self) {
        tracing::info!("Starting aggregation loop, interval {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut trigger = Trigger::Bootstrap;
        loop {
            ticker.tick().await;

            match self.aggregator.run_once(trigger).await {
                Ok(RunOutcome::Completed(counts)) => {
                    // Only a completed bootstrap hands over to scheduled
                    // runs; a failed one is retried at the next tick.
                    trigger = Trigger::Scheduled;
                    tracing::debug!("Run completed: {:?}", counts);
                }
                Ok(RunOutcome::UpToDate) => {
                    trigger = Trigger::Scheduled;
                }
                Ok(outcome) => {
                    tracing::debug!("Run skipped: {:?}", outcome);
                }
                Err(e) => {
                    tracing::error!("Aggregation run failed, retrying next tick: {}", e);
                }
            }
        }
    }
}
