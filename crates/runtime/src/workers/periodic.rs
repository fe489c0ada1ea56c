//! Fixed-cadence worker loop.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Runs `task` every `period` until the shutdown signal flips.
///
/// Missed ticks are skipped rather than bursted, so a slow task never causes a
/// backlog of catch-up runs.
pub(crate) struct PeriodicWorker<F> {
    name: &'static str,
    period: Duration,
    shutdown: watch::Receiver<bool>,
    task: F,
}

impl<F, Fut> PeriodicWorker<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    pub(crate) fn new(
        name: &'static str,
        period: Duration,
        shutdown: watch::Receiver<bool>,
        task: F,
    ) -> Self {
        Self {
            name,
            period,
            shutdown,
            task,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            target: "runtime::workers",
            worker = self.name,
            period_ms = self.period.as_millis() as u64,
            "worker started"
        );

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    (self.task)().await;
                }
            }
        }

        debug!(target: "runtime::workers", worker = self.name, "worker stopped");
    }
}
