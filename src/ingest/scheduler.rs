// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::engine::{CycleOutcome, Engine};

fn ticker(period: Duration) -> Interval {
    let mut t = interval_at(Instant::now() + period, period);
    // A slow cycle must not cause a burst of catch-up ticks.
    t.set_missed_tick_behavior(MissedTickBehavior::Skip);
    t
}

/// Recurring cycle trigger. The first tick lands one period after spawn; the
/// caller runs the startup cycle itself. A new poll period restarts the
/// ticker without restarting the task. Cycle failures never end the loop.
pub fn spawn_poll_loop(engine: Arc<Engine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut period_rx = engine.poll_period();
        let mut period = *period_rx.borrow_and_update();
        let mut t = ticker(period);
        tracing::info!(target: "ingest", secs = period.as_secs(), "poll loop started");

        loop {
            tokio::select! {
                _ = t.tick() => {
                    if let CycleOutcome::Failed(e) = engine.run_cycle().await {
                        tracing::debug!(target: "ingest", error = %e, "tick cycle failed; waiting for next tick");
                    }
                }
                changed = period_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *period_rx.borrow_and_update();
                    if next != period {
                        period = next;
                        t = ticker(period);
                        tracing::info!(target: "ingest", secs = period.as_secs(), "poll period applied");
                    }
                }
            }
        }
    })
}
