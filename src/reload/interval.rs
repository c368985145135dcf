//! Periodic reload trigger.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::reload::{ReloadHandle, ReloadReason, ReloadTrigger};

/// Requests a reload every `period`.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTrigger {
    period: Duration,
}

impl IntervalTrigger {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl ReloadTrigger for IntervalTrigger {
    fn name(&self) -> &'static str {
        "interval"
    }

    fn spawn(self, handle: ReloadHandle, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(period = ?self.period, "Interval reload trigger started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !handle.trigger(ReloadReason::Interval) {
                            break;
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}
