use super::SweepCoordinator;
use std::{sync::Arc, time::Duration};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Fires one sweep at startup, then one per `interval`.
///
/// Each sweep runs in its own task, so a sweep that outlasts the interval collides with the next
/// tick; the coordinator drops the late one.
#[derive(Clone)]
pub struct ProbeScheduler {
    coordinator: Arc<SweepCoordinator>,
    interval: Duration,
}

impl ProbeScheduler {
    pub fn new(coordinator: Arc<SweepCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    pub async fn run(self) {
        info!(
            "Running initial health check of {} endpoint(s) on startup...",
            self.coordinator.endpoints().len()
        );
        self.spawn_sweep();

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            info!("Running scheduled health check...");
            self.spawn_sweep();
        }
    }

    fn spawn_sweep(&self) {
        let coordinator = self.coordinator.clone();
        let sweep = tokio::spawn(async move { coordinator.run_sweep().await });
        tokio::spawn(async move {
            if let Err(e) = sweep.await {
                error!("Health check task failed: {}", e);
            }
        });
    }
}
