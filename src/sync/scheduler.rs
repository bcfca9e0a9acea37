//! Auto-sync scheduler.
//!
//! Runs a job on a fixed period in a background task. The first run
//! happens one period after `start`. A failing run is logged and the
//! schedule continues.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct Running {
    period: Duration,
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic background runner with idempotent start and stop.
#[derive(Default)]
pub struct AutoSync {
    running: Mutex<Option<Running>>,
}

impl AutoSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `period`, replacing any schedule already running.
    pub async fn start<F, Fut, T, E>(&self, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display,
    {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            shutdown(previous).await;
        }

        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!("Scheduled sync starting");
                        if let Err(e) = job().await {
                            error!(error = %e, "Scheduled sync failed");
                        }
                    }
                }
            }
            debug!("Auto-sync loop stopped");
        });

        info!(minutes = period.as_secs() / 60, "Auto-sync started");
        *running = Some(Running {
            period,
            cancellation_token,
            handle,
        });
    }

    /// Stop the schedule and wait for a run in progress to finish.
    ///
    /// Returns `false` when nothing was running.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.running.lock().await.take() else {
            return false;
        };
        shutdown(running).await;
        info!("Auto-sync stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Period of the current schedule.
    pub async fn period(&self) -> Option<Duration> {
        self.running.lock().await.as_ref().map(|r| r.period)
    }
}

async fn shutdown(running: Running) {
    running.cancellation_token.cancel();
    if let Err(e) = running.handle.await {
        warn!(error = %e, "Auto-sync task ended abnormally");
    }
}
