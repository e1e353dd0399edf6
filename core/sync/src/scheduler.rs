//! Periodic and on-demand sync scheduling.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use gembasync_common::{Error, Result};

use crate::engine::SyncReport;

/// Messages accepted by the scheduler task.
#[derive(Debug)]
enum SyncRequest {
    /// Run now and reply with the report.
    Run(oneshot::Sender<Result<SyncReport>>),
    Shutdown,
}

/// Front end used to trigger runs and stop the scheduler.
#[derive(Clone)]
pub struct SyncScheduler {
    request_tx: mpsc::Sender<SyncRequest>,
}

impl SyncScheduler {
    /// Create a scheduler that runs every `period`, or only on request when `None`.
    pub fn new(period: Option<Duration>) -> (Self, SyncSchedulerHandle) {
        let (request_tx, request_rx) = mpsc::channel(16);
        (
            Self { request_tx },
            SyncSchedulerHandle { period, request_rx },
        )
    }

    /// Run a sync now and wait for its report.
    pub async fn request_sync(&self) -> Result<SyncReport> {
        let (response_tx, response_rx) = oneshot::channel();

        self.request_tx
            .send(SyncRequest::Run(response_tx))
            .await
            .map_err(|_| Error::Scheduler("Scheduler not running".to_string()))?;

        response_rx
            .await
            .map_err(|_| Error::Scheduler("Failed to receive sync result".to_string()))?
    }

    /// Stop the scheduler after the run in progress, if any.
    pub async fn shutdown(&self) {
        let _ = self.request_tx.send(SyncRequest::Shutdown).await;
    }
}

/// The scheduler's background loop.
pub struct SyncSchedulerHandle {
    period: Option<Duration>,
    request_rx: mpsc::Receiver<SyncRequest>,
}

impl SyncSchedulerHandle {
    /// Run the scheduler loop until shutdown.
    ///
    /// This should be spawned in a tokio task. `sync_fn` is called for
    /// every periodic tick and every request. A failed periodic run is
    /// logged and the loop keeps going.
    pub async fn run<F, Fut>(mut self, sync_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SyncReport>> + Send,
    {
        let mut ticker = self.period.map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!("Sync scheduler started (period: {:?})", self.period);

        loop {
            tokio::select! {
                request = self.request_rx.recv() => match request {
                    Some(SyncRequest::Run(response_tx)) => {
                        debug!("Processing sync request");
                        let _ = response_tx.send(sync_fn().await);
                    }
                    Some(SyncRequest::Shutdown) | None => {
                        info!("Sync scheduler shutting down");
                        break;
                    }
                },

                _ = wait_for_tick(&mut ticker) => {
                    debug!("Triggering periodic sync");
                    match sync_fn().await {
                        Ok(report) => info!(
                            "Periodic sync completed: {} updated, {} new, {} failed",
                            report.updated, report.new, report.failed
                        ),
                        Err(e) => error!("Periodic sync failed: {}", e),
                    }
                }
            }
        }
    }
}

async fn wait_for_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
