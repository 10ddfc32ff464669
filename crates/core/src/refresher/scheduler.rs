//! Periodic trigger for refresh cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::{RefreshError, Refresher, RefresherStatus};

/// Runs [`Refresher::run_once`] on a fixed interval.
///
/// Ticks that fire while a cycle is still running are skipped, so a slow
/// cycle never queues up a burst of catch-up runs.
pub struct RefreshScheduler {
    refresher: Arc<Refresher>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RefreshScheduler {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            refresher,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the scheduler (spawns the background loop).
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Refresh scheduler already running");
            return;
        }

        let interval_secs = self.refresher.config().interval_secs;
        info!(interval_secs, "Starting refresh scheduler");

        let refresher = Arc::clone(&self.refresher);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Refresh scheduler received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        match refresher.run_once().await {
                            Ok(_) => {}
                            Err(RefreshError::AlreadyRunning) => {
                                info!("Previous cycle still running, skipping tick");
                            }
                            Err(e) => {
                                error!(error = %e, "Scheduled refresh cycle failed");
                            }
                        }
                    }
                }
            }
            info!("Refresh scheduler stopped");
        });
    }

    /// Stop the scheduler.
    ///
    /// A cycle already in progress runs to completion (or to its timeout);
    /// the loop exits when it next polls the shutdown channel.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Refresh scheduler not running");
            return;
        }

        info!("Stopping refresh scheduler");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    pub async fn status(&self) -> RefresherStatus {
        RefresherStatus {
            scheduled: self.is_running(),
            ..self.refresher.status().await
        }
    }
}
