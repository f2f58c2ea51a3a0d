//! Background refresh of every tracked user's prediction.
//!
//! The scheduler owns a single tokio task that sleeps for the configured
//! interval, then runs one [`StoreCoordinator::refresh_all`] cycle. Shutdown
//! is cooperative: the signal wakes the sleeping task immediately, and a
//! cycle in progress stops at the next user boundary.

use crate::store::StoreCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to the running refresh task.
pub struct RefreshScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Spawn the refresh loop. Must be called within a tokio runtime.
    pub fn start(store: Arc<StoreCoordinator>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(refresh_loop(store, interval, shutdown_rx));
        info!(interval_secs = interval.as_secs_f64(), "refresh scheduler started");
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "refresh task ended abnormally");
        }
        info!("refresh scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

async fn refresh_loop(
    store: Arc<StoreCoordinator>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        if *shutdown_rx.borrow() {
            break;
        }

        let report = store.refresh_all(&shutdown_rx).await;
        debug!(
            refreshed = report.refreshed,
            skipped = report.skipped,
            failed = report.failed,
            "refresh cycle complete"
        );
        if report.cancelled {
            break;
        }
    }
}
