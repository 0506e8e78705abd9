//! Stopping the node's background tasks.
//!
//! Each periodic task holds a receiver from [`ShutdownController::subscribe`]
//! and `select!`s on it next to its interval tick.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber. Returns `false` if shutdown had already been
    /// triggered.
    pub fn shutdown(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolve on SIGINT or SIGTERM, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => info!(signal = "SIGINT", "shutdown requested"),
                Err(e) => warn!(error = %e, "cannot listen for SIGINT"),
            },
            _ = terminate() => info!(signal = "SIGTERM", "shutdown requested"),
        }
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_task_hears_the_stop() {
        let controller = ShutdownController::new();
        let mut download = controller.subscribe();
        let mut sweep = controller.subscribe();
        assert!(!controller.is_triggered());
        assert!(controller.shutdown());
        assert!(download.recv().await.is_ok());
        assert!(sweep.recv().await.is_ok());
        assert!(controller.is_triggered());
    }

    #[test]
    fn second_stop_is_a_no_op() {
        let controller = ShutdownController::new();
        assert!(controller.shutdown());
        assert!(!controller.shutdown());
    }
}
