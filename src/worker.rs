//! Periodic batch worker
//!
//! Wraps a [`BatchRunner`] in a fixed-interval loop: run one batch, sleep,
//! repeat. Shutdown is signalled through a [`CancellationToken`]; the worker
//! finishes the batch in flight and exits during the sleep, leaving any
//! interrupted tasks in a state the next process can resume from.

use crate::batch::BatchRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Background worker that runs download batches on a fixed interval
pub struct BatchWorker {
    runner: Arc<BatchRunner>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl BatchWorker {
    /// Create a worker around a batch runner
    pub fn new(runner: Arc<BatchRunner>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the worker when cancelled
    ///
    /// Clone it and hand it to a signal handler or supervisor.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run batches until the shutdown token is cancelled
    ///
    /// A failing batch (e.g., the task store is unreachable) is logged and
    /// retried after the normal interval; the worker itself never exits on
    /// error.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Batch worker started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.runner.run_batch().await {
                Ok(stats) => {
                    if stats.total > 0 {
                        info!(
                            total = stats.total,
                            ready = stats.ready,
                            failed = stats.failed,
                            forbidden = stats.forbidden,
                            "Batch completed"
                        );
                    }
                }
                Err(e) => {
                    error!(error = %e, "Batch run failed");
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        info!("Batch worker stopped");
    }
}

/// Run the worker until a termination signal arrives
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(worker: BatchWorker) {
    let shutdown = worker.shutdown_token();

    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.cancel();
    });

    worker.run().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
