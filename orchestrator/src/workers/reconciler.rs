//! Periodic reconciliation worker

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::deploy::ServiceOrchestrator;

/// Reconciler worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between passes
    pub interval: Duration,

    /// Delay before the first pass
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Run the reconciler worker until `shutdown_signal` resolves
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &ServiceOrchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Reconciler worker starting...");

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Reconciler worker shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        debug!("Running reconciliation pass...");

        match orchestrator.reconcile().await {
            Ok(report) if report.has_errors() => {
                warn!(
                    errors = report.errors.len(),
                    "Reconciliation pass finished with errors"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!("Reconciliation pass failed: {}", e);
            }
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Reconciler worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}
