//! Periodic full refresh as a fallback for lost push events.

use crate::config::ReconcileConfig;
use crate::store::AnalysisCollectionStore;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Exponential backoff: `base`, `2*base`, `4*base`, ... capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.failures.min(31);
        self.failures = self.failures.saturating_add(1);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Timing for the reconciliation poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub interval: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl From<&ReconcileConfig> for ReconcilePolicy {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            interval: config.interval(),
            backoff_base: config.backoff_base(),
            backoff_max: config.backoff_max(),
        }
    }
}

/// Background task that re-runs `initialize` on a schedule.
///
/// After a success the next refresh is one `interval` away; after a
/// failure the delay follows the backoff until a refresh succeeds again.
pub struct Reconciler {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Reconciler {
    pub fn start(store: AnalysisCollectionStore, policy: ReconcilePolicy) -> Self {
        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut backoff = Backoff::new(policy.backoff_base, policy.backoff_max);
            let mut delay = policy.interval;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                match store.initialize().await {
                    Ok(()) => {
                        if backoff.failures() > 0 {
                            debug!("Refresh recovered after {} failures", backoff.failures());
                        }
                        backoff.reset();
                        delay = policy.interval;
                    }
                    Err(e) => {
                        delay = backoff.next_delay();
                        warn!("Refresh failed ({}), retrying in {:?}", e, delay);
                    }
                }
            }
        });

        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
