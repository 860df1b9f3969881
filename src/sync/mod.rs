//! Keeping the store in step with the server.
//!
//! `SyncSession` pumps a push transport into a store on a background task;
//! `Reconciler` refreshes the whole collection periodically as a fallback
//! for events the push channel lost.

pub mod reconcile;
pub mod transport;

use crate::models::StatusEvent;
use crate::store::{AnalysisCollectionStore, EventOutcome};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use reconcile::{Backoff, ReconcilePolicy, Reconciler};
pub use transport::{ChannelTransport, HttpEventStream, PushTransport};

/// Counters collected by a session's pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub applied: usize,
    pub unknown: usize,
    pub stale: usize,
    pub transport_errors: usize,
}

/// Owns one transport and the task feeding it into a store.
pub struct SyncSession {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<SyncStats>>,
}

impl SyncSession {
    /// Start pumping `transport` into `store`.
    pub fn start<T>(store: AnalysisCollectionStore, transport: T) -> Self
    where
        T: PushTransport + 'static,
    {
        Self::start_with_observer(store, transport, None)
    }

    /// Like [`start`](Self::start), additionally forwarding each applied
    /// event to `observer`.
    pub fn start_with_observer<T>(
        store: AnalysisCollectionStore,
        mut transport: T,
        observer: Option<mpsc::UnboundedSender<StatusEvent>>,
    ) -> Self
    where
        T: PushTransport + 'static,
    {
        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut stats = SyncStats::default();
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("Sync session stopped");
                        break;
                    }
                    next = transport.next_event() => match next {
                        Some(Ok(event)) => match store.apply_status_event(&event) {
                            EventOutcome::Applied => {
                                stats.applied += 1;
                                if let Some(ref observer) = observer {
                                    let _ = observer.send(event);
                                }
                            }
                            EventOutcome::UnknownRecord => stats.unknown += 1,
                            EventOutcome::Stale => stats.stale += 1,
                        },
                        Some(Err(e)) => {
                            // No reconnect here; the reconciler covers the gap.
                            warn!("Push channel failed: {}", e);
                            stats.transport_errors += 1;
                            break;
                        }
                        None => {
                            info!("Push channel closed");
                            break;
                        }
                    }
                }
            }
            stats
        });

        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /// Returns true once the transport has closed or failed.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the transport to close on its own.
    pub async fn join(mut self) -> SyncStats {
        // Dropping the stop sender would end the pump early.
        let _stop = self.stop.take();
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => SyncStats::default(),
        }
    }

    /// Stop the pump and return its counters.
    pub async fn stop(mut self) -> SyncStats {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => SyncStats::default(),
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
