//! ---
//! eoc_section: "03-live-synchronization"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Change-stream subscription and refresh coalescing."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use crate::metrics::SyncCounters;
use crate::subscriber::StalenessSignal;

/// Marker emitted once per coalesced burst of staleness signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshDue;

/// Collapses bursts of staleness signals into single refresh triggers.
///
/// Each incoming signal restarts the quiet-period timer; only when the
/// timer elapses without a further signal does a [`RefreshDue`] go out. A
/// single backend write commonly touches 2-4 watched tables, so the quiet
/// period turns those near-simultaneous events into one refetch. The timer
/// mechanism is independent of whether the downstream refetch succeeds.
///
/// User-initiated refreshes are not routed through the coalescer; the view
/// runs them immediately.
pub struct RefreshCoalescer {
    handle: JoinHandle<()>,
}

impl RefreshCoalescer {
    /// Spawn the coalescing stage.
    ///
    /// Consumes staleness signals from `signals` and returns the receiver
    /// on which coalesced [`RefreshDue`] markers arrive.
    pub fn spawn(
        quiet_period: Duration,
        mut signals: mpsc::UnboundedReceiver<StalenessSignal>,
        counters: Arc<SyncCounters>,
    ) -> (Self, mpsc::UnboundedReceiver<RefreshDue>) {
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                match deadline {
                    None => match signals.recv().await {
                        Some(signal) => {
                            trace!(origin = ?signal.origin, "quiet period started");
                            deadline = Some(Instant::now() + quiet_period);
                        }
                        None => break,
                    },
                    Some(at) => tokio::select! {
                        signal = signals.recv() => match signal {
                            Some(signal) => {
                                trace!(origin = ?signal.origin, "quiet period restarted");
                                deadline = Some(Instant::now() + quiet_period);
                            }
                            None => break,
                        },
                        _ = sleep_until(at) => {
                            deadline = None;
                            counters.record_refresh_due();
                            trace!("quiet period elapsed, refresh due");
                            if due_tx.send(RefreshDue).is_err() {
                                break;
                            }
                        }
                    },
                }
            }
        });
        (Self { handle }, due_rx)
    }

    /// Invalidate any pending timer and stop the stage.
    ///
    /// Guarantees a refresh can no longer fire against a view that is
    /// going away.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for RefreshCoalescer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
