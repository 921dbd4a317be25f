//! ---
//! eoc_section: "03-live-synchronization"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Change-stream subscription and refresh coalescing."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of sync pipeline metrics used by dashboards and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncMetrics {
    /// Staleness signals forwarded from the change stream.
    pub signals: u64,
    /// Coalesced refresh triggers emitted downstream.
    pub refreshes_due: u64,
}

/// Shared counters written by the subscriber and coalescer stages.
#[derive(Debug, Default)]
pub struct SyncCounters {
    signals: AtomicU64,
    refreshes_due: AtomicU64,
}

impl SyncCounters {
    /// Record one staleness signal.
    pub fn record_signal(&self) {
        self.signals.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one coalesced refresh trigger.
    pub fn record_refresh_due(&self) {
        self.refreshes_due.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the current metrics snapshot.
    pub fn snapshot(&self) -> SyncMetrics {
        SyncMetrics {
            signals: self.signals.load(Ordering::Relaxed),
            refreshes_due: self.refreshes_due.load(Ordering::Relaxed),
        }
    }
}
