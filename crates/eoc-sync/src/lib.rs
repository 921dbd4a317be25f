//! ---
//! eoc_section: "03-live-synchronization"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Change-stream subscription and refresh coalescing."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
//! Live synchronization stages for one roster view: the change-stream
//! [`SubscriptionManager`] translates backend table events into staleness
//! signals, and the [`RefreshCoalescer`] collapses bursts of those signals
//! into single refresh triggers.

pub mod coalescer;
pub mod metrics;
pub mod subscriber;

pub use coalescer::{RefreshCoalescer, RefreshDue};
pub use metrics::{SyncCounters, SyncMetrics};
pub use subscriber::{MetaKey, StalenessSignal, SubscriptionManager};
