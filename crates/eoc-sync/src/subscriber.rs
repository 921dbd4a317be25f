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

use eoc_store::{ChangeStream, WatchSpec, WatchedTable};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::metrics::SyncCounters;

/// Internal indication that cached data may no longer match the backend.
///
/// Carries only the origin table for diagnostics; consumers must treat it
/// purely as "invalidate and refetch."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessSignal {
    /// Table whose change produced the signal.
    pub origin: WatchedTable,
}

/// Identifiers the meta subscription is keyed on.
///
/// Both only become known after the first successful load of the
/// center-event detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaKey {
    /// Physical-location id whose rooms are watched.
    pub location_id: Uuid,
    /// Parent disaster id whose record is watched.
    pub disaster_id: Uuid,
}

struct SubscriptionTask {
    label: &'static str,
    handle: JoinHandle<()>,
}

impl Drop for SubscriptionTask {
    fn drop(&mut self) {
        // aborting the forwarder drops its ChangeSubscription, which
        // unregisters on the backend side even if setup only got halfway
        self.handle.abort();
        trace!(subscription = self.label, "subscription torn down");
    }
}

/// Owns the two change-stream subscriptions of one roster view.
///
/// Replaces any process-wide channel registry: ownership is exclusive to
/// the view instance, and dropping the manager tears both streams down.
pub struct SubscriptionManager {
    stream: Arc<dyn ChangeStream>,
    signals: mpsc::UnboundedSender<StalenessSignal>,
    counters: Arc<SyncCounters>,
    core: Option<SubscriptionTask>,
    meta: Option<(MetaKey, SubscriptionTask)>,
}

impl SubscriptionManager {
    /// Create a manager forwarding staleness signals into `signals`.
    pub fn new(
        stream: Arc<dyn ChangeStream>,
        signals: mpsc::UnboundedSender<StalenessSignal>,
        counters: Arc<SyncCounters>,
    ) -> Self {
        Self {
            stream,
            signals,
            counters,
            core: None,
            meta: None,
        }
    }

    /// (Re)establish the core subscription for a center-event.
    ///
    /// Always stops any previous core subscription first, even when the
    /// event id is unchanged.
    pub fn start_core(&mut self, event_id: Uuid) {
        self.stop_core();
        let task = self.spawn(core_specs(event_id), "core");
        debug!(%event_id, "core subscription established");
        self.core = Some(task);
    }

    /// (Re)establish the meta subscription, keyed on location and disaster.
    ///
    /// A no-op while the key is unchanged; re-established whenever either
    /// underlying id changes.
    pub fn start_meta(&mut self, key: MetaKey) {
        if self
            .meta
            .as_ref()
            .is_some_and(|(current, _)| *current == key)
        {
            return;
        }
        self.stop_meta();
        let task = self.spawn(meta_specs(&key), "meta");
        debug!(location_id = %key.location_id, disaster_id = %key.disaster_id, "meta subscription established");
        self.meta = Some((key, task));
    }

    /// Tear down the core subscription.
    pub fn stop_core(&mut self) {
        self.core = None;
    }

    /// Tear down the meta subscription.
    pub fn stop_meta(&mut self) {
        self.meta = None;
    }

    /// Tear down both subscriptions.
    pub fn stop(&mut self) {
        self.stop_core();
        self.stop_meta();
    }

    fn spawn(&self, specs: Vec<WatchSpec>, label: &'static str) -> SubscriptionTask {
        let mut subscription = self.stream.subscribe(specs);
        let signals = self.signals.clone();
        let counters = self.counters.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = subscription.next_event().await {
                counters.record_signal();
                trace!(table = ?event.table, filter = event.filter_key.as_deref(), subscription = label, "change event raised staleness");
                if signals
                    .send(StalenessSignal {
                        origin: event.table,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
        SubscriptionTask { label, handle }
    }
}

fn core_specs(event_id: Uuid) -> Vec<WatchSpec> {
    let key = event_id.to_string();
    vec![
        WatchSpec::filtered(WatchedTable::Registrations, key.clone()),
        WatchSpec::table(WatchedTable::Persons),
        WatchSpec::table(WatchedTable::FamilyMemberships),
        WatchSpec::filtered(WatchedTable::Summaries, key.clone()),
        WatchSpec::filtered(WatchedTable::CenterEvents, key),
    ]
}

fn meta_specs(key: &MetaKey) -> Vec<WatchSpec> {
    vec![
        WatchSpec::filtered(WatchedTable::Rooms, key.location_id.to_string()),
        WatchSpec::filtered(WatchedTable::Locations, key.location_id.to_string()),
        WatchSpec::filtered(WatchedTable::Disasters, key.disaster_id.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoc_store::{ChangeEvent, ChangeSubscription};
    use parking_lot::Mutex;

    /// Records subscribe calls and lets tests push events by hand.
    #[derive(Default)]
    struct RecordingStream {
        state: Arc<Mutex<RecordingState>>,
    }

    #[derive(Default)]
    struct RecordingState {
        next_id: u64,
        active: Vec<(u64, Vec<WatchSpec>, mpsc::UnboundedSender<ChangeEvent>)>,
        subscribe_calls: u64,
    }

    impl RecordingStream {
        fn subscribe_calls(&self) -> u64 {
            self.state.lock().subscribe_calls
        }

        fn active_subscriptions(&self) -> usize {
            self.state.lock().active.len()
        }

        fn push(&self, event: ChangeEvent) {
            let state = self.state.lock();
            for (_, specs, sender) in &state.active {
                if specs.iter().any(|spec| spec.matches(&event)) {
                    let _ = sender.send(event.clone());
                }
            }
        }
    }

    impl ChangeStream for RecordingStream {
        fn subscribe(&self, specs: Vec<WatchSpec>) -> ChangeSubscription {
            let (sender, receiver) = mpsc::unbounded_channel();
            let id = {
                let mut state = self.state.lock();
                state.subscribe_calls += 1;
                let id = state.next_id;
                state.next_id += 1;
                state.active.push((id, specs, sender));
                id
            };
            let registry = self.state.clone();
            ChangeSubscription::new(receiver, move || {
                registry.lock().active.retain(|(sid, _, _)| *sid != id);
            })
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn manager_over(
        stream: &Arc<RecordingStream>,
    ) -> (
        SubscriptionManager,
        mpsc::UnboundedReceiver<StalenessSignal>,
        Arc<SyncCounters>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(SyncCounters::default());
        let manager = SubscriptionManager::new(
            stream.clone() as Arc<dyn ChangeStream>,
            tx,
            counters.clone(),
        );
        (manager, rx, counters)
    }

    #[tokio::test]
    async fn matching_core_event_raises_staleness() {
        let stream = Arc::new(RecordingStream::default());
        let (mut manager, mut rx, counters) = manager_over(&stream);
        let event_id = Uuid::new_v4();
        manager.start_core(event_id);

        stream.push(ChangeEvent {
            table: WatchedTable::Registrations,
            filter_key: Some(event_id.to_string()),
        });
        settle().await;

        let signal = rx.try_recv().expect("staleness raised");
        assert_eq!(signal.origin, WatchedTable::Registrations);
        assert_eq!(counters.snapshot().signals, 1);
    }

    #[tokio::test]
    async fn events_outside_the_filter_are_ignored() {
        let stream = Arc::new(RecordingStream::default());
        let (mut manager, mut rx, _) = manager_over(&stream);
        manager.start_core(Uuid::new_v4());

        stream.push(ChangeEvent {
            table: WatchedTable::Registrations,
            filter_key: Some(Uuid::new_v4().to_string()),
        });
        settle().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn meta_subscription_is_not_reestablished_for_the_same_key() {
        let stream = Arc::new(RecordingStream::default());
        let (mut manager, _rx, _) = manager_over(&stream);
        let key = MetaKey {
            location_id: Uuid::new_v4(),
            disaster_id: Uuid::new_v4(),
        };
        manager.start_meta(key);
        manager.start_meta(key);
        assert_eq!(stream.subscribe_calls(), 1);

        let changed = MetaKey {
            location_id: Uuid::new_v4(),
            ..key
        };
        manager.start_meta(changed);
        settle().await;
        assert_eq!(stream.subscribe_calls(), 2);
        assert_eq!(stream.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn stopping_tears_down_both_streams() {
        let stream = Arc::new(RecordingStream::default());
        let (mut manager, _rx, _) = manager_over(&stream);
        manager.start_core(Uuid::new_v4());
        manager.start_meta(MetaKey {
            location_id: Uuid::new_v4(),
            disaster_id: Uuid::new_v4(),
        });
        assert_eq!(stream.active_subscriptions(), 2);

        manager.stop();
        settle().await;
        assert_eq!(stream.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn dropping_the_manager_tears_down_streams() {
        let stream = Arc::new(RecordingStream::default());
        let (mut manager, _rx, _) = manager_over(&stream);
        manager.start_core(Uuid::new_v4());
        assert_eq!(stream.active_subscriptions(), 1);

        drop(manager);
        settle().await;
        assert_eq!(stream.active_subscriptions(), 0);
    }
}
