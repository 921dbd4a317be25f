//! ---
//! eoc_section: "02-roster-data-model"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster data model and backend store seams."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Backend tables the console watches for invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedTable {
    /// Family registration rows, filterable by center-event id.
    Registrations,
    /// Individual person rows.
    Persons,
    /// Person-to-family membership rows.
    FamilyMemberships,
    /// Backend-derived summary rows, filterable by center-event id.
    Summaries,
    /// Center-event rows themselves, filterable by id.
    CenterEvents,
    /// Room rows, filterable by location id.
    Rooms,
    /// Physical location rows.
    Locations,
    /// Disaster occurrence rows.
    Disasters,
}

/// An opaque change notification delivered by the backend stream.
///
/// Carries no payload the client trusts: every event means only "something
/// in this filter changed, invalidate and refetch," never an incremental
/// patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The table that changed.
    pub table: WatchedTable,
    /// Row filter the change falls under, when the backend scoped it.
    pub filter_key: Option<String>,
}

/// One table-plus-filter a subscription asks the backend to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    /// The table to watch.
    pub table: WatchedTable,
    /// Restrict delivery to changes under this row filter.
    pub filter_key: Option<String>,
}

impl WatchSpec {
    /// Watch every change to a table.
    pub fn table(table: WatchedTable) -> Self {
        Self {
            table,
            filter_key: None,
        }
    }

    /// Watch changes under one row filter of a table.
    pub fn filtered(table: WatchedTable, key: impl Into<String>) -> Self {
        Self {
            table,
            filter_key: Some(key.into()),
        }
    }

    /// Whether an incoming event falls under this spec.
    ///
    /// A table-wide event carrying no filter key invalidates every filtered
    /// watcher of that table.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if self.table != event.table {
            return false;
        }
        match (&self.filter_key, &event.filter_key) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(want), Some(got)) => want == got,
        }
    }
}

/// The change-notification collaborator seam.
///
/// Implementations deliver matching events in arrival order per
/// subscription; no ordering is guaranteed across subscriptions.
pub trait ChangeStream: Send + Sync {
    /// Open a subscription covering the given specs.
    fn subscribe(&self, specs: Vec<WatchSpec>) -> ChangeSubscription;
}

/// An open change-stream subscription.
///
/// Dropping the subscription tears it down on the backend side
/// unconditionally, including when the consumer task is aborted mid-setup.
pub struct ChangeSubscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl ChangeSubscription {
    /// Assemble a subscription from a delivery channel and a teardown hook.
    pub fn new(
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        teardown: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Await the next event; `None` once the stream has closed.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next_event(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl std::fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSubscription").finish_non_exhaustive()
    }
}
