//! ---
//! eoc_section: "02-roster-data-model"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster data model and backend store seams."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::change::{ChangeEvent, ChangeStream, ChangeSubscription, WatchSpec, WatchedTable};
use crate::credential::Credential;
use crate::store::RosterStore;
use crate::types::{
    CenterEvent, EvacueeRecord, NewEvacuee, PersonIdentity, PersonMatch, RosterEntry,
    RosterStatistics,
};
use crate::{Result, StoreError};

/// Store operations that can have failures scripted against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StoreOp {
    CenterEvent,
    RosterEntries,
    Statistics,
    UndecampedCount,
    SearchMatches,
    SubmitEvacuee,
    EditFamilyHead,
    DecampFamily,
    DecampAll,
    EndOperation,
}

/// Snapshot of per-operation call counts, for assertions about what did
/// (and did not) reach the backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreCallMetrics {
    /// Read calls: detail, entries, statistics, undecamped count.
    pub reads: u64,
    /// Duplicate-identity searches.
    pub searches: u64,
    /// Individual registrations submitted.
    pub submits: u64,
    /// Family-head edits.
    pub head_edits: u64,
    /// Single-family decampments.
    pub family_decamps: u64,
    /// Bulk decamp-all writes.
    pub bulk_decamps: u64,
    /// End-operation writes.
    pub end_operations: u64,
}

struct Subscriber {
    id: u64,
    specs: Vec<WatchSpec>,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, CenterEvent>,
    entries: HashMap<Uuid, Vec<RosterEntry>>,
    evacuees: Vec<EvacueeRecord>,
    failures: HashMap<StoreOp, VecDeque<StoreError>>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    metrics: StoreCallMetrics,
}

/// In-memory backend implementing both collaborator seams.
///
/// Every write publishes the same set of table events the production
/// backend touches, so subscribers see realistic 2-4 event bursts per
/// write. Failures can be scripted per operation to exercise transport
/// error paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a center-event record.
    pub fn seed_event(&self, event: CenterEvent) {
        let mut inner = self.inner.lock();
        inner.entries.entry(event.id).or_default();
        inner.events.insert(event.id, event);
    }

    /// Insert a family roster row into an event.
    pub fn seed_family(&self, event_id: Uuid, entry: RosterEntry) {
        let mut inner = self.inner.lock();
        inner.entries.entry(event_id).or_default().push(entry);
    }

    /// Insert an individual registration record.
    pub fn seed_evacuee(&self, record: EvacueeRecord) {
        self.inner.lock().evacuees.push(record);
    }

    /// Script the next call to `op` to fail with `error`.
    ///
    /// Scripted failures are consumed in order, one per call.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.inner
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Snapshot the per-operation call counts.
    pub fn metrics(&self) -> StoreCallMetrics {
        self.inner.lock().metrics
    }

    fn begin(&self, op: StoreOp) -> Result<()> {
        let mut inner = self.inner.lock();
        match op {
            StoreOp::CenterEvent
            | StoreOp::RosterEntries
            | StoreOp::Statistics
            | StoreOp::UndecampedCount => inner.metrics.reads += 1,
            StoreOp::SearchMatches => inner.metrics.searches += 1,
            StoreOp::SubmitEvacuee => inner.metrics.submits += 1,
            StoreOp::EditFamilyHead => inner.metrics.head_edits += 1,
            StoreOp::DecampFamily => inner.metrics.family_decamps += 1,
            StoreOp::DecampAll => inner.metrics.bulk_decamps += 1,
            StoreOp::EndOperation => inner.metrics.end_operations += 1,
        }
        if let Some(queue) = inner.failures.get_mut(&op) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }
        Ok(())
    }

    fn publish(&self, events: Vec<ChangeEvent>) {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|subscriber| {
            if subscriber.sender.is_closed() {
                return false;
            }
            for event in &events {
                if subscriber.specs.iter().any(|spec| spec.matches(event)) {
                    // delivery failure means the receiver just went away;
                    // the retain pass above catches it next publish
                    let _ = subscriber.sender.send(event.clone());
                }
            }
            true
        });
    }

    fn event_burst(event_id: Uuid, tables: &[WatchedTable]) -> Vec<ChangeEvent> {
        let key = event_id.to_string();
        tables
            .iter()
            .map(|table| match table {
                WatchedTable::Persons | WatchedTable::FamilyMemberships => ChangeEvent {
                    table: *table,
                    filter_key: None,
                },
                table => ChangeEvent {
                    table: *table,
                    filter_key: Some(key.clone()),
                },
            })
            .collect()
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl RosterStore for MemoryStore {
    async fn center_event(&self, _credential: &Credential, event_id: Uuid) -> Result<CenterEvent> {
        self.begin(StoreOp::CenterEvent)?;
        self.inner
            .lock()
            .events
            .get(&event_id)
            .cloned()
            .ok_or(StoreError::NotFound("center event"))
    }

    async fn roster_entries(
        &self,
        _credential: &Credential,
        event_id: Uuid,
    ) -> Result<Vec<RosterEntry>> {
        self.begin(StoreOp::RosterEntries)?;
        self.inner
            .lock()
            .entries
            .get(&event_id)
            .cloned()
            .ok_or(StoreError::NotFound("center event"))
    }

    async fn statistics(
        &self,
        _credential: &Credential,
        event_id: Uuid,
    ) -> Result<RosterStatistics> {
        self.begin(StoreOp::Statistics)?;
        let inner = self.inner.lock();
        let entries = inner
            .entries
            .get(&event_id)
            .ok_or(StoreError::NotFound("center event"))?;
        Ok(RosterStatistics {
            families: entries.len() as u64,
            individuals: entries.iter().map(|e| u64::from(e.headcount)).sum(),
            present: entries
                .iter()
                .filter(|e| e.is_present())
                .map(|e| u64::from(e.headcount))
                .sum(),
        })
    }

    async fn undecamped_count(&self, _credential: &Credential, event_id: Uuid) -> Result<u64> {
        self.begin(StoreOp::UndecampedCount)?;
        let inner = self.inner.lock();
        let entries = inner
            .entries
            .get(&event_id)
            .ok_or(StoreError::NotFound("center event"))?;
        Ok(entries.iter().filter(|e| e.is_present()).count() as u64)
    }

    async fn search_person_matches(
        &self,
        _credential: &Credential,
        disaster_id: Uuid,
        identity: &PersonIdentity,
    ) -> Result<Vec<PersonMatch>> {
        self.begin(StoreOp::SearchMatches)?;
        let inner = self.inner.lock();
        let wanted = normalize(&identity.full_name);
        let matches = inner
            .evacuees
            .iter()
            .filter(|record| normalize(&record.full_name) == wanted)
            .filter_map(|record| {
                let event = inner.events.get(&record.event_id)?;
                if event.disaster_id != disaster_id {
                    return None;
                }
                Some(PersonMatch {
                    person_id: record.person_id,
                    full_name: record.full_name.clone(),
                    birth_date: record.birth_date,
                    event_id: record.event_id,
                    center_name: event.center_name.clone(),
                    decamped: record.decamped_at.is_some(),
                })
            })
            .collect();
        Ok(matches)
    }

    async fn submit_evacuee(
        &self,
        _credential: &Credential,
        event_id: Uuid,
        evacuee: NewEvacuee,
    ) -> Result<Uuid> {
        self.begin(StoreOp::SubmitEvacuee)?;
        let person_id = Uuid::new_v4();
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let event = inner
                .events
                .get(&event_id)
                .ok_or(StoreError::NotFound("center event"))?;
            if event.status.is_ended() {
                return Err(StoreError::Backend("operation has ended".to_owned()));
            }
            let family_id = match evacuee.family_id {
                Some(family_id) => {
                    let entries = inner.entries.entry(event_id).or_default();
                    let entry = entries
                        .iter_mut()
                        .find(|entry| entry.family_id == family_id)
                        .ok_or(StoreError::NotFound("family"))?;
                    entry.headcount += 1;
                    family_id
                }
                None => {
                    let family_id = Uuid::new_v4();
                    inner.entries.entry(event_id).or_default().push(RosterEntry {
                        family_id,
                        head_name: evacuee.full_name.clone(),
                        locality: evacuee.locality.clone(),
                        headcount: 1,
                        room: evacuee.room.clone(),
                        decamped_at: None,
                    });
                    family_id
                }
            };
            inner.evacuees.push(EvacueeRecord {
                person_id,
                full_name: evacuee.full_name,
                birth_date: evacuee.birth_date,
                family_id,
                event_id,
                decamped_at: None,
            });
        }
        debug!(%event_id, %person_id, "evacuee registered");
        self.publish(Self::event_burst(
            event_id,
            &[
                WatchedTable::Registrations,
                WatchedTable::Persons,
                WatchedTable::FamilyMemberships,
                WatchedTable::Summaries,
            ],
        ));
        Ok(person_id)
    }

    async fn edit_family_head(
        &self,
        _credential: &Credential,
        event_id: Uuid,
        family_id: Uuid,
        head_name: &str,
    ) -> Result<()> {
        self.begin(StoreOp::EditFamilyHead)?;
        {
            let mut inner = self.inner.lock();
            let entries = inner
                .entries
                .get_mut(&event_id)
                .ok_or(StoreError::NotFound("center event"))?;
            let entry = entries
                .iter_mut()
                .find(|entry| entry.family_id == family_id)
                .ok_or(StoreError::NotFound("family"))?;
            entry.head_name = head_name.to_owned();
        }
        self.publish(Self::event_burst(
            event_id,
            &[
                WatchedTable::Registrations,
                WatchedTable::Persons,
                WatchedTable::Summaries,
            ],
        ));
        Ok(())
    }

    async fn decamp_family(
        &self,
        _credential: &Credential,
        event_id: Uuid,
        family_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.begin(StoreOp::DecampFamily)?;
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let entries = inner
                .entries
                .get_mut(&event_id)
                .ok_or(StoreError::NotFound("center event"))?;
            let entry = entries
                .iter_mut()
                .find(|entry| entry.family_id == family_id)
                .ok_or(StoreError::NotFound("family"))?;
            entry.decamped_at = Some(at);
            for record in inner
                .evacuees
                .iter_mut()
                .filter(|record| record.family_id == family_id)
            {
                record.decamped_at = Some(at);
            }
        }
        self.publish(Self::event_burst(
            event_id,
            &[WatchedTable::Registrations, WatchedTable::Summaries],
        ));
        Ok(())
    }

    async fn decamp_all(
        &self,
        _credential: &Credential,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.begin(StoreOp::DecampAll)?;
        let mut decamped_families = Vec::new();
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let entries = inner
                .entries
                .get_mut(&event_id)
                .ok_or(StoreError::NotFound("center event"))?;
            for entry in entries.iter_mut().filter(|entry| entry.is_present()) {
                entry.decamped_at = Some(at);
                decamped_families.push(entry.family_id);
            }
            for record in inner
                .evacuees
                .iter_mut()
                .filter(|record| decamped_families.contains(&record.family_id))
            {
                record.decamped_at = Some(at);
            }
        }
        debug!(%event_id, families = decamped_families.len(), "bulk decampment applied");
        self.publish(Self::event_burst(
            event_id,
            &[WatchedTable::Registrations, WatchedTable::Summaries],
        ));
        Ok(())
    }

    async fn end_operation(
        &self,
        _credential: &Credential,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.begin(StoreOp::EndOperation)?;
        {
            let mut inner = self.inner.lock();
            let event = inner
                .events
                .get_mut(&event_id)
                .ok_or(StoreError::NotFound("center event"))?;
            event.status = crate::types::LifecycleStatus::Ended;
            event.ended_at = Some(at);
        }
        debug!(%event_id, ended_at = %at, "operation ended");
        self.publish(Self::event_burst(
            event_id,
            &[WatchedTable::CenterEvents, WatchedTable::Summaries],
        ));
        Ok(())
    }
}

impl ChangeStream for MemoryStore {
    fn subscribe(&self, specs: Vec<WatchSpec>) -> ChangeSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.push(Subscriber { id, specs, sender });
            id
        };
        let registry = self.inner.clone();
        ChangeSubscription::new(receiver, move || {
            registry
                .lock()
                .subscribers
                .retain(|subscriber| subscriber.id != id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LifecycleStatus;

    fn credential() -> Credential {
        Credential::new("test-token").expect("valid token")
    }

    fn seeded() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let event_id = Uuid::new_v4();
        store.seed_event(CenterEvent {
            id: event_id,
            center_name: "Riverside Gym".to_owned(),
            location_id: Uuid::new_v4(),
            disaster_id: Uuid::new_v4(),
            disaster_start: Utc::now() - chrono::Duration::days(7),
            status: LifecycleStatus::Active,
            ended_at: None,
        });
        (store, event_id)
    }

    #[tokio::test]
    async fn submitting_publishes_a_four_table_burst() {
        let (store, event_id) = seeded();
        let mut subscription = store.subscribe(vec![
            WatchSpec::filtered(WatchedTable::Registrations, event_id.to_string()),
            WatchSpec::table(WatchedTable::Persons),
            WatchSpec::table(WatchedTable::FamilyMemberships),
            WatchSpec::filtered(WatchedTable::Summaries, event_id.to_string()),
        ]);

        store
            .submit_evacuee(
                &credential(),
                event_id,
                NewEvacuee {
                    full_name: "Sato Hanako".to_owned(),
                    birth_date: None,
                    locality: "North Ward".to_owned(),
                    family_id: None,
                    room: None,
                },
            )
            .await
            .expect("registration succeeds");

        let mut tables = Vec::new();
        for _ in 0..4 {
            tables.push(subscription.next_event().await.expect("event").table);
        }
        assert_eq!(
            tables,
            vec![
                WatchedTable::Registrations,
                WatchedTable::Persons,
                WatchedTable::FamilyMemberships,
                WatchedTable::Summaries,
            ]
        );
    }

    #[tokio::test]
    async fn events_for_other_filters_are_not_delivered() {
        let (store, event_id) = seeded();
        let other = Uuid::new_v4();
        let mut subscription = store.subscribe(vec![WatchSpec::filtered(
            WatchedTable::Registrations,
            other.to_string(),
        )]);

        store
            .submit_evacuee(
                &credential(),
                event_id,
                NewEvacuee {
                    full_name: "Sato Hanako".to_owned(),
                    birth_date: None,
                    locality: "North Ward".to_owned(),
                    family_id: None,
                    room: None,
                },
            )
            .await
            .expect("registration succeeds");

        // delivery is synchronous inside publish, so nothing pending means
        // the event was filtered out
        assert!(subscription.try_next_event().is_none());
    }

    #[tokio::test]
    async fn scripted_failure_consumes_once() {
        let (store, event_id) = seeded();
        store.fail_next(
            StoreOp::UndecampedCount,
            StoreError::Transport("connection reset".to_owned()),
        );
        let err = store
            .undecamped_count(&credential(), event_id)
            .await
            .expect_err("scripted failure");
        assert!(err.is_retryable());
        assert_eq!(
            store
                .undecamped_count(&credential(), event_id)
                .await
                .expect("second call passes"),
            0
        );
        assert_eq!(store.metrics().reads, 2);
    }

    #[tokio::test]
    async fn decamp_all_leaves_no_family_present() {
        let (store, event_id) = seeded();
        for n in 0..3 {
            store.seed_family(
                event_id,
                RosterEntry {
                    family_id: Uuid::new_v4(),
                    head_name: format!("Head {n}"),
                    locality: "West Ward".to_owned(),
                    headcount: 2,
                    room: None,
                    decamped_at: None,
                },
            );
        }
        let at = Utc::now();
        store
            .decamp_all(&credential(), event_id, at)
            .await
            .expect("bulk decamp succeeds");
        assert_eq!(
            store
                .undecamped_count(&credential(), event_id)
                .await
                .expect("count"),
            0
        );
        let entries = store
            .roster_entries(&credential(), event_id)
            .await
            .expect("entries");
        assert!(entries.iter().all(|entry| entry.decamped_at == Some(at)));
    }

    #[tokio::test]
    async fn search_matches_only_within_the_disaster() {
        let (store, event_id) = seeded();
        let disaster_id = store
            .center_event(&credential(), event_id)
            .await
            .expect("event")
            .disaster_id;
        let family_id = Uuid::new_v4();
        store.seed_evacuee(EvacueeRecord {
            person_id: Uuid::new_v4(),
            full_name: "Sato  Hanako".to_owned(),
            birth_date: None,
            family_id,
            event_id,
            decamped_at: None,
        });
        // same name registered under an unrelated disaster
        let unrelated_event = Uuid::new_v4();
        store.seed_event(CenterEvent {
            id: unrelated_event,
            center_name: "Hilltop Hall".to_owned(),
            location_id: Uuid::new_v4(),
            disaster_id: Uuid::new_v4(),
            disaster_start: Utc::now() - chrono::Duration::days(30),
            status: LifecycleStatus::Active,
            ended_at: None,
        });
        store.seed_evacuee(EvacueeRecord {
            person_id: Uuid::new_v4(),
            full_name: "Sato Hanako".to_owned(),
            birth_date: None,
            family_id: Uuid::new_v4(),
            event_id: unrelated_event,
            decamped_at: None,
        });

        let matches = store
            .search_person_matches(
                &credential(),
                disaster_id,
                &PersonIdentity {
                    full_name: "sato hanako".to_owned(),
                    birth_date: None,
                },
            )
            .await
            .expect("search");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].event_id, event_id);
    }
}
