//! ---
//! eoc_section: "02-roster-data-model"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster data model and backend store seams."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an evacuation-center event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// The operation is running and accepts registrations.
    #[default]
    Active,
    /// The operation has been closed out; no further writes are accepted.
    Ended,
}

impl LifecycleStatus {
    /// Convenience predicate used by write gates.
    pub fn is_ended(&self) -> bool {
        matches!(self, LifecycleStatus::Ended)
    }

    /// Static label for logging and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Active => "active",
            LifecycleStatus::Ended => "ended",
        }
    }
}

/// The pairing of one evacuation center with one disaster occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CenterEvent {
    /// Identifier of the center-event record.
    pub id: Uuid,
    /// Display name of the physical evacuation center.
    pub center_name: String,
    /// Identifier of the physical location record.
    pub location_id: Uuid,
    /// Identifier of the parent disaster occurrence.
    pub disaster_id: Uuid,
    /// When the disaster was declared; lower temporal bound for decampments.
    pub disaster_start: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: LifecycleStatus,
    /// When the operation ended, if it has.
    pub ended_at: Option<DateTime<Utc>>,
}

/// One family-level roster row.
///
/// Owned by the backend store; the client holds a read-only, possibly-stale
/// cached copy per center-event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Family identifier.
    pub family_id: Uuid,
    /// Display name of the family head.
    pub head_name: String,
    /// Originating locality of the family.
    pub locality: String,
    /// Total individual count registered under this family.
    pub headcount: u32,
    /// Assigned room name; `None` while unassigned.
    pub room: Option<String>,
    /// Decampment timestamp; `None` while still present at the center.
    pub decamped_at: Option<DateTime<Utc>>,
}

impl RosterEntry {
    /// Whether the family is still present at the center.
    pub fn is_present(&self) -> bool {
        self.decamped_at.is_none()
    }
}

/// One individual registrant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvacueeRecord {
    /// Person identifier.
    pub person_id: Uuid,
    /// Full display name.
    pub full_name: String,
    /// Birth date when recorded; used for duplicate disambiguation.
    pub birth_date: Option<NaiveDate>,
    /// Family this person is registered under.
    pub family_id: Uuid,
    /// Center-event the registration belongs to.
    pub event_id: Uuid,
    /// Decampment timestamp for this individual.
    pub decamped_at: Option<DateTime<Utc>>,
}

/// Candidate identity submitted for registration, before any record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonIdentity {
    /// Full name as typed by the operator.
    pub full_name: String,
    /// Birth date when the operator supplied one.
    pub birth_date: Option<NaiveDate>,
}

/// A prospective registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvacuee {
    /// Full name of the registrant.
    pub full_name: String,
    /// Birth date when known.
    pub birth_date: Option<NaiveDate>,
    /// Originating locality.
    pub locality: String,
    /// Existing family to join; `None` registers a new family with this
    /// person as its head.
    pub family_id: Option<Uuid>,
    /// Room assignment when already decided at intake.
    pub room: Option<String>,
}

impl NewEvacuee {
    /// The identity fields used for duplicate checking.
    pub fn identity(&self) -> PersonIdentity {
        PersonIdentity {
            full_name: self.full_name.clone(),
            birth_date: self.birth_date,
        }
    }
}

/// One row returned by the backend's duplicate-identity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonMatch {
    /// Person identifier of the existing registration.
    pub person_id: Uuid,
    /// Full name on record.
    pub full_name: String,
    /// Birth date on record.
    pub birth_date: Option<NaiveDate>,
    /// Center-event the existing registration belongs to.
    pub event_id: Uuid,
    /// Display name of that center, for the blocking dialog.
    pub center_name: String,
    /// Whether the existing registration has already decamped.
    pub decamped: bool,
}

/// Derived scalars recomputed by the backend on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RosterStatistics {
    /// Number of family-level roster rows.
    pub families: u64,
    /// Total registered individuals.
    pub individuals: u64,
    /// Individuals not yet decamped.
    pub present: u64,
}
