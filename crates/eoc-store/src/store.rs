//! ---
//! eoc_section: "02-roster-data-model"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster data model and backend store seams."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::credential::Credential;
use crate::types::{
    CenterEvent, NewEvacuee, PersonIdentity, PersonMatch, RosterEntry, RosterStatistics,
};
use crate::Result;

/// The request/response API collaborator seam.
///
/// Every call carries the bearer credential; implementations surface
/// transport and backend failures verbatim as retryable [`crate::StoreError`]
/// values. The backend remains the single arbiter of consistency: the
/// client never writes based on compare-and-swap against its own cache.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Fetch the center-event detail record.
    async fn center_event(&self, credential: &Credential, event_id: Uuid) -> Result<CenterEvent>;

    /// Fetch the family-level roster listing for an event.
    async fn roster_entries(
        &self,
        credential: &Credential,
        event_id: Uuid,
    ) -> Result<Vec<RosterEntry>>;

    /// Fetch the backend-derived statistics for an event.
    async fn statistics(
        &self,
        credential: &Credential,
        event_id: Uuid,
    ) -> Result<RosterStatistics>;

    /// Fetch the count of families that have not yet decamped.
    async fn undecamped_count(&self, credential: &Credential, event_id: Uuid) -> Result<u64>;

    /// Search existing registrations matching a candidate identity across
    /// all center-events of a disaster.
    async fn search_person_matches(
        &self,
        credential: &Credential,
        disaster_id: Uuid,
        identity: &PersonIdentity,
    ) -> Result<Vec<PersonMatch>>;

    /// Submit a new individual registration into an event.
    async fn submit_evacuee(
        &self,
        credential: &Credential,
        event_id: Uuid,
        evacuee: NewEvacuee,
    ) -> Result<Uuid>;

    /// Rename the head of an existing family.
    async fn edit_family_head(
        &self,
        credential: &Credential,
        event_id: Uuid,
        family_id: Uuid,
        head_name: &str,
    ) -> Result<()>;

    /// Mark one family as decamped at the given instant.
    async fn decamp_family(
        &self,
        credential: &Credential,
        event_id: Uuid,
        family_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Mark every still-present family in the event as decamped at the
    /// given instant.
    async fn decamp_all(
        &self,
        credential: &Credential,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Set the event's end timestamp, closing the operation.
    async fn end_operation(
        &self,
        credential: &Credential,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
