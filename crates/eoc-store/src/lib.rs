//! ---
//! eoc_section: "02-roster-data-model"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster data model and backend store seams."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Roster data model and the two collaborator seams of the console core:
//! the request/response [`RosterStore`] and the [`ChangeStream`] that
//! delivers table-level invalidation events. [`MemoryStore`] implements
//! both for tests and single-process embedding.

pub mod change;
pub mod credential;
pub mod memory;
pub mod store;
pub mod types;

/// Shared result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error taxonomy for the backend store seam.
///
/// `MissingCredential` is a synchronous precondition failure raised before
/// any call leaves the client. `Transport` and `Backend` are retryable and
/// surfaced verbatim to the operator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// No bearer credential was available before a call was attempted.
    #[error("no bearer credential is available")]
    MissingCredential,
    /// The referenced record does not exist on the backend.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The request never reached the backend.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The backend received and rejected the request.
    #[error("backend rejected the request: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::Backend(_))
    }
}

pub use change::{ChangeEvent, ChangeStream, ChangeSubscription, WatchSpec, WatchedTable};
pub use credential::Credential;
pub use memory::{MemoryStore, StoreCallMetrics, StoreOp};
pub use store::RosterStore;
pub use types::{
    CenterEvent, EvacueeRecord, LifecycleStatus, NewEvacuee, PersonIdentity, PersonMatch,
    RosterEntry, RosterStatistics,
};
