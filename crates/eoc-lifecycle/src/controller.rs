//! ---
//! eoc_section: "05-operation-lifecycle"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Operation lifecycle state machine and end flow."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use eoc_common::time::{as_local, check_bounds, BoundsViolation};
use eoc_store::{Credential, LifecycleStatus, RosterStore, StoreError};
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Client-side lifecycle phase of one evacuation operation.
///
/// `EndRequested` is never persisted: it models the open end-operation
/// confirmation flow and can be abandoned back to `Active` without side
/// effects. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// The operation accepts registrations and decampments.
    Active,
    /// The end-operation confirmation flow is open.
    EndRequested,
    /// The operation has ended; all writes are rejected locally.
    Ended,
}

/// Inputs captured when the end flow opens.
///
/// The plan pins the refresh generation it was derived from; a plan whose
/// generation is no longer current must be rebuilt, never submitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndPlan {
    /// Families still present when the flow opened.
    pub undecamped: u64,
    /// Refresh generation the count was read from.
    pub generation: u64,
    /// Lower temporal bound for the decampment timestamp.
    pub disaster_start: DateTime<Utc>,
    /// Pre-filled decampment timestamp offered to the operator.
    pub default_timestamp: DateTime<Utc>,
}

/// What a successful confirmation did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndOutcome {
    /// The instant written as decampment and operation end.
    pub ended_at: DateTime<Utc>,
    /// Whether a bulk decampment preceded the end write.
    pub bulk_decamped: bool,
}

/// Failures of the lifecycle flow.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The operation has already ended; rejected locally, no write attempted.
    #[error("the operation has already ended")]
    AlreadyEnded,
    /// Confirmation arrived without an open end request.
    #[error("no end request is in progress")]
    NotRequested,
    /// The plan was derived from a refresh generation that is no longer
    /// current; rebuild it from the latest snapshot.
    #[error("the end request is based on stale roster data")]
    StalePlan,
    /// The chosen decampment timestamp fell outside the permitted range.
    #[error("invalid decampment timestamp: {0}")]
    InvalidTimestamp(#[from] BoundsViolation),
    /// The bulk-decamp write failed; nothing was ended, retry is safe.
    #[error("bulk decampment failed: {source}")]
    Decamp {
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
    /// The end-operation write failed. When `decamped` is set the preceding
    /// bulk decampment already went through, so the outcome is ambiguous
    /// until a forced refresh re-derives state from the store.
    #[error("ending the operation failed: {source}")]
    End {
        /// Whether the bulk-decamp step had already succeeded.
        decamped: bool,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
}

impl LifecycleError {
    /// Whether the caller must force a refresh before showing anything
    /// derived from cached state.
    pub fn requires_refresh(&self) -> bool {
        matches!(self, LifecycleError::End { decamped: true, .. })
    }
}

/// Governs end-of-operation actions for one center-event.
///
/// Gating decisions are made against the cached lifecycle status, which the
/// owning view keeps current via [`LifecycleController::sync_status`] after
/// every refresh; the controller never relies solely on the backend to
/// reject a write against an ended operation. The phase lock is never held
/// across an await; the owning view serializes confirmations behind its
/// modal dialog.
pub struct LifecycleController {
    store: Arc<dyn RosterStore>,
    credential: Credential,
    event_id: Uuid,
    phase: Mutex<LifecyclePhase>,
}

impl LifecycleController {
    /// Create a controller seeded with the last-known backend status.
    pub fn new(
        store: Arc<dyn RosterStore>,
        credential: Credential,
        event_id: Uuid,
        status: LifecycleStatus,
    ) -> Self {
        let phase = if status.is_ended() {
            LifecyclePhase::Ended
        } else {
            LifecyclePhase::Active
        };
        Self {
            store,
            credential,
            event_id,
            phase: Mutex::new(phase),
        }
    }

    /// Current client-side phase.
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock()
    }

    /// Whether the operation has ended.
    pub fn is_ended(&self) -> bool {
        self.phase() == LifecyclePhase::Ended
    }

    /// Whether the end-operation action is currently offered.
    pub fn can_end_operation(&self) -> bool {
        self.phase() == LifecyclePhase::Active
    }

    /// Fold a refreshed backend status into the phase.
    ///
    /// Backend truth wins: an `Ended` status closes the machine even while
    /// a confirmation flow is open. An operation never reverts to active.
    pub fn sync_status(&self, status: LifecycleStatus) {
        if !status.is_ended() {
            return;
        }
        let mut phase = self.phase.lock();
        if *phase != LifecyclePhase::Ended {
            info!(event_id = %self.event_id, "operation ended on the backend");
            *phase = LifecyclePhase::Ended;
        }
    }

    /// Gate for registration, edit-of-head, and decampment writes.
    pub fn ensure_writable(&self) -> Result<(), LifecycleError> {
        if self.is_ended() {
            return Err(LifecycleError::AlreadyEnded);
        }
        Ok(())
    }

    /// Open the end-operation flow.
    ///
    /// `undecamped` and `generation` come from the latest refresh snapshot.
    /// Against an already-ended operation this surfaces the explanation
    /// locally and requests no transition.
    pub fn request_end(
        &self,
        undecamped: u64,
        generation: u64,
        disaster_start: DateTime<Utc>,
    ) -> Result<EndPlan, LifecycleError> {
        let mut phase = self.phase.lock();
        if *phase == LifecyclePhase::Ended {
            return Err(LifecycleError::AlreadyEnded);
        }
        *phase = LifecyclePhase::EndRequested;
        Ok(EndPlan {
            undecamped,
            generation,
            disaster_start,
            default_timestamp: Utc::now(),
        })
    }

    /// Abandon an open end request without side effects.
    pub fn cancel_end(&self) {
        let mut phase = self.phase.lock();
        if *phase == LifecyclePhase::EndRequested {
            *phase = LifecyclePhase::Active;
        }
    }

    /// Confirm the end of the operation.
    ///
    /// With families still present, `chosen` (defaulting to now) is
    /// validated against the disaster start and the current instant at
    /// calendar-day granularity, then a bulk decampment and the end write
    /// are issued at that same instant. With nobody left, the end write
    /// alone is issued at the current instant. The phase moves to `Ended`
    /// only once every write has succeeded; any failure leaves it at
    /// `EndRequested` for retry.
    pub async fn confirm_end(
        &self,
        plan: &EndPlan,
        chosen: Option<DateTime<Utc>>,
        current_generation: u64,
    ) -> Result<EndOutcome, LifecycleError> {
        match self.phase() {
            LifecyclePhase::Ended => return Err(LifecycleError::AlreadyEnded),
            LifecyclePhase::Active => return Err(LifecycleError::NotRequested),
            LifecyclePhase::EndRequested => {}
        }
        if plan.generation != current_generation {
            warn!(
                event_id = %self.event_id,
                plan_generation = plan.generation,
                current_generation,
                "end plan discarded as stale"
            );
            return Err(LifecycleError::StalePlan);
        }

        let now = Utc::now();
        let outcome = if plan.undecamped > 0 {
            let at = chosen.unwrap_or(now);
            check_bounds(
                &as_local(at),
                Some(&as_local(plan.disaster_start)),
                Some(&as_local(now)),
            )?;
            self.store
                .decamp_all(&self.credential, self.event_id, at)
                .await
                .map_err(|source| LifecycleError::Decamp { source })?;
            info!(event_id = %self.event_id, families = plan.undecamped, at = %at, "bulk decampment written");
            self.store
                .end_operation(&self.credential, self.event_id, at)
                .await
                .map_err(|source| LifecycleError::End {
                    decamped: true,
                    source,
                })?;
            EndOutcome {
                ended_at: at,
                bulk_decamped: true,
            }
        } else {
            self.store
                .end_operation(&self.credential, self.event_id, now)
                .await
                .map_err(|source| LifecycleError::End {
                    decamped: false,
                    source,
                })?;
            EndOutcome {
                ended_at: now,
                bulk_decamped: false,
            }
        };

        *self.phase.lock() = LifecyclePhase::Ended;
        info!(event_id = %self.event_id, ended_at = %outcome.ended_at, "operation ended");
        Ok(outcome)
    }
}
