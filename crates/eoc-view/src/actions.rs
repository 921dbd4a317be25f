//! ---
//! eoc_section: "01-core-functionality"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Per-view wiring of sync, queries, and lifecycle."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use eoc_common::time::{as_local, check_bounds, BoundsViolation};
use eoc_lifecycle::{EndOutcome, EndPlan, LifecycleError};
use eoc_roster::{classify, DuplicateCandidate, DuplicateDialog};
use eoc_store::{NewEvacuee, StoreError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::view::RosterView;

/// Failures of operator actions against the roster.
///
/// Validation failures block submission with a specific reason and leave
/// all state unchanged; store failures are retryable and surfaced verbatim.
#[derive(Debug, thiserror::Error)]
pub enum RosterActionError {
    /// The operation has already ended; rejected locally.
    #[error("the operation has already ended")]
    OperationEnded,
    /// A required input was empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    /// The chosen decampment timestamp fell outside the permitted range.
    #[error("invalid decampment timestamp: {0}")]
    InvalidTimestamp(#[from] BoundsViolation),
    /// The backend call failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a registration attempt produced.
///
/// Duplicate conflicts are normal outcomes, not errors: they carry the
/// dialog the modal layer should render and the recovery actions it
/// offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// No conflict; the registration was submitted.
    Registered {
        /// Person id assigned by the backend.
        person_id: Uuid,
    },
    /// An active match exists in this center; the operator may cancel or
    /// proceed via the explicit manual-register override.
    NeedsConfirmation {
        /// The non-blocking warning dialog to render.
        dialog: DuplicateDialog,
    },
    /// An active match exists at another center; registration is refused
    /// with no override.
    Blocked {
        /// The blocking dialog to render.
        dialog: DuplicateDialog,
    },
}

impl RosterView {
    /// Attempt to register an evacuee.
    ///
    /// The roster is refreshed first so the duplicate check runs against
    /// current data, then the candidate is classified against active
    /// registrations across the disaster. `manual_override` is the
    /// explicit same-center override from the warning dialog; it never
    /// bypasses a cross-center block.
    pub async fn register_evacuee(
        &self,
        evacuee: NewEvacuee,
        manual_override: bool,
    ) -> Result<RegistrationOutcome, RosterActionError> {
        if evacuee.full_name.trim().is_empty() {
            return Err(RosterActionError::EmptyField("registrant name"));
        }
        self.ensure_writable()?;

        self.refresh().await?;
        let identity = evacuee.identity();
        let disaster_id = self.ctx.snapshot.read().event.disaster_id;
        let matches = self
            .ctx
            .store
            .search_person_matches(&self.ctx.credential, disaster_id, &identity)
            .await?;
        let check = classify(
            &self.config.match_policy,
            &identity,
            self.ctx.event_id,
            &matches,
        );

        match check {
            DuplicateCandidate::ActiveInOtherCenter { center_name } => {
                warn!(registrant = %identity.full_name, center = %center_name, "registration blocked; active at another center");
                Ok(RegistrationOutcome::Blocked {
                    dialog: DuplicateDialog::OtherCenter { center_name },
                })
            }
            DuplicateCandidate::ActiveInSameCenter if !manual_override => {
                Ok(RegistrationOutcome::NeedsConfirmation {
                    dialog: DuplicateDialog::SameCenter,
                })
            }
            _ => {
                let person_id = self
                    .ctx
                    .store
                    .submit_evacuee(&self.ctx.credential, self.ctx.event_id, evacuee)
                    .await?;
                info!(%person_id, manual_override, "evacuee registered");
                Ok(RegistrationOutcome::Registered { person_id })
            }
        }
    }

    /// Rename the head of a family.
    pub async fn edit_family_head(
        &self,
        family_id: Uuid,
        head_name: &str,
    ) -> Result<(), RosterActionError> {
        if head_name.trim().is_empty() {
            return Err(RosterActionError::EmptyField("family-head name"));
        }
        self.ensure_writable()?;
        self.ctx
            .store
            .edit_family_head(&self.ctx.credential, self.ctx.event_id, family_id, head_name)
            .await?;
        Ok(())
    }

    /// Mark one family as decamped at the given instant.
    ///
    /// The instant must fall between the disaster start and now, compared
    /// at calendar-day granularity.
    pub async fn decamp_family(
        &self,
        family_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RosterActionError> {
        self.ensure_writable()?;
        let disaster_start = self.ctx.snapshot.read().event.disaster_start;
        let now = Utc::now();
        check_bounds(
            &as_local(at),
            Some(&as_local(disaster_start)),
            Some(&as_local(now)),
        )?;
        self.ctx
            .store
            .decamp_family(&self.ctx.credential, self.ctx.event_id, family_id, at)
            .await?;
        Ok(())
    }

    /// Open the end-operation flow against the latest snapshot.
    pub fn request_end(&self) -> Result<EndPlan, LifecycleError> {
        let (undecamped, generation, disaster_start) = {
            let snapshot = self.ctx.snapshot.read();
            (
                snapshot.undecamped,
                snapshot.generation,
                snapshot.event.disaster_start,
            )
        };
        self.ctx
            .lifecycle
            .request_end(undecamped, generation, disaster_start)
    }

    /// Abandon an open end request.
    pub fn cancel_end(&self) {
        self.ctx.lifecycle.cancel_end();
    }

    /// Confirm the end of the operation.
    ///
    /// On the terminal-ambiguous partial failure (decampment applied, end
    /// write failed) a refresh is forced so gating state is re-derived
    /// from the store rather than from local success flags.
    pub async fn confirm_end(
        &self,
        plan: &EndPlan,
        chosen: Option<DateTime<Utc>>,
    ) -> Result<EndOutcome, LifecycleError> {
        let current_generation = self.ctx.snapshot.read().generation;
        let result = self
            .ctx
            .lifecycle
            .confirm_end(plan, chosen, current_generation)
            .await;
        if let Err(err) = &result {
            if err.requires_refresh() {
                warn!("end flow failed after decampment; forcing a refresh");
                if let Err(refresh_err) = self.refresh().await {
                    warn!(error = %refresh_err, "forced refresh failed");
                }
            }
        }
        result
    }

    fn ensure_writable(&self) -> Result<(), RosterActionError> {
        self.ctx
            .lifecycle
            .ensure_writable()
            .map_err(|_| RosterActionError::OperationEnded)
    }
}
