//! ---
//! eoc_section: "04-roster-queries"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster sorting, pagination, and duplicate checks."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use eoc_store::{PersonIdentity, PersonMatch};
use uuid::Uuid;

/// Identity-disambiguation policy for duplicate checks.
///
/// The backend returns name matches; this policy decides which of them
/// count as the same physical person. Matching too narrowly risks double
/// registration, matching too broadly blocks people who merely share a
/// common name, so the birth-date requirement is configurable rather than
/// hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    /// Require a birth date on both sides before a name match counts.
    pub require_birth_date: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            require_birth_date: true,
        }
    }
}

impl MatchPolicy {
    /// Whether an existing registration matches the candidate identity.
    pub fn matches(&self, candidate: &PersonIdentity, row: &PersonMatch) -> bool {
        if normalize_name(&candidate.full_name) != normalize_name(&row.full_name) {
            return false;
        }
        match (candidate.birth_date, row.birth_date) {
            // birth dates always decide when both are on record
            (Some(a), Some(b)) => a == b,
            // missing data matches only under the relaxed policy
            _ => !self.require_birth_date,
        }
    }
}

/// Collapse whitespace and case so that transcription differences do not
/// defeat the duplicate check.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Classification of a prospective registrant against existing rosters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateCandidate {
    /// No active match anywhere; registration proceeds without a dialog.
    NoConflict,
    /// An active match exists in the target center's current event.
    ActiveInSameCenter,
    /// An active match exists in another center of the same disaster.
    ActiveInOtherCenter {
        /// Where the person is presumed to be present.
        center_name: String,
    },
}

impl DuplicateCandidate {
    /// Whether the operator may proceed via an explicit manual override.
    pub fn allows_override(&self) -> bool {
        matches!(self, DuplicateCandidate::ActiveInSameCenter)
    }

    /// Whether registration is blocked outright.
    pub fn blocks_registration(&self) -> bool {
        matches!(self, DuplicateCandidate::ActiveInOtherCenter { .. })
    }
}

/// Classify a candidate against the match rows for its disaster.
///
/// Decamped matches never conflict. When active matches exist both in the
/// target event and elsewhere, the cross-center case wins: the person being
/// presumed physically present at another center must be resolved before a
/// local override is offered.
pub fn classify(
    policy: &MatchPolicy,
    candidate: &PersonIdentity,
    current_event: Uuid,
    matches: &[PersonMatch],
) -> DuplicateCandidate {
    let mut same_center = false;
    for row in matches {
        if row.decamped || !policy.matches(candidate, row) {
            continue;
        }
        if row.event_id == current_event {
            same_center = true;
        } else {
            return DuplicateCandidate::ActiveInOtherCenter {
                center_name: row.center_name.clone(),
            };
        }
    }
    if same_center {
        DuplicateCandidate::ActiveInSameCenter
    } else {
        DuplicateCandidate::NoConflict
    }
}

/// Recovery actions a duplicate dialog can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Abandon the registration attempt.
    Cancel,
    /// Register anyway; the operator affirms this is a distinct person
    /// with a coincidentally identical name.
    ManualRegister,
    /// Dismiss the blocking dialog.
    Close,
    /// Jump to the matched record at the other center.
    NavigateToCenter,
}

/// Which dialog a conflict maps to, decoupled from rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateDialog {
    /// Non-blocking warning for a same-center match.
    SameCenter,
    /// Blocking notice for a cross-center match.
    OtherCenter {
        /// Center named in the notice.
        center_name: String,
    },
}

impl DuplicateDialog {
    /// The recovery actions this dialog offers.
    pub fn actions(&self) -> &'static [RecoveryAction] {
        match self {
            DuplicateDialog::SameCenter => {
                &[RecoveryAction::Cancel, RecoveryAction::ManualRegister]
            }
            DuplicateDialog::OtherCenter { .. } => {
                &[RecoveryAction::Close, RecoveryAction::NavigateToCenter]
            }
        }
    }

    /// Whether the dialog blocks the registration outright.
    pub fn is_blocking(&self) -> bool {
        matches!(self, DuplicateDialog::OtherCenter { .. })
    }
}

/// Map a classification to the dialog it surfaces, if any.
pub fn select_dialog(check: &DuplicateCandidate) -> Option<DuplicateDialog> {
    match check {
        DuplicateCandidate::NoConflict => None,
        DuplicateCandidate::ActiveInSameCenter => Some(DuplicateDialog::SameCenter),
        DuplicateCandidate::ActiveInOtherCenter { center_name } => {
            Some(DuplicateDialog::OtherCenter {
                center_name: center_name.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn birth(s: &str) -> Option<NaiveDate> {
        Some(s.parse().expect("valid date"))
    }

    fn candidate(name: &str, birth_date: Option<NaiveDate>) -> PersonIdentity {
        PersonIdentity {
            full_name: name.to_owned(),
            birth_date,
        }
    }

    fn row(
        name: &str,
        birth_date: Option<NaiveDate>,
        event_id: Uuid,
        center: &str,
        decamped: bool,
    ) -> PersonMatch {
        PersonMatch {
            person_id: Uuid::new_v4(),
            full_name: name.to_owned(),
            birth_date,
            event_id,
            center_name: center.to_owned(),
            decamped,
        }
    }

    #[test]
    fn same_center_match_permits_override() {
        let event = Uuid::new_v4();
        let check = classify(
            &MatchPolicy::default(),
            &candidate("Sato Hanako", birth("1961-04-12")),
            event,
            &[row(
                "sato  hanako",
                birth("1961-04-12"),
                event,
                "Riverside Gym",
                false,
            )],
        );
        assert_eq!(check, DuplicateCandidate::ActiveInSameCenter);
        assert!(check.allows_override());
        let dialog = select_dialog(&check).expect("dialog selected");
        assert!(!dialog.is_blocking());
        assert!(dialog.actions().contains(&RecoveryAction::ManualRegister));
    }

    #[test]
    fn other_center_match_blocks_without_override() {
        let event = Uuid::new_v4();
        let check = classify(
            &MatchPolicy::default(),
            &candidate("Sato Hanako", birth("1961-04-12")),
            event,
            &[row(
                "Sato Hanako",
                birth("1961-04-12"),
                Uuid::new_v4(),
                "Hilltop Hall",
                false,
            )],
        );
        assert_eq!(
            check,
            DuplicateCandidate::ActiveInOtherCenter {
                center_name: "Hilltop Hall".to_owned()
            }
        );
        assert!(!check.allows_override());
        assert!(check.blocks_registration());
        let dialog = select_dialog(&check).expect("dialog selected");
        assert!(dialog.is_blocking());
        assert_eq!(
            dialog.actions(),
            &[RecoveryAction::Close, RecoveryAction::NavigateToCenter]
        );
    }

    #[test]
    fn cross_center_match_wins_over_same_center() {
        let event = Uuid::new_v4();
        let check = classify(
            &MatchPolicy::default(),
            &candidate("Sato Hanako", birth("1961-04-12")),
            event,
            &[
                row(
                    "Sato Hanako",
                    birth("1961-04-12"),
                    event,
                    "Riverside Gym",
                    false,
                ),
                row(
                    "Sato Hanako",
                    birth("1961-04-12"),
                    Uuid::new_v4(),
                    "Hilltop Hall",
                    false,
                ),
            ],
        );
        assert!(check.blocks_registration());
    }

    #[test]
    fn decamped_matches_do_not_conflict() {
        let event = Uuid::new_v4();
        let check = classify(
            &MatchPolicy::default(),
            &candidate("Sato Hanako", birth("1961-04-12")),
            event,
            &[
                row(
                    "Sato Hanako",
                    birth("1961-04-12"),
                    event,
                    "Riverside Gym",
                    true,
                ),
                row(
                    "Sato Hanako",
                    birth("1961-04-12"),
                    Uuid::new_v4(),
                    "Hilltop Hall",
                    true,
                ),
            ],
        );
        assert_eq!(check, DuplicateCandidate::NoConflict);
        assert!(select_dialog(&check).is_none());
    }

    #[test]
    fn differing_birth_dates_never_match() {
        let event = Uuid::new_v4();
        let relaxed = MatchPolicy {
            require_birth_date: false,
        };
        let check = classify(
            &relaxed,
            &candidate("Sato Hanako", birth("1961-04-12")),
            event,
            &[row(
                "Sato Hanako",
                birth("1973-09-02"),
                event,
                "Riverside Gym",
                false,
            )],
        );
        assert_eq!(check, DuplicateCandidate::NoConflict);
    }

    #[test]
    fn missing_birth_date_matches_only_under_the_relaxed_policy() {
        let event = Uuid::new_v4();
        let rows = [row("Sato Hanako", None, event, "Riverside Gym", false)];
        let strict = classify(
            &MatchPolicy::default(),
            &candidate("Sato Hanako", birth("1961-04-12")),
            event,
            &rows,
        );
        assert_eq!(strict, DuplicateCandidate::NoConflict);

        let relaxed = classify(
            &MatchPolicy {
                require_birth_date: false,
            },
            &candidate("Sato Hanako", birth("1961-04-12")),
            event,
            &rows,
        );
        assert_eq!(relaxed, DuplicateCandidate::ActiveInSameCenter);
    }
}
