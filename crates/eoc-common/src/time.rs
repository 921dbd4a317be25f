//! ---
//! eoc_section: "01-core-functionality"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Shared primitives and utilities for the console core."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Which side of the permitted range a candidate fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// The candidate's day precedes the earliest permitted day.
    BeforeMin,
    /// The candidate's day follows the latest permitted day.
    AfterMax,
}

impl BoundKind {
    /// Operator-facing phrasing used in validation messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundKind::BeforeMin => "before the earliest permitted day",
            BoundKind::AfterMax => "after the latest permitted day",
        }
    }
}

impl std::fmt::Display for BoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation reported by [`check_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("chosen day {candidate} is {kind} ({bound})")]
pub struct BoundsViolation {
    /// Whether the minimum or maximum bound was violated.
    pub kind: BoundKind,
    /// The candidate's calendar day.
    pub candidate: NaiveDate,
    /// The calendar day of the violated bound.
    pub bound: NaiveDate,
}

/// Validate a timestamp against an optional inclusive date range.
///
/// Comparison happens at calendar-day granularity in the timezone the
/// instants are expressed in; time-of-day is ignored even though the
/// candidate carries it for storage. Both bounds are optional and checked
/// independently, the minimum first, and only one violation is reported.
pub fn check_bounds<Tz: TimeZone>(
    candidate: &DateTime<Tz>,
    min: Option<&DateTime<Tz>>,
    max: Option<&DateTime<Tz>>,
) -> Result<(), BoundsViolation> {
    let day = candidate.date_naive();
    if let Some(min) = min {
        let floor = min.date_naive();
        if day < floor {
            return Err(BoundsViolation {
                kind: BoundKind::BeforeMin,
                candidate: day,
                bound: floor,
            });
        }
    }
    if let Some(max) = max {
        let ceiling = max.date_naive();
        if day > ceiling {
            return Err(BoundsViolation {
                kind: BoundKind::AfterMax,
                candidate: day,
                bound: ceiling,
            });
        }
    }
    Ok(())
}

/// Reinterpret a stored UTC instant in the operator's local timezone.
///
/// Stored timestamps are UTC; bound checks compare the local calendar day
/// the operator sees.
pub fn as_local(instant: DateTime<Utc>) -> DateTime<Local> {
    instant.with_timezone(&Local)
}
