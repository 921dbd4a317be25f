//! ---
//! eoc_section: "04-roster-queries"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster sorting, pagination, and duplicate checks."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use std::cmp::Ordering;

use eoc_store::RosterEntry;
use serde::{Deserialize, Serialize};

/// Sortable roster columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Family-head display name.
    HeadName,
    /// Originating locality.
    Locality,
    /// Total individual count.
    Headcount,
    /// Assigned room name; unassigned rows sort last.
    Room,
    /// Decampment timestamp; still-present rows sort last.
    DecampedAt,
}

/// Direction of the active sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// The single active sort, if any. `None` means insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Advance the sort state for a column header click.
///
/// Reapplying the same key cycles ascending, descending, then back to
/// unsorted; choosing a different key starts it ascending.
pub fn toggle_sort(state: Option<SortState>, key: SortKey) -> Option<SortState> {
    match state {
        Some(current) if current.key == key => match current.direction {
            SortDirection::Ascending => Some(SortState {
                key,
                direction: SortDirection::Descending,
            }),
            SortDirection::Descending => None,
        },
        _ => Some(SortState {
            key,
            direction: SortDirection::Ascending,
        }),
    }
}

/// Produce a sorted copy of the roster.
///
/// The sort is stable, so rows that compare equal keep their insertion
/// order, and applying the same state twice yields the same order. A
/// `None` state returns the rows untouched.
pub fn apply_sort(rows: &[RosterEntry], state: Option<SortState>) -> Vec<RosterEntry> {
    let mut sorted = rows.to_vec();
    let Some(state) = state else {
        return sorted;
    };
    sorted.sort_by(|a, b| compare(a, b, state));
    sorted
}

fn compare(a: &RosterEntry, b: &RosterEntry, state: SortState) -> Ordering {
    match state.key {
        SortKey::HeadName => directed(text_cmp(&a.head_name, &b.head_name), state.direction),
        SortKey::Locality => directed(text_cmp(&a.locality, &b.locality), state.direction),
        SortKey::Headcount => directed(a.headcount.cmp(&b.headcount), state.direction),
        SortKey::Room => nullable_cmp(
            a.room.as_deref(),
            b.room.as_deref(),
            |x, y| text_cmp(x, y),
            state.direction,
        ),
        SortKey::DecampedAt => nullable_cmp(
            a.decamped_at.as_ref(),
            b.decamped_at.as_ref(),
            |x, y| x.cmp(y),
            state.direction,
        ),
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Case-insensitive text comparison.
fn text_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Compare nullable values; absent values sort after all present ones
/// regardless of direction.
fn nullable_cmp<T>(
    a: Option<T>,
    b: Option<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
    direction: SortDirection,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(cmp(&a, &b), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn entry(head: &str, headcount: u32, decamped: Option<&str>) -> RosterEntry {
        RosterEntry {
            family_id: Uuid::new_v4(),
            head_name: head.to_owned(),
            locality: "Central".to_owned(),
            headcount,
            room: None,
            decamped_at: decamped.map(|s| {
                format!("{s}T00:00:00Z")
                    .parse::<DateTime<Utc>>()
                    .expect("valid timestamp")
            }),
        }
    }

    fn decamp_days(rows: &[RosterEntry]) -> Vec<Option<String>> {
        rows.iter()
            .map(|r| r.decamped_at.map(|t| t.format("%Y-%m-%d").to_string()))
            .collect()
    }

    #[test]
    fn toggling_the_same_key_cycles_through_three_states() {
        let s1 = toggle_sort(None, SortKey::HeadName);
        assert_eq!(
            s1,
            Some(SortState {
                key: SortKey::HeadName,
                direction: SortDirection::Ascending
            })
        );
        let s2 = toggle_sort(s1, SortKey::HeadName);
        assert_eq!(
            s2,
            Some(SortState {
                key: SortKey::HeadName,
                direction: SortDirection::Descending
            })
        );
        assert_eq!(toggle_sort(s2, SortKey::HeadName), None);
    }

    #[test]
    fn toggling_a_different_key_resets_to_ascending() {
        let s1 = toggle_sort(None, SortKey::HeadName);
        let s2 = toggle_sort(s1, SortKey::Headcount);
        assert_eq!(
            s2,
            Some(SortState {
                key: SortKey::Headcount,
                direction: SortDirection::Ascending
            })
        );
    }

    #[test]
    fn none_state_preserves_insertion_order() {
        let rows = vec![entry("Charlie", 1, None), entry("Alice", 2, None)];
        let sorted = apply_sort(&rows, None);
        assert_eq!(sorted, rows);
    }

    #[test]
    fn still_present_rows_sort_last_in_both_directions() {
        let rows = vec![
            entry("A", 1, None),
            entry("B", 1, Some("2024-10-05")),
            entry("C", 1, None),
            entry("D", 1, Some("2024-10-01")),
        ];

        let ascending = apply_sort(
            &rows,
            Some(SortState {
                key: SortKey::DecampedAt,
                direction: SortDirection::Ascending,
            }),
        );
        assert_eq!(
            decamp_days(&ascending),
            vec![
                Some("2024-10-01".to_owned()),
                Some("2024-10-05".to_owned()),
                None,
                None
            ]
        );

        let descending = apply_sort(
            &rows,
            Some(SortState {
                key: SortKey::DecampedAt,
                direction: SortDirection::Descending,
            }),
        );
        assert_eq!(
            decamp_days(&descending),
            vec![
                Some("2024-10-05".to_owned()),
                Some("2024-10-01".to_owned()),
                None,
                None
            ]
        );
    }

    #[test]
    fn text_sort_ignores_case() {
        let rows = vec![entry("bravo", 1, None), entry("Alpha", 1, None)];
        let sorted = apply_sort(
            &rows,
            Some(SortState {
                key: SortKey::HeadName,
                direction: SortDirection::Ascending,
            }),
        );
        assert_eq!(sorted[0].head_name, "Alpha");
        assert_eq!(sorted[1].head_name, "bravo");
    }

    #[test]
    fn sorting_is_idempotent_and_stable() {
        let rows = vec![
            entry("Same", 3, None),
            entry("Same", 1, None),
            entry("Same", 2, None),
        ];
        let once = apply_sort(
            &rows,
            Some(SortState {
                key: SortKey::HeadName,
                direction: SortDirection::Ascending,
            }),
        );
        let twice = apply_sort(
            &once,
            Some(SortState {
                key: SortKey::HeadName,
                direction: SortDirection::Ascending,
            }),
        );
        // equal head names keep insertion order through both passes
        assert_eq!(once, rows);
        assert_eq!(twice, once);
    }

    #[test]
    fn numeric_sort_orders_by_value() {
        let rows = vec![entry("A", 5, None), entry("B", 2, None), entry("C", 9, None)];
        let sorted = apply_sort(
            &rows,
            Some(SortState {
                key: SortKey::Headcount,
                direction: SortDirection::Descending,
            }),
        );
        let counts: Vec<u32> = sorted.iter().map(|r| r.headcount).collect();
        assert_eq!(counts, vec![9, 5, 2]);
    }
}
