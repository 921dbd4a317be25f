//! ---
//! eoc_section: "04-roster-queries"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster sorting, pagination, and duplicate checks."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
//! Stateless roster query logic: the tri-state sort engine, pagination
//! slicing, and the duplicate-registration classifier with its dialog
//! selection.

pub mod duplicate;
pub mod page;
pub mod sort;

pub use duplicate::{
    classify, normalize_name, select_dialog, DuplicateCandidate, DuplicateDialog, MatchPolicy,
    RecoveryAction,
};
pub use page::{page_slice, Page};
pub use sort::{apply_sort, toggle_sort, SortDirection, SortKey, SortState};
