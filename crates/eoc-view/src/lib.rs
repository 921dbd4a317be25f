//! ---
//! eoc_section: "01-core-functionality"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Per-view wiring of sync, queries, and lifecycle."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
//! One live roster view per evacuation-center event: owns the cached
//! snapshot, wires the sync pipeline (subscriber, coalescer, fetcher) to
//! the lifecycle controller, and exposes the query and action surface
//! consumed by screen components.

pub mod actions;
pub mod view;

pub use actions::{RegistrationOutcome, RosterActionError};
pub use view::{RosterView, RosterViewConfig, ViewSnapshot};
