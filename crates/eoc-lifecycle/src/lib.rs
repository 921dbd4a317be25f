//! ---
//! eoc_section: "05-operation-lifecycle"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Operation lifecycle state machine and end flow."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
//! The state machine governing an evacuation operation's transition from
//! active to ended, including the bulk-decampment sub-flow.

pub mod controller;

pub use controller::{
    EndOutcome, EndPlan, LifecycleController, LifecycleError, LifecyclePhase,
};
