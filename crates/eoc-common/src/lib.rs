//! ---
//! eoc_section: "01-core-functionality"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Shared primitives and utilities for the console core."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
//! Shared primitives for the EOC roster-sync workspace.
//! This crate exposes configuration loading, logging bootstrap, and the
//! calendar-day temporal validation used across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{ApiConfig, AppConfig, CenterConfig, LoggingConfig, RosterConfig, SyncConfig};
pub use logging::{init_tracing, LogFormat};
pub use time::{check_bounds, BoundKind, BoundsViolation};
