// src/sync/mod.rs

//! Reconciliation engine
//!
//! Merges fresh inventories into the record store and runs the periodic
//! maintenance pass.

pub mod diff;
pub mod maintenance;
pub mod reconcile;

pub use diff::{AppDiff, ColumnChange, apply_diff, detect_diff, record_diff, should_diff};
pub use maintenance::{MaintenanceReport, Maintainer};
pub use reconcile::{Reconcilable, Reconciler, UpdateSummary};
