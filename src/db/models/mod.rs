// src/db/models/mod.rs

//! Data models for pkgwatch database entities
//!
//! Each struct corresponds to a table and carries the queries that read
//! and write it.

mod app;
mod diff_change;
pub mod setting;

pub use app::{AppUnit, IconInfo, StoredApp};
pub use diff_change::{DiffChange, DiffType};
pub use setting::Setting;
