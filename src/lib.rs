// src/lib.rs

//! pkgwatch - installed-package inventory sync
//!
//! Enumerates installed packages from the host platform, keeps a durable
//! snapshot of their metadata in SQLite, reconciles fresh enumerations
//! against it and classifies what changed since the last observation.
//!
//! # Architecture
//!
//! - Sources: platform registry, shell listing and stored snapshot, all
//!   behind [`packages::InventorySource`]
//! - Cache: one shared inventory, served while younger than a freshness window
//! - Store: SQLite `app` table with upsert/delete batches in transactions
//! - Sync: reconciliation, removal checks and sampled diff records
//! - Updates: session watermarks and change classification
//! - Loader: launchable apps first, then every tier in two batches

pub mod clock;
pub mod config;
pub mod db;
mod error;
pub mod loader;
pub mod packages;
pub mod platform;
pub mod store;
pub mod sync;
pub mod updates;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use loader::{StageBatch, StagedLoader};
pub use packages::{InventorySource, PackageRecord};
pub use store::{AppStore, SafeAppStore};
pub use updates::{UpdateCategory, UpdatesChecker};
