// src/store/mod.rs

//! Persistent record store
//!
//! [`RecordStore`] is the narrow contract every component uses to read and
//! write stored apps. [`AppStore`] implements it over SQLite with a single
//! writer connection; [`SafeAppStore`] adapts any implementation so that
//! storage failures become logged sentinels instead of errors.

mod app_store;
mod safe;
mod settings;

pub use app_store::AppStore;
pub use safe::SafeAppStore;
pub use settings::SettingsStore;

use crate::db::models::{AppUnit, StoredApp};
use crate::error::{Error, Result};

/// Run a store batch on the blocking pool
///
/// Once started the batch runs to completion even if the awaiting caller
/// is dropped, so a cancelled caller never leaves a batch half-written.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::StorageFailure(format!("store task failed: {e}")))
}

/// Operations over the stored app table
///
/// Every batch operation is atomic: it is either fully applied or not at
/// all.
pub trait RecordStore: Send + Sync {
    /// Insert or fully replace one app
    fn upsert(&self, app: &StoredApp) -> Result<()>;

    /// Insert or fully replace several apps in one transaction
    fn upsert_many(&self, apps: &[StoredApp]) -> Result<usize>;

    fn get(&self, name: &str) -> Result<Option<StoredApp>>;

    /// Look up several apps, preserving caller order and omitting misses
    fn get_many(&self, names: &[String]) -> Result<Vec<StoredApp>>;

    /// Apps of one unit, or every app for `None`
    fn get_by_unit(&self, unit: Option<AppUnit>) -> Result<Vec<StoredApp>>;

    /// Stored update time of one app
    fn update_time(&self, name: &str) -> Result<Option<i64>>;

    /// Delete every app whose identifier is not in `keep`
    fn delete_absent(&self, keep: &[String]) -> Result<usize>;

    /// Delete the named apps
    fn delete_many(&self, names: &[String]) -> Result<usize>;

    fn count(&self) -> Result<u64>;

    fn all(&self) -> Result<Vec<StoredApp>> {
        self.get_by_unit(None)
    }
}
