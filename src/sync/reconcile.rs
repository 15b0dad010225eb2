// src/sync/reconcile.rs

//! Reconciliation of a fresh inventory against the record store
//!
//! `update` is a right-biased merge: a stored row is replaced wholesale by
//! a fresh record, and only when the fresh record is strictly newer.
//! `check_removal` purges rows whose identifiers are absent from a full
//! enumeration. Callers run `update` to completion before `check_removal`.

use crate::db::models::StoredApp;
use crate::error::Result;
use crate::packages::PackageRecord;
use crate::store::SafeAppStore;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Anything that can be reconciled into the store
pub trait Reconcilable {
    fn identifier(&self) -> &str;

    /// Last update time in epoch milliseconds
    fn update_time(&self) -> i64;

    /// Full row to persist
    fn derive(&self) -> Result<StoredApp>;
}

impl Reconcilable for PackageRecord {
    fn identifier(&self) -> &str {
        &self.package_name
    }

    fn update_time(&self) -> i64 {
        self.last_update_time
    }

    fn derive(&self) -> Result<StoredApp> {
        StoredApp::derive(self)
    }
}

impl Reconcilable for StoredApp {
    fn identifier(&self) -> &str {
        &self.package_name
    }

    fn update_time(&self) -> i64 {
        self.update_time
    }

    fn derive(&self) -> Result<StoredApp> {
        Ok(self.clone())
    }
}

/// Outcome of one `update` call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    pub upserted: usize,
    /// Records not strictly newer than their stored row
    pub unchanged: usize,
    /// Records that could not be derived
    pub corrupt: usize,
    /// Whether the store was empty (or unreadable) before the update
    pub bootstrap: bool,
    /// The batch write failed and nothing was persisted
    pub write_failed: bool,
}

impl UpdateSummary {
    pub fn succeeded(&self) -> bool {
        !self.write_failed
    }
}

#[derive(Clone)]
pub struct Reconciler {
    store: SafeAppStore,
}

impl Reconciler {
    pub fn new(store: SafeAppStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SafeAppStore {
        &self.store
    }

    fn store_is_empty(&self) -> bool {
        matches!(self.store.count(), None | Some(0))
    }

    /// Insert unseen records and replace stored rows with newer records
    pub fn update<R: Reconcilable>(&self, fresh: &[R]) -> UpdateSummary {
        let mut summary = UpdateSummary {
            bootstrap: self.store_is_empty(),
            ..Default::default()
        };

        let stored_times: HashMap<String, i64> = if summary.bootstrap {
            HashMap::new()
        } else {
            let names: Vec<String> = fresh.iter().map(|r| r.identifier().to_string()).collect();
            self.store
                .get_many(&names)
                .into_iter()
                .map(|app| (app.package_name, app.update_time))
                .collect()
        };

        let mut apps = Vec::new();
        for record in fresh {
            // Rows not stored yet are always written
            if let Some(&stored) = stored_times.get(record.identifier())
                && record.update_time() <= stored
            {
                summary.unchanged += 1;
                continue;
            }

            match record.derive() {
                Ok(app) => apps.push(app),
                Err(e) => {
                    warn!("Skipping record during update: {}", e);
                    summary.corrupt += 1;
                }
            }
        }

        if apps.is_empty() {
            debug!("Nothing to update ({} unchanged)", summary.unchanged);
            return summary;
        }

        summary.upserted = self.store.upsert_many(&apps);
        summary.write_failed = summary.upserted == 0;
        if summary.bootstrap {
            info!("Bootstrapped store with {} apps", summary.upserted);
        } else {
            debug!(
                "Updated {} apps, {} unchanged",
                summary.upserted, summary.unchanged
            );
        }
        summary
    }

    /// Delete stored rows absent from a full enumeration
    ///
    /// Returns the number of deleted rows.
    pub fn check_removal<R: Reconcilable>(&self, fresh: &[R]) -> usize {
        if self.store_is_empty() {
            return 0;
        }

        let keep: Vec<String> = fresh.iter().map(|r| r.identifier().to_string()).collect();
        let removed = self.store.delete_absent(&keep);
        if removed > 0 {
            info!("Removed {} uninstalled apps", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AppStore;
    use std::sync::Arc;

    fn reconciler() -> Reconciler {
        Reconciler::new(SafeAppStore::new(Arc::new(AppStore::open_in_memory().unwrap())))
    }

    #[test]
    fn test_bootstrap_inserts_everything() {
        let rec = reconciler();
        let fresh = vec![
            PackageRecord::new("com.a", 1, 0),
            PackageRecord::new("com.b", 1, 2),
            PackageRecord::new("com.c", 1, 5),
        ];

        let summary = rec.update(&fresh);
        assert!(summary.bootstrap);
        assert_eq!(summary.upserted, 3);
        assert_eq!(rec.store().count(), Some(3));
    }

    #[test]
    fn test_update_is_idempotent() {
        let rec = reconciler();
        let fresh = vec![PackageRecord::new("com.a", 1, 100), PackageRecord::new("com.b", 1, 100)];

        rec.update(&fresh);
        let second = rec.update(&fresh);
        assert_eq!(second.upserted, 0);
        assert_eq!(second.unchanged, 2);
        assert!(second.succeeded());
    }

    #[test]
    fn test_only_strictly_newer_replaces() {
        let rec = reconciler();
        rec.update(&[PackageRecord::new("com.a", 1, 100)]);

        // Same time, different code: skipped
        rec.update(&[PackageRecord::new("com.a", 5, 100)]);
        assert_eq!(rec.store().get("com.a").unwrap().ver_code, 1);

        rec.update(&[PackageRecord::new("com.a", 2, 101)]);
        assert_eq!(rec.store().get("com.a").unwrap().ver_code, 2);
    }

    #[test]
    fn test_unstored_row_written_regardless_of_time() {
        let rec = reconciler();
        rec.update(&[PackageRecord::new("com.seed", 1, 100)]);

        let summary = rec.update(&[PackageRecord::new("com.timeless", 1, 0)]);
        assert!(!summary.bootstrap);
        assert_eq!(summary.upserted, 1);
        assert!(rec.store().get("com.timeless").is_some());
    }

    #[test]
    fn test_corrupt_record_does_not_abort_batch() {
        let rec = reconciler();
        rec.update(&[PackageRecord::new("com.seed", 1, 1)]);

        let summary = rec.update(&[
            PackageRecord::new("bad/name", 1, 10),
            PackageRecord::new("com.ok", 1, 10),
        ]);
        assert_eq!(summary.corrupt, 1);
        assert_eq!(summary.upserted, 1);
        assert!(rec.store().get("com.ok").is_some());
    }

    #[test]
    fn test_check_removal() {
        let rec = reconciler();
        assert_eq!(rec.check_removal(&[PackageRecord::new("com.a", 1, 1)]), 0);

        rec.update(&[PackageRecord::new("com.a", 1, 1), PackageRecord::new("com.b", 1, 1)]);
        let removed = rec.check_removal(&[PackageRecord::new("com.b", 1, 1)]);
        assert_eq!(removed, 1);
        assert!(rec.store().get("com.a").is_none());
        assert!(rec.store().get("com.b").is_some());
    }
}
