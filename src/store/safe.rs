// src/store/safe.rs

//! Error-trapping adapter over a record store
//!
//! Each operation of [`RecordStore`] is wrapped explicitly: failures are
//! logged and replaced with a sentinel, so a single storage hiccup never
//! aborts a reconciliation pass.

use super::RecordStore;
use crate::db::models::{AppUnit, StoredApp};
use crate::error::Result;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct SafeAppStore {
    inner: Arc<dyn RecordStore>,
}

fn or_sentinel<T>(op: &str, result: Result<T>, sentinel: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("Store operation {} failed: {}", op, e);
            sentinel
        }
    }
}

impl SafeAppStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self { inner }
    }

    /// The wrapped store, for callers that need real errors
    pub fn inner(&self) -> &Arc<dyn RecordStore> {
        &self.inner
    }

    /// Returns false when the write failed
    pub fn upsert(&self, app: &StoredApp) -> bool {
        or_sentinel("upsert", self.inner.upsert(app).map(|_| true), false)
    }

    /// Number of rows written, 0 when the batch failed
    pub fn upsert_many(&self, apps: &[StoredApp]) -> usize {
        if apps.is_empty() {
            return 0;
        }
        or_sentinel("upsert_many", self.inner.upsert_many(apps), 0)
    }

    pub fn get(&self, name: &str) -> Option<StoredApp> {
        or_sentinel("get", self.inner.get(name), None)
    }

    pub fn get_many(&self, names: &[String]) -> Vec<StoredApp> {
        or_sentinel("get_many", self.inner.get_many(names), Vec::new())
    }

    pub fn get_by_unit(&self, unit: Option<AppUnit>) -> Vec<StoredApp> {
        or_sentinel("get_by_unit", self.inner.get_by_unit(unit), Vec::new())
    }

    pub fn update_time(&self, name: &str) -> Option<i64> {
        or_sentinel("update_time", self.inner.update_time(name), None)
    }

    pub fn delete_absent(&self, keep: &[String]) -> usize {
        or_sentinel("delete_absent", self.inner.delete_absent(keep), 0)
    }

    pub fn delete_many(&self, names: &[String]) -> usize {
        if names.is_empty() {
            return 0;
        }
        or_sentinel("delete_many", self.inner.delete_many(names), 0)
    }

    pub fn all(&self) -> Vec<StoredApp> {
        or_sentinel("all", self.inner.all(), Vec::new())
    }

    /// Row count, `None` when the store could not be read
    ///
    /// `Some(0)` means the store is genuinely empty.
    pub fn count(&self) -> Option<u64> {
        or_sentinel("count", self.inner.count().map(Some), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::packages::PackageRecord;
    use crate::store::AppStore;

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn upsert(&self, _: &StoredApp) -> Result<()> {
            Err(Error::StorageFailure("disk full".into()))
        }
        fn upsert_many(&self, _: &[StoredApp]) -> Result<usize> {
            Err(Error::StorageFailure("disk full".into()))
        }
        fn get(&self, _: &str) -> Result<Option<StoredApp>> {
            Err(Error::StorageFailure("io".into()))
        }
        fn get_many(&self, _: &[String]) -> Result<Vec<StoredApp>> {
            Err(Error::StorageFailure("io".into()))
        }
        fn get_by_unit(&self, _: Option<AppUnit>) -> Result<Vec<StoredApp>> {
            Err(Error::StorageFailure("io".into()))
        }
        fn update_time(&self, _: &str) -> Result<Option<i64>> {
            Err(Error::StorageFailure("io".into()))
        }
        fn delete_absent(&self, _: &[String]) -> Result<usize> {
            Err(Error::StorageFailure("io".into()))
        }
        fn delete_many(&self, _: &[String]) -> Result<usize> {
            Err(Error::StorageFailure("io".into()))
        }
        fn count(&self) -> Result<u64> {
            Err(Error::StorageFailure("io".into()))
        }
    }

    #[test]
    fn test_failures_become_sentinels() {
        let safe = SafeAppStore::new(Arc::new(FailingStore));
        let app = StoredApp::derive(&PackageRecord::new("com.a", 1, 1)).unwrap();

        assert!(!safe.upsert(&app));
        assert_eq!(safe.upsert_many(&[app]), 0);
        assert!(safe.get("com.a").is_none());
        assert!(safe.get_many(&["com.a".to_string()]).is_empty());
        assert!(safe.all().is_empty());
        assert_eq!(safe.update_time("com.a"), None);
        assert_eq!(safe.delete_absent(&[]), 0);
        assert_eq!(safe.count(), None);
    }

    #[test]
    fn test_count_distinguishes_empty_from_failure() {
        let safe = SafeAppStore::new(Arc::new(AppStore::open_in_memory().unwrap()));
        assert_eq!(safe.count(), Some(0));
    }
}
