// src/store/app_store.rs

//! SQLite-backed record store

use super::RecordStore;
use crate::db;
use crate::db::models::{AppUnit, DiffChange, Setting, StoredApp, setting};
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Record store over one SQLite connection
///
/// The connection sits behind a mutex, so all writes are serialized and a
/// multi-statement batch is never interleaved with another caller.
pub struct AppStore {
    conn: Mutex<Connection>,
}

impl AppStore {
    /// Open (and migrate) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        db::init(path.as_ref())?;
        let conn = db::open(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::StorageFailure("store connection lock poisoned".to_string()))
    }

    /// Run `f` with the connection held
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        f(&mut conn)
    }

    /// Persist the rows of one diff pass and its timestamp atomically
    ///
    /// Marker rows older than `purge_before` are removed first.
    pub fn record_diff(
        &self,
        changes: &mut [DiffChange],
        purge_before: i64,
        diff_time: i64,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            db::transaction(conn, |tx| {
                let purged = DiffChange::delete_empty_before(tx, purge_before)?;
                if purged > 0 {
                    debug!("Purged {} empty diff records", purged);
                }
                for change in changes.iter_mut() {
                    change.insert(tx)?;
                }
                Setting::set(tx, setting::PACKAGE_CHANGED_DIFF_TIME, diff_time)?;
                Ok(changes.len())
            })
        })
    }

    /// Delete `removed` and upsert `replaced` in one transaction
    pub fn apply_changes(&self, removed: &[String], replaced: &[StoredApp]) -> Result<(usize, usize)> {
        self.with_conn(|conn| {
            db::transaction(conn, |tx| {
                let mut deleted = 0;
                for name in removed {
                    if StoredApp::delete(tx, name)? {
                        deleted += 1;
                    }
                }
                for app in replaced {
                    app.upsert(tx)?;
                }
                Ok((deleted, replaced.len()))
            })
        })
    }
}

impl RecordStore for AppStore {
    fn upsert(&self, app: &StoredApp) -> Result<()> {
        self.with_conn(|conn| app.upsert(conn))
    }

    fn upsert_many(&self, apps: &[StoredApp]) -> Result<usize> {
        self.with_conn(|conn| {
            db::transaction(conn, |tx| {
                for app in apps {
                    app.upsert(tx)?;
                }
                Ok(apps.len())
            })
        })
    }

    fn get(&self, name: &str) -> Result<Option<StoredApp>> {
        self.with_conn(|conn| StoredApp::find_by_name(conn, name))
    }

    fn get_many(&self, names: &[String]) -> Result<Vec<StoredApp>> {
        self.with_conn(|conn| StoredApp::find_many(conn, names))
    }

    fn get_by_unit(&self, unit: Option<AppUnit>) -> Result<Vec<StoredApp>> {
        self.with_conn(|conn| match unit {
            Some(unit) => StoredApp::find_by_unit(conn, unit),
            None => StoredApp::list_all(conn),
        })
    }

    fn update_time(&self, name: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| StoredApp::update_time_of(conn, name))
    }

    fn delete_absent(&self, keep: &[String]) -> Result<usize> {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        self.with_conn(|conn| {
            db::transaction(conn, |tx| {
                let deleted = StoredApp::delete_absent(tx, &keep)?;
                for name in &deleted {
                    debug!("Removed stored app {}", name);
                }
                Ok(deleted.len())
            })
        })
    }

    fn delete_many(&self, names: &[String]) -> Result<usize> {
        self.with_conn(|conn| {
            db::transaction(conn, |tx| {
                let mut deleted = 0;
                for name in names {
                    if StoredApp::delete(tx, name)? {
                        deleted += 1;
                    }
                }
                Ok(deleted)
            })
        })
    }

    fn count(&self) -> Result<u64> {
        self.with_conn(|conn| StoredApp::count(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DiffType;
    use crate::packages::PackageRecord;

    fn app(name: &str, code: i64, time: i64) -> StoredApp {
        StoredApp::derive(&PackageRecord::new(name, code, time)).unwrap()
    }

    #[test]
    fn test_upsert_many_and_count() {
        let store = AppStore::open_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);

        let n = store
            .upsert_many(&[app("com.a", 1, 100), app("com.b", 1, 150)])
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.update_time("com.b").unwrap(), Some(150));
        assert_eq!(store.update_time("com.zzz").unwrap(), None);
    }

    #[test]
    fn test_delete_absent_keeps_intersection() {
        let store = AppStore::open_in_memory().unwrap();
        store
            .upsert_many(&[app("com.a", 1, 1), app("com.b", 1, 1), app("com.c", 1, 1)])
            .unwrap();

        let deleted = store
            .delete_absent(&["com.b".to_string(), "com.new".to_string()])
            .unwrap();
        assert_eq!(deleted, 2);

        let names: Vec<String> = store.all().unwrap().into_iter().map(|a| a.package_name).collect();
        assert_eq!(names, vec!["com.b"]);
    }

    #[test]
    fn test_record_diff_writes_time() {
        let store = AppStore::open_in_memory().unwrap();
        let mut changes = vec![DiffChange::new("d", 10, "", DiffType::None)];
        store.record_diff(&mut changes, 0, 10).unwrap();

        let time = store
            .with_conn(|conn| Setting::get(conn, setting::PACKAGE_CHANGED_DIFF_TIME))
            .unwrap();
        assert_eq!(time, Some(10));
        assert!(changes[0].id.is_some());
    }

    #[test]
    fn test_open_file_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("apps.db");

        {
            let store = AppStore::open(&path).unwrap();
            store.upsert(&app("com.a", 3, 30)).unwrap();
        }

        let store = AppStore::open(&path).unwrap();
        assert_eq!(store.get("com.a").unwrap().map(|a| a.ver_code), Some(3));
    }
}
