// src/sync/diff.rs

//! Maintained-data diff
//!
//! Reconciliation trusts update times. Now and then a full comparison of
//! fresh data against stored rows is made to catch changes that did not
//! move the update time; the differences are recorded and then applied.

use crate::db::models::{DiffChange, DiffType, StoredApp};
use crate::error::Result;
use crate::store::AppStore;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// No diff within this many days of the previous one
pub const MIN_DIFF_INTERVAL_DAYS: i64 = 3;
/// Always diff after this many days
pub const MAX_DIFF_INTERVAL_DAYS: i64 = 7;

/// Columns compared by a diff pass
pub const DIFF_COLUMNS: [&str; 6] = [
    "target_api",
    "min_api",
    "ver_code",
    "ver_name",
    "update_time",
    "apk_paths",
];

/// Decide whether a diff pass is due
///
/// Between the minimum and maximum interval a pass runs with a one in ten
/// chance, spreading the cost over several maintenance runs.
pub fn should_diff<R: Rng>(now: i64, last_diff: Option<i64>, rng: &mut R) -> bool {
    let Some(last) = last_diff.filter(|t| *t > 0) else {
        return true;
    };
    let elapsed = now - last;
    if elapsed < MIN_DIFF_INTERVAL_DAYS * DAY_MS {
        return false;
    }
    if elapsed >= MAX_DIFF_INTERVAL_DAYS * DAY_MS {
        return true;
    }
    rng.gen_range(0..10) == 0
}

/// One differing column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChange {
    pub column: &'static str,
    pub old_value: String,
    pub new_value: String,
}

/// Differences between fresh rows and stored rows
#[derive(Debug, Clone, Default)]
pub struct AppDiff {
    pub added: Vec<StoredApp>,
    pub removed: Vec<String>,
    /// Fresh row with the columns that differ from the stored one
    pub changed: Vec<(StoredApp, Vec<ColumnChange>)>,
}

impl AppDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Rows to record for this diff, or a single marker row when empty
    pub fn to_changes(&self, diff_id: &str, diff_time: i64) -> Vec<DiffChange> {
        if self.is_empty() {
            return vec![DiffChange::new(diff_id, diff_time, "", DiffType::None)];
        }

        let mut changes = Vec::new();
        for app in &self.added {
            changes.push(DiffChange::new(diff_id, diff_time, &app.package_name, DiffType::Add));
        }
        for name in &self.removed {
            changes.push(DiffChange::new(diff_id, diff_time, name, DiffType::Remove));
        }
        for (app, columns) in &self.changed {
            for col in columns {
                changes.push(
                    DiffChange::new(diff_id, diff_time, &app.package_name, DiffType::Change)
                        .with_column(col.column, &col.old_value, &col.new_value),
                );
            }
        }
        changes
    }
}

fn compare_columns(old: &StoredApp, new: &StoredApp) -> Vec<ColumnChange> {
    let old_paths = old.apk_paths.join(",");
    let new_paths = new.apk_paths.join(",");
    let pairs: [(&'static str, String, String); 6] = [
        ("target_api", old.target_api.to_string(), new.target_api.to_string()),
        ("min_api", old.min_api.to_string(), new.min_api.to_string()),
        ("ver_code", old.ver_code.to_string(), new.ver_code.to_string()),
        ("ver_name", old.ver_name.clone(), new.ver_name.clone()),
        ("update_time", old.update_time.to_string(), new.update_time.to_string()),
        ("apk_paths", old_paths, new_paths),
    ];

    pairs
        .into_iter()
        .filter(|(_, old_value, new_value)| old_value != new_value)
        .map(|(column, old_value, new_value)| ColumnChange {
            column,
            old_value,
            new_value,
        })
        .collect()
}

/// Compare fresh rows against stored rows
pub fn detect_diff(fresh: &[StoredApp], stored: &[StoredApp]) -> AppDiff {
    let stored_by_name: HashMap<&str, &StoredApp> =
        stored.iter().map(|a| (a.package_name.as_str(), a)).collect();
    let fresh_by_name: BTreeMap<&str, &StoredApp> =
        fresh.iter().map(|a| (a.package_name.as_str(), a)).collect();

    let mut diff = AppDiff::default();
    for (name, app) in &fresh_by_name {
        match stored_by_name.get(name) {
            None => diff.added.push((*app).clone()),
            Some(old) => {
                let columns = compare_columns(old, app);
                if !columns.is_empty() {
                    diff.changed.push(((*app).clone(), columns));
                }
            }
        }
    }

    let mut removed: Vec<String> = stored
        .iter()
        .filter(|a| !fresh_by_name.contains_key(a.package_name.as_str()))
        .map(|a| a.package_name.clone())
        .collect();
    removed.sort();
    diff.removed = removed;

    diff
}

/// Diff identifier derived from the pass time
pub fn diff_id(diff_time: i64) -> String {
    chrono::DateTime::from_timestamp_millis(diff_time)
        .map(|t| t.format("%Y%m%d%H%M%S%3f").to_string())
        .unwrap_or_else(|| diff_time.to_string())
}

/// Record the diff rows and the diff time, purging stale marker rows
pub fn record_diff(
    store: &AppStore,
    diff: &AppDiff,
    diff_time: i64,
    retention_days: i64,
) -> Result<usize> {
    let mut changes = diff.to_changes(&diff_id(diff_time), diff_time);
    let purge_before = diff_time - retention_days * DAY_MS;
    let recorded = store.record_diff(&mut changes, purge_before, diff_time)?;
    debug!("Recorded {} diff rows", recorded);
    Ok(recorded)
}

/// Bring the store in line with the fresh side of the diff
///
/// Returns the number of deleted and of written rows.
pub fn apply_diff(store: &AppStore, diff: &AppDiff) -> Result<(usize, usize)> {
    if diff.is_empty() {
        return Ok((0, 0));
    }

    let replaced: Vec<StoredApp> = diff
        .added
        .iter()
        .cloned()
        .chain(diff.changed.iter().map(|(app, _)| app.clone()))
        .collect();
    let (deleted, written) = store.apply_changes(&diff.removed, &replaced)?;
    info!(
        "Applied diff: {} added, {} changed, {} removed",
        diff.added.len(),
        diff.changed.len(),
        deleted
    );
    Ok((deleted, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::setting::PACKAGE_CHANGED_DIFF_TIME;
    use crate::db::models::Setting;
    use crate::packages::PackageRecord;
    use crate::store::RecordStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn app(name: &str, code: i64, time: i64) -> StoredApp {
        StoredApp::derive(&PackageRecord::new(name, code, time)).unwrap()
    }

    #[test]
    fn test_should_diff_windows() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = 100 * DAY_MS;

        assert!(should_diff(now, None, &mut rng));
        assert!(should_diff(now, Some(0), &mut rng));
        assert!(!should_diff(now, Some(now - 2 * DAY_MS), &mut rng));
        assert!(should_diff(now, Some(now - 7 * DAY_MS), &mut rng));

        // Between the windows it is a coin toss, but not always the same
        let runs = (0..1000)
            .filter(|_| should_diff(now, Some(now - 5 * DAY_MS), &mut rng))
            .count();
        assert!(runs > 0 && runs < 1000);
    }

    #[test]
    fn test_detect_diff_columns() {
        let mut changed = app("com.b", 2, 20);
        changed.apk_paths = vec!["/new/base.apk".to_string()];

        let stored = vec![app("com.a", 1, 10), app("com.b", 1, 20), app("com.c", 1, 30)];
        let fresh = vec![changed, app("com.c", 1, 30), app("com.d", 1, 40)];

        let diff = detect_diff(&fresh, &stored);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].package_name, "com.d");
        assert_eq!(diff.removed, vec!["com.a"]);
        assert_eq!(diff.changed.len(), 1);

        let columns: Vec<&str> = diff.changed[0].1.iter().map(|c| c.column).collect();
        assert_eq!(columns, vec!["ver_code", "ver_name", "apk_paths"]);
        assert!(columns.iter().all(|c| DIFF_COLUMNS.contains(c)));
    }

    #[test]
    fn test_empty_diff_records_marker() {
        let diff = detect_diff(&[app("com.a", 1, 1)], &[app("com.a", 1, 1)]);
        assert!(diff.is_empty());

        let changes = diff.to_changes("x", 5);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, DiffType::None);
    }

    #[test]
    fn test_record_and_apply() {
        let store = AppStore::open_in_memory().unwrap();
        store.upsert_many(&[app("com.a", 1, 10), app("com.b", 1, 20)]).unwrap();

        let fresh = vec![app("com.b", 3, 20), app("com.c", 1, 5)];
        let diff = detect_diff(&fresh, &store.all().unwrap());

        let now = 200 * DAY_MS;
        assert!(record_diff(&store, &diff, now, 60).unwrap() >= 3);
        let diff_time = store
            .with_conn(|conn| Setting::get(conn, PACKAGE_CHANGED_DIFF_TIME))
            .unwrap();
        assert_eq!(diff_time, Some(now));

        assert_eq!(apply_diff(&store, &diff).unwrap(), (1, 2));
        let names: Vec<String> = store.all().unwrap().into_iter().map(|a| a.package_name).collect();
        assert_eq!(names, vec!["com.b", "com.c"]);
        assert_eq!(store.get("com.b").unwrap().unwrap().ver_code, 3);
    }
}
