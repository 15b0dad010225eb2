// src/updates/detector.rs

//! Changed-package detection
//!
//! A package counts as changed when its update time is at or after the
//! watermark. Packages whose update time cannot be trusted (factory images
//! report dates long past, some vendors report update before install) are
//! only counted when they differ from their stored row.

use crate::db::models::StoredApp;
use crate::db::models::setting::{PACKAGE_CHANGED_BOOT_COUNT, PACKAGE_CHANGED_SEQUENCE_NO};
use crate::error::Result;
use crate::packages::PackageRecord;
use crate::platform::PackageRegistry;
use crate::store::{SafeAppStore, SettingsStore};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 2009-01-01 00:00 UTC
pub const PREINSTALL_CUTOFF_2009: i64 = 1_230_768_000_000;
/// 2011-01-01 00:00 UTC
pub const PREINSTALL_CUTOFF_2011: i64 = 1_293_840_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exam {
    /// Update time unreliable, compare with the stored row
    Preinstall,
    Updated,
    Unchanged,
}

fn exam_package(record: &PackageRecord, watermark: i64) -> Exam {
    let time = record.last_update_time;
    if time <= PREINSTALL_CUTOFF_2009
        || time <= PREINSTALL_CUTOFF_2011
        || time < record.first_install_time
    {
        Exam::Preinstall
    } else if time >= watermark {
        Exam::Updated
    } else {
        Exam::Unchanged
    }
}

/// Whether a record differs from its stored row in version or location
fn differs_from_stored(record: &PackageRecord, stored: &StoredApp) -> bool {
    record.version_code != stored.ver_code
        || record.version_name != stored.ver_name
        || record.base_path() != stored.base_path()
}

/// Changed packages together with their previous rows
#[derive(Debug, Clone, Default)]
pub struct PackageChanges {
    /// Stored rows of the changed packages, `None` when the store is unreadable
    pub previous: Option<Vec<StoredApp>>,
    pub changed: Vec<PackageRecord>,
}

impl PackageChanges {
    pub fn previous_map(&self) -> HashMap<String, StoredApp> {
        self.previous
            .iter()
            .flatten()
            .map(|app| (app.package_name.clone(), app.clone()))
            .collect()
    }
}

#[derive(Clone)]
pub struct PackageUpdateDetector {
    store: SafeAppStore,
}

impl PackageUpdateDetector {
    pub fn new(store: SafeAppStore) -> Self {
        Self { store }
    }

    /// Packages changed at or after `watermark`
    pub fn updated_packages(&self, all: &[PackageRecord], watermark: i64) -> Vec<PackageRecord> {
        let mut updated = Vec::new();
        let mut preinstalled = Vec::new();
        for record in all {
            match exam_package(record, watermark) {
                Exam::Updated => updated.push(record.clone()),
                Exam::Preinstall => preinstalled.push(record),
                Exam::Unchanged => {}
            }
        }
        if preinstalled.is_empty() {
            return updated;
        }

        let names: Vec<String> = preinstalled.iter().map(|r| r.package_name.clone()).collect();
        let stored: HashMap<String, StoredApp> = self
            .store
            .get_many(&names)
            .into_iter()
            .map(|app| (app.package_name.clone(), app))
            .collect();

        let changed_preinstalled = preinstalled
            .into_iter()
            .filter(|r| {
                stored
                    .get(&r.package_name)
                    .is_some_and(|app| differs_from_stored(r, app))
            })
            .cloned();
        updated.extend(changed_preinstalled);
        updated
    }

    /// Changed packages plus the previous snapshot of exactly those packages
    pub fn detect_changes(&self, all: &[PackageRecord], watermark: i64) -> PackageChanges {
        let changed = self.updated_packages(all, watermark);
        let previous = match self.store.count() {
            None => None,
            Some(0) => Some(Vec::new()),
            Some(_) => {
                let names: Vec<String> = changed.iter().map(|r| r.package_name.clone()).collect();
                Some(self.store.get_many(&names))
            }
        };
        debug!("Detected {} changed packages since {}", changed.len(), watermark);
        PackageChanges { previous, changed }
    }

    /// Add the packages in `reported` that `changes` does not hold yet
    ///
    /// Only packages present in `all` are added. Returns how many were.
    pub fn include_reported(
        &self,
        changes: &mut PackageChanges,
        all: &[PackageRecord],
        reported: &HashSet<String>,
    ) -> usize {
        let known: HashSet<&str> = changes
            .changed
            .iter()
            .map(|r| r.package_name.as_str())
            .collect();
        let added: Vec<PackageRecord> = all
            .iter()
            .filter(|r| reported.contains(&r.package_name) && !known.contains(r.package_name.as_str()))
            .cloned()
            .collect();
        if added.is_empty() {
            return 0;
        }

        if let Some(previous) = changes.previous.as_mut() {
            let names: Vec<String> = added.iter().map(|r| r.package_name.clone()).collect();
            previous.extend(self.store.get_many(&names));
        }
        let count = added.len();
        changes.changed.extend(added);
        count
    }
}

/// Names of packages the platform reports changed since the stored cursor
///
/// The cursor is only valid within one boot; after a reboot it restarts at
/// zero. Returns `None` when the platform cannot report changes.
pub async fn changed_package_names(
    registry: &dyn PackageRegistry,
    settings: &SettingsStore,
    boot_count: i64,
) -> Result<Option<Vec<String>>> {
    let stored_boot = settings.get(PACKAGE_CHANGED_BOOT_COUNT)?;
    let sequence = if stored_boot == Some(boot_count) {
        settings.get_or(PACKAGE_CHANGED_SEQUENCE_NO, 0)?
    } else {
        0
    };

    let changes = registry.changed_packages(sequence).await?;

    // An unsupported query keeps the cursor where it was
    settings.set(PACKAGE_CHANGED_BOOT_COUNT, boot_count)?;
    settings.set(
        PACKAGE_CHANGED_SEQUENCE_NO,
        changes.as_ref().map_or(sequence, |c| c.sequence_number),
    )?;

    let Some(changes) = changes else {
        return Ok(None);
    };
    debug!(
        "{} packages changed since sequence {}",
        changes.package_names.len(),
        sequence
    );
    Ok(Some(changes.package_names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ChangedPackages, PlatformSnapshot, SnapshotPlatform};
    use crate::store::AppStore;
    use std::sync::Arc;

    const T: i64 = 1_700_000_000_000;

    fn setup() -> (Arc<AppStore>, PackageUpdateDetector) {
        let store = Arc::new(AppStore::open_in_memory().unwrap());
        let detector = PackageUpdateDetector::new(SafeAppStore::new(store.clone()));
        (store, detector)
    }

    fn names(records: &[PackageRecord]) -> Vec<&str> {
        records.iter().map(|r| r.package_name.as_str()).collect()
    }

    #[test]
    fn test_watermark_is_inclusive() {
        let (_store, detector) = setup();
        let all = vec![
            PackageRecord::new("com.old", 1, T - 1),
            PackageRecord::new("com.edge", 1, T),
            PackageRecord::new("com.new", 1, T + 1),
        ];
        assert_eq!(names(&detector.updated_packages(&all, T)), vec!["com.edge", "com.new"]);
    }

    #[test]
    fn test_preinstalled_compared_with_store() {
        let (store, detector) = setup();
        let safe = SafeAppStore::new(store);

        let same = PackageRecord::new("com.same", 1, 1_000);
        let mut bumped = PackageRecord::new("com.bumped", 1, PREINSTALL_CUTOFF_2011);
        safe.upsert_many(&[
            StoredApp::derive(&same).unwrap(),
            StoredApp::derive(&bumped).unwrap(),
        ]);
        bumped.version_code = 2;

        // Update before install counts as preinstalled too
        let mut skewed = PackageRecord::new("com.skewed", 1, T);
        skewed.first_install_time = T + 10;

        let all = vec![same, bumped, skewed];
        assert_eq!(names(&detector.updated_packages(&all, 0)), vec!["com.bumped"]);
    }

    #[test]
    fn test_previous_snapshot_sentinels() {
        let (store, detector) = setup();
        let all = vec![PackageRecord::new("com.a", 2, T)];

        let changes = detector.detect_changes(&all, T);
        assert_eq!(changes.previous, Some(Vec::new()));

        SafeAppStore::new(store).upsert(&StoredApp::derive(&PackageRecord::new("com.a", 1, 5)).unwrap());
        let changes = detector.detect_changes(&all, T);
        assert_eq!(changes.previous.as_ref().map(Vec::len), Some(1));
        assert_eq!(changes.previous_map()["com.a"].ver_code, 1);
    }

    #[tokio::test]
    async fn test_sequence_cursor_resets_on_reboot() {
        let store = Arc::new(AppStore::open_in_memory().unwrap());
        let settings = SettingsStore::new(store);
        let platform = SnapshotPlatform::new(PlatformSnapshot {
            changes: Some(ChangedPackages {
                sequence_number: 12,
                package_names: vec!["com.a".to_string()],
            }),
            ..Default::default()
        });

        let names = changed_package_names(&platform, &settings, 3).await.unwrap();
        assert_eq!(names, Some(vec!["com.a".to_string()]));
        assert_eq!(settings.get(PACKAGE_CHANGED_SEQUENCE_NO).unwrap(), Some(12));
        assert_eq!(settings.get(PACKAGE_CHANGED_BOOT_COUNT).unwrap(), Some(3));

        // Same boot: cursor 12 is reused and the platform still has it
        assert!(changed_package_names(&platform, &settings, 3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unsupported_query_keeps_cursor() {
        let store = Arc::new(AppStore::open_in_memory().unwrap());
        let settings = SettingsStore::new(store);
        settings.set(PACKAGE_CHANGED_BOOT_COUNT, 4).unwrap();
        settings.set(PACKAGE_CHANGED_SEQUENCE_NO, 9).unwrap();
        let platform = SnapshotPlatform::new(PlatformSnapshot::default());

        assert_eq!(changed_package_names(&platform, &settings, 4).await.unwrap(), None);
        assert_eq!(settings.get(PACKAGE_CHANGED_SEQUENCE_NO).unwrap(), Some(9));

        // A reboot restarts the cursor even when nothing is reported
        changed_package_names(&platform, &settings, 5).await.unwrap();
        assert_eq!(settings.get(PACKAGE_CHANGED_SEQUENCE_NO).unwrap(), Some(0));
        assert_eq!(settings.get(PACKAGE_CHANGED_BOOT_COUNT).unwrap(), Some(5));
    }

    #[test]
    fn test_include_reported_adds_missing_packages() {
        let (store, detector) = setup();
        let stored = PackageRecord::new("com.pre", 1, 1_000);
        SafeAppStore::new(store).upsert(&StoredApp::derive(&stored).unwrap());

        let all = vec![PackageRecord::new("com.new", 1, T), stored.clone()];
        let mut changes = detector.detect_changes(&all, T);
        assert_eq!(names(&changes.changed), vec!["com.new"]);

        let reported: HashSet<String> = ["com.new", "com.pre", "com.removed"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(detector.include_reported(&mut changes, &all, &reported), 1);
        assert_eq!(names(&changes.changed), vec!["com.new", "com.pre"]);
        assert_eq!(changes.previous_map()["com.pre"].ver_code, 1);
    }
}
