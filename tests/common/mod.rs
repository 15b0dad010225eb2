// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pkgwatch::packages::PackageRecord;
use pkgwatch::platform::{PlatformSnapshot, SnapshotPlatform};
use pkgwatch::{AppStore, Error, InventorySource, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// 2023-11-14, well after every preinstall cutoff
pub const BASE_TIME: i64 = 1_700_000_000_000;
pub const HOUR: i64 = 3_600_000;
pub const DAY: i64 = 86_400_000;

/// Create a file-backed store in a temporary directory.
///
/// Returns (TempDir, store) - keep the TempDir alive to prevent cleanup.
pub fn setup_store() -> (TempDir, Arc<AppStore>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("pkgwatch.db");
    let store = AppStore::open(&db_path).unwrap();
    (temp_dir, Arc::new(store))
}

pub fn record(name: &str, code: i64, time: i64) -> PackageRecord {
    let mut record = PackageRecord::new(name, code, time);
    record.apk_paths = vec![format!("/data/app/{name}/base.apk")];
    record
}

pub fn snapshot_platform(packages: Vec<PackageRecord>) -> Arc<SnapshotPlatform> {
    Arc::new(SnapshotPlatform::new(PlatformSnapshot {
        packages,
        ..Default::default()
    }))
}

pub fn launchable(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Source returning whatever was last set, counting fetches
#[derive(Default)]
pub struct ScriptedSource {
    records: Mutex<Vec<PackageRecord>>,
    fail: Mutex<bool>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(records: Vec<PackageRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn set(&self, records: Vec<PackageRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InventorySource for ScriptedSource {
    type Item = PackageRecord;

    async fn fetch(&self) -> Result<Vec<PackageRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(Error::SourceUnavailable("scripted failure".to_string()));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
