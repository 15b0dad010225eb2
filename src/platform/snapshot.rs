// src/platform/snapshot.rs

//! Platform backed by a captured JSON snapshot
//!
//! Used by the command-line driver to replay an inventory dump taken on a
//! device, and by tests as an in-memory platform.

use super::{
    CapabilityCheck, ChangedPackages, LabelResolver, LauncherResolver, PackageRegistry,
    QueryFlags, UsageEntry, UsageStatsSource,
};
use crate::error::{Error, Result};
use crate::packages::PackageRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Everything the platform reports, as one serializable document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSnapshot {
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
    /// Package name to launcher activity
    #[serde(default)]
    pub launchable: HashMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub usage: Vec<UsageEntry>,
    #[serde(default)]
    pub default_launcher: Option<String>,
    #[serde(default = "default_true")]
    pub bulk_visibility: bool,
    #[serde(default = "default_true")]
    pub usage_access: bool,
    #[serde(default)]
    pub changes: Option<ChangedPackages>,
    #[serde(default)]
    pub boot_count: i64,
}

impl Default for PlatformSnapshot {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            launchable: HashMap::new(),
            labels: HashMap::new(),
            usage: Vec::new(),
            default_launcher: None,
            bulk_visibility: true,
            usage_access: true,
            changes: None,
            boot_count: 0,
        }
    }
}

impl PlatformSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::SourceUnavailable(format!("Failed to read snapshot {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Implements every platform trait over a [`PlatformSnapshot`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotPlatform {
    snapshot: PlatformSnapshot,
}

impl SnapshotPlatform {
    pub fn new(snapshot: PlatformSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &PlatformSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl PackageRegistry for SnapshotPlatform {
    async fn list_packages(&self, flags: QueryFlags) -> Result<Vec<PackageRecord>> {
        Ok(self
            .snapshot
            .packages
            .iter()
            .filter(|p| flags.include_archived || !p.archived)
            .cloned()
            .collect())
    }

    async fn get_package(&self, name: &str) -> Result<Option<PackageRecord>> {
        Ok(self
            .snapshot
            .packages
            .iter()
            .find(|p| p.package_name == name)
            .cloned())
    }

    async fn changed_packages(&self, sequence: i64) -> Result<Option<ChangedPackages>> {
        Ok(self
            .snapshot
            .changes
            .clone()
            .filter(|c| c.sequence_number >= sequence))
    }

    fn boot_count(&self) -> i64 {
        self.snapshot.boot_count
    }
}

impl CapabilityCheck for SnapshotPlatform {
    fn has_bulk_visibility(&self) -> bool {
        self.snapshot.bulk_visibility
    }

    fn has_usage_access(&self) -> bool {
        self.snapshot.usage_access
    }
}

#[async_trait]
impl UsageStatsSource for SnapshotPlatform {
    async fn query_recently_used(&self, _window_ms: i64) -> Result<Vec<UsageEntry>> {
        if !self.snapshot.usage_access {
            return Err(Error::PermissionDenied("usage access not granted".to_string()));
        }
        Ok(self.snapshot.usage.clone())
    }
}

#[async_trait]
impl LauncherResolver for SnapshotPlatform {
    async fn resolve_launcher_activity(&self, name: &str) -> Option<String> {
        self.snapshot.launchable.get(name).cloned()
    }

    async fn resolve_default_launcher(&self) -> Option<String> {
        self.snapshot.default_launcher.clone()
    }
}

#[async_trait]
impl LabelResolver for SnapshotPlatform {
    async fn load_label(&self, name: &str) -> Option<String> {
        self.snapshot.labels.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_defaults() {
        let snapshot: PlatformSnapshot =
            serde_json::from_str(r#"{"packages":[{"package_name":"com.a","version_code":3,"last_update_time":9}]}"#)
                .unwrap();
        assert!(snapshot.bulk_visibility);
        assert_eq!(snapshot.packages[0].version_code, 3);
        assert_eq!(snapshot.packages[0].first_install_time, 0);
    }

    #[tokio::test]
    async fn test_archived_filtered_without_flag() {
        let mut archived = PackageRecord::new("com.arc", 1, 1);
        archived.archived = true;
        let platform = SnapshotPlatform::new(PlatformSnapshot {
            packages: vec![PackageRecord::new("com.a", 1, 1), archived],
            ..Default::default()
        });

        assert_eq!(platform.list_packages(QueryFlags::default()).await.unwrap().len(), 1);
        assert_eq!(platform.list_packages(QueryFlags::archived()).await.unwrap().len(), 2);
    }
}
