// src/updates/checker.rs

//! Update checks for one consumer
//!
//! [`UpdatesChecker::check_new_update`] takes a fresh inventory, detects
//! what changed in the current session and whether anything differs from
//! the previous check. [`UpdatesChecker::get_sections`] turns the last
//! check into classified buckets.

use super::classifier::{Classifier, UpdateCategory, UpdateLists, UpdatedApp};
use super::detector::{PackageChanges, PackageUpdateDetector, changed_package_names};
use super::session::{ChangeTracker, UpdatesSession};
use super::used::UsedPackages;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::packages::{InventorySource, PackageRecord};
use crate::platform::PlatformHandles;
use crate::store::{AppStore, SafeAppStore, SettingsStore};
use crate::sync::{MaintenanceReport, Maintainer};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Changed packages of the last check
#[derive(Debug, Clone, Default)]
pub struct PackageListChanges {
    pub changes: PackageChanges,
    /// Identifier to update time of every changed package
    pub last_changed: HashMap<String, i64>,
    /// Whether the changed set differs from the check before
    pub has_changes: bool,
}

/// Recently used packages of the last check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedListChanges {
    pub used: Vec<String>,
    pub changed: bool,
    pub has_usage_access: bool,
}

pub struct UpdatesChecker {
    inventory: Arc<dyn InventorySource<Item = PackageRecord>>,
    platform: PlatformHandles,
    tracker: ChangeTracker,
    detector: PackageUpdateDetector,
    settings: SettingsStore,
    /// Packages the platform reported changed during the current session
    reported: HashSet<String>,
    used: UsedPackages,
    classifier: Classifier,
    maintainer: Option<Arc<Maintainer>>,
    maintenance: Option<JoinHandle<Result<MaintenanceReport>>>,
    max_concurrent: usize,
    timeout: Duration,
    last_pkg: Option<PackageListChanges>,
    last_used: Option<UsedListChanges>,
}

impl UpdatesChecker {
    pub fn new(
        inventory: Arc<dyn InventorySource<Item = PackageRecord>>,
        store: Arc<AppStore>,
        platform: PlatformHandles,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> Self {
        let detector = PackageUpdateDetector::new(SafeAppStore::new(store.clone()));
        let settings = SettingsStore::new(store);
        let tracker = ChangeTracker::new(
            settings.clone(),
            detector.clone(),
            clock,
            config.new_app_lookback_ms,
        );
        let used = UsedPackages::new(
            platform.usage.clone(),
            platform.launcher.clone(),
            config.self_package.clone(),
            config.recently_used_window_ms,
            config.recently_used_limit,
            config.service_timeout(),
        );
        let classifier = Classifier::new(
            platform.registry.clone(),
            config.max_concurrent,
            config.service_timeout(),
        )
        .with_api_split(config.split_api_upgrades);

        Self {
            inventory,
            platform,
            tracker,
            detector,
            settings,
            reported: HashSet::new(),
            used,
            classifier,
            maintainer: None,
            maintenance: None,
            max_concurrent: config.max_concurrent.max(1),
            timeout: config.service_timeout(),
            last_pkg: None,
            last_used: None,
        }
    }

    /// Run maintenance in the background after each check
    pub fn with_maintainer(mut self, maintainer: Arc<Maintainer>) -> Self {
        self.maintainer = Some(maintainer);
        self
    }

    pub fn session(&self) -> &UpdatesSession {
        self.tracker.session()
    }

    /// Whether no check has been made yet
    pub fn is_check_needed(&self) -> bool {
        self.last_pkg.is_none()
    }

    pub fn last_package_changes(&self) -> Option<&PackageListChanges> {
        self.last_pkg.as_ref()
    }

    pub fn last_used_changes(&self) -> Option<&UsedListChanges> {
        self.last_used.as_ref()
    }

    /// Check for changes within the session identified by `main_timestamp`
    ///
    /// `Some(true)` when there is something new to show, `Some(false)` when
    /// nothing differs from the last check, `None` when there is nothing
    /// to show at all.
    pub async fn check_new_update(&mut self, main_timestamp: i64) -> Result<Option<bool>> {
        let all = Arc::new(self.inventory.fetch().await?);

        let last_changed = self
            .last_pkg
            .as_ref()
            .map(|p| p.last_changed.clone())
            .unwrap_or_default();
        let mut changes = self.tracker.changed_packages(main_timestamp, &all)?;
        if self.tracker.session().is_brand_new_session {
            self.reported.clear();
        }
        self.include_reported(&mut changes, &all).await;
        let pkg = package_list_changes(changes, &last_changed);

        // The previous snapshot is taken, the store may move on now
        if let Some(maintainer) = &self.maintainer {
            let complete = self.inventory.last_fetch_confirmed();
            if !complete {
                debug!("Inventory may be incomplete, absent packages are kept");
            }
            let previous = self.maintenance.take();
            let maintainer = maintainer.clone();
            let all = all.clone();
            // Each pass waits for the one before so the newest inventory lands last
            self.maintenance = Some(tokio::spawn(async move {
                if let Some(previous) = previous {
                    match previous.await {
                        Ok(Err(e)) => warn!("Earlier maintenance failed: {}", e),
                        Err(e) => warn!("Earlier maintenance task failed: {}", e),
                        Ok(Ok(_)) => {}
                    }
                }
                if complete {
                    maintainer.maintain(all).await
                } else {
                    let update = maintainer.record(all, false).await?;
                    Ok(MaintenanceReport {
                        update,
                        ..Default::default()
                    })
                }
            }));
        }

        // Keep the used list across checks of one session only
        let last_used = if self.tracker.session().is_brand_new_session {
            None
        } else {
            self.last_used.as_ref().map(|u| u.used.clone())
        };
        let has_usage_access = self.platform.capability.has_usage_access();
        let used_names = if has_usage_access {
            self.used.get().await
        } else {
            Vec::new()
        };
        let used = UsedListChanges {
            changed: used_names != last_used.unwrap_or_default(),
            used: used_names,
            has_usage_access,
        };

        let result = if used.changed {
            Some(true)
        } else if pkg.changes.changed.is_empty() && !used.has_usage_access {
            // Usage access request is always shown
            Some(true)
        } else if pkg.changes.changed.is_empty() && used.used.is_empty() {
            None
        } else {
            Some(pkg.has_changes)
        };

        self.last_pkg = Some(pkg);
        self.last_used = Some(used);
        Ok(result)
    }

    /// Merge packages the platform's change cursor reports
    ///
    /// Catches packages whose update time cannot be trusted. Reported names
    /// accumulate over a session, since the cursor only reports each change
    /// once.
    async fn include_reported(&mut self, changes: &mut PackageChanges, all: &[PackageRecord]) {
        let registry = self.platform.registry.as_ref();
        let boot_count = registry.boot_count();
        match changed_package_names(registry, &self.settings, boot_count).await {
            Ok(Some(names)) => self.reported.extend(names),
            Ok(None) => {}
            Err(e) => warn!("Failed to read changed packages: {}", e),
        }
        if self.reported.is_empty() {
            return;
        }
        let added = self.detector.include_reported(changes, all, &self.reported);
        if added > 0 {
            debug!("{} changed packages reported by the platform only", added);
        }
    }

    /// Wait for the background maintenance started by the last check
    ///
    /// Passes run in check order, so this also waits for earlier ones.
    pub async fn wait_maintenance(&mut self) -> Option<MaintenanceReport> {
        let handle = self.maintenance.take()?;
        match handle.await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!("Maintenance failed: {}", e);
                None
            }
            Err(e) => {
                warn!("Maintenance task failed: {}", e);
                None
            }
        }
    }

    /// Classified buckets of the last check
    pub async fn get_sections(&self, changed_limit: usize, used_limit: usize) -> UpdateLists {
        let mut sections = UpdateLists::new();

        if let Some(pkg) = self.last_pkg.as_ref().filter(|p| p.has_changes)
            && !pkg.changes.changed.is_empty()
        {
            let session = self.tracker.session();
            let no_records = pkg.changes.previous.is_none();
            let is_fresh_install = session.is_new_app() || no_records;
            let limit = pkg.changes.changed.len().min(changed_limit);
            sections = self
                .classifier
                .get_update_lists(
                    &pkg.changes.changed,
                    &pkg.changes.previous_map(),
                    is_fresh_install,
                    session.second_last_retrieval_time,
                    limit,
                )
                .await;
        }

        if let Some(used) = self.last_used.as_ref().filter(|u| u.changed) {
            let names = &used.used[..used.used.len().min(used_limit)];
            let recently_used: Vec<UpdatedApp> = stream::iter(names)
                .map(|name| self.fetch_package(name))
                .buffered(self.max_concurrent)
                .filter_map(|record| async move {
                    record.map(|record| UpdatedApp::General {
                        record,
                        previous: None,
                    })
                })
                .collect()
                .await;
            if !recently_used.is_empty() {
                sections.insert(UpdateCategory::RecentlyUsed, recently_used);
            }
        }

        sections
    }

    async fn fetch_package(&self, name: &str) -> Option<PackageRecord> {
        match tokio::time::timeout(self.timeout, self.platform.registry.get_package(name)).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!("Failed to fetch {}: {}", name, e);
                None
            }
            Err(_) => {
                warn!("Fetching {} timed out", name);
                None
            }
        }
    }
}

/// Compare a changed set with the one from the previous check
fn package_list_changes(
    changes: PackageChanges,
    last_changed: &HashMap<String, i64>,
) -> PackageListChanges {
    let changed = &changes.changed;
    let has_changes = !changed.is_empty()
        && (changed.len() != last_changed.len()
            || changed
                .iter()
                .any(|r| last_changed.get(&r.package_name) != Some(&r.last_update_time)));
    let last_changed = changed
        .iter()
        .map(|r| (r.package_name.clone(), r.last_update_time))
        .collect();
    PackageListChanges {
        changes,
        last_changed,
        has_changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_list_changes() {
        let changes = PackageChanges {
            previous: Some(Vec::new()),
            changed: vec![PackageRecord::new("com.a", 1, 10)],
        };

        let first = package_list_changes(changes.clone(), &HashMap::new());
        assert!(first.has_changes);

        let second = package_list_changes(changes.clone(), &first.last_changed);
        assert!(!second.has_changes);

        let mut bumped = changes;
        bumped.changed[0].last_update_time = 11;
        assert!(package_list_changes(bumped, &second.last_changed).has_changes);

        let empty = package_list_changes(PackageChanges::default(), &second.last_changed);
        assert!(!empty.has_changes);
    }
}
