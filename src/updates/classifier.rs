// src/updates/classifier.rs

//! Change classification
//!
//! Buckets each changed package by comparing it with its previous stored
//! row. Version-code upgrades are computed by a separate pass that also
//! covers changed packages beyond the display limit, fetching those from
//! the registry one by one.

use crate::db::models::StoredApp;
use crate::packages::PackageRecord;
use crate::platform::PackageRegistry;
use futures::stream::{self, StreamExt};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{AsRefStr, Display};
use tracing::{debug, warn};

/// Classification bucket, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UpdateCategory {
    New,
    Upgraded,
    /// Version-code upgrade that kept its target API, only with the API split
    VersionChanged,
    PackageUpdated,
    Recent,
    RecentlyUsed,
}

/// Before/after values of a version upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUpgrade {
    pub record: PackageRecord,
    pub previous: StoredApp,
    pub version_name: (String, String),
    pub version_code: (i64, i64),
    pub update_time: (i64, i64),
    pub target_api: (i32, i32),
}

impl AppUpgrade {
    /// Upgrade from `previous` to `record`, `None` when the version code is the same
    pub fn between(previous: &StoredApp, record: &PackageRecord) -> Option<Self> {
        if previous.ver_code == record.version_code {
            return None;
        }
        Some(Self {
            record: record.clone(),
            previous: previous.clone(),
            version_name: (previous.ver_name.clone(), record.version_name.clone()),
            version_code: (previous.ver_code, record.version_code),
            update_time: (previous.update_time, record.last_update_time),
            target_api: (previous.target_api, record.target_api),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatedApp {
    General {
        record: PackageRecord,
        previous: Option<StoredApp>,
    },
    Upgrade(AppUpgrade),
}

impl UpdatedApp {
    pub fn record(&self) -> &PackageRecord {
        match self {
            UpdatedApp::General { record, .. } => record,
            UpdatedApp::Upgrade(upgrade) => &upgrade.record,
        }
    }

    pub fn package_name(&self) -> &str {
        &self.record().package_name
    }
}

pub type UpdateLists = BTreeMap<UpdateCategory, Vec<UpdatedApp>>;

/// Bucket of one package, first matching rule wins
pub fn classify(
    record: &PackageRecord,
    previous: Option<&StoredApp>,
    is_fresh_install: bool,
    compare_time: i64,
) -> UpdateCategory {
    let Some(prev) = previous else {
        if !is_fresh_install {
            return UpdateCategory::New;
        }
        return if compare_time > 0 && record.last_update_time >= compare_time {
            UpdateCategory::PackageUpdated
        } else {
            UpdateCategory::Recent
        };
    };

    if record.version_code != prev.ver_code {
        return UpdateCategory::Upgraded;
    }

    let is_package_update = if compare_time <= 0 {
        record.last_update_time > prev.update_time
    } else {
        record.last_update_time >= compare_time
    };
    if is_package_update {
        UpdateCategory::PackageUpdated
    } else {
        UpdateCategory::Recent
    }
}

pub struct Classifier {
    registry: Arc<dyn PackageRegistry>,
    max_concurrent: usize,
    timeout: Duration,
    split_api_upgrades: bool,
}

impl Classifier {
    pub fn new(registry: Arc<dyn PackageRegistry>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            registry,
            max_concurrent: max_concurrent.max(1),
            timeout,
            split_api_upgrades: false,
        }
    }

    /// Keep only target-API upgrades in `Upgraded` and move the rest of the
    /// version-code upgrades to `VersionChanged`
    pub fn with_api_split(mut self, split: bool) -> Self {
        self.split_api_upgrades = split;
        self
    }

    /// Classify the first `limit` changed packages
    ///
    /// Every package of the slice lands in exactly one bucket. Empty
    /// buckets are not present in the result.
    pub async fn get_update_lists(
        &self,
        changed: &[PackageRecord],
        previous: &HashMap<String, StoredApp>,
        is_fresh_install: bool,
        compare_time: i64,
        limit: usize,
    ) -> UpdateLists {
        let mut lists = UpdateLists::new();
        if changed.is_empty() {
            return lists;
        }
        let slice = &changed[..limit.min(changed.len())];

        for record in slice {
            let prev = previous.get(&record.package_name);
            let category = classify(record, prev, is_fresh_install, compare_time);
            // Upgrades come from the upgrade pass
            if category == UpdateCategory::Upgraded {
                continue;
            }
            lists.entry(category).or_default().push(UpdatedApp::General {
                record: record.clone(),
                previous: prev.cloned(),
            });
        }

        for list in lists.values_mut() {
            list.sort_by(|a, b| {
                let (a, b) = (a.record(), b.record());
                b.last_update_time
                    .cmp(&a.last_update_time)
                    .then_with(|| a.package_name.cmp(&b.package_name))
            });
        }

        let mut upgrades = self.upgrades(changed, slice, previous).await;
        upgrades.sort_by_key(|u| Reverse(u.update_time.1));
        let (upgraded, version_changed): (Vec<_>, Vec<_>) = if self.split_api_upgrades {
            upgrades
                .into_iter()
                .partition(|u| u.target_api.0 != u.target_api.1)
        } else {
            (upgrades, Vec::new())
        };
        lists.insert(
            UpdateCategory::Upgraded,
            upgraded.into_iter().map(UpdatedApp::Upgrade).collect(),
        );
        lists.insert(
            UpdateCategory::VersionChanged,
            version_changed.into_iter().map(UpdatedApp::Upgrade).collect(),
        );

        lists.retain(|_, list| !list.is_empty());
        lists
    }

    /// Version-code upgrades across the whole changed set
    async fn upgrades(
        &self,
        changed: &[PackageRecord],
        slice: &[PackageRecord],
        previous: &HashMap<String, StoredApp>,
    ) -> Vec<AppUpgrade> {
        let in_slice: HashSet<&str> = slice.iter().map(|r| r.package_name.as_str()).collect();

        let (found_in_slice, missing): (Vec<_>, Vec<_>) = changed
            .iter()
            .filter_map(|r| previous.get(&r.package_name).map(|prev| (prev, r)))
            .partition(|(_, r)| in_slice.contains(r.package_name.as_str()));

        let mut upgrades: Vec<AppUpgrade> = found_in_slice
            .into_iter()
            .filter_map(|(prev, r)| AppUpgrade::between(prev, r))
            .collect();

        let candidates: Vec<&StoredApp> = missing
            .into_iter()
            .filter(|(prev, r)| prev.ver_code != r.version_code)
            .map(|(prev, _)| prev)
            .collect();
        if candidates.is_empty() {
            return upgrades;
        }

        debug!("Fetching {} upgrades beyond the list limit", candidates.len());
        let fetched_separately: Vec<AppUpgrade> = stream::iter(candidates)
            .map(|prev| async move {
                let record = self.fetch_package(&prev.package_name).await?;
                AppUpgrade::between(prev, &record)
            })
            .buffered(self.max_concurrent)
            .filter_map(|upgrade| async move { upgrade })
            .collect()
            .await;

        upgrades.extend(fetched_separately);
        upgrades
    }

    async fn fetch_package(&self, name: &str) -> Option<PackageRecord> {
        match tokio::time::timeout(self.timeout, self.registry.get_package(name)).await {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PlatformSnapshot, SnapshotPlatform};

    fn stored(name: &str, code: i64, time: i64) -> StoredApp {
        StoredApp::derive(&PackageRecord::new(name, code, time)).unwrap()
    }

    fn classifier(packages: Vec<PackageRecord>) -> Classifier {
        let platform = SnapshotPlatform::new(PlatformSnapshot {
            packages,
            ..Default::default()
        });
        Classifier::new(Arc::new(platform), 4, Duration::from_secs(1))
    }

    fn names(lists: &UpdateLists, category: UpdateCategory) -> Vec<&str> {
        lists
            .get(&category)
            .map(|l| l.iter().map(UpdatedApp::package_name).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_classify_rules() {
        let rec = PackageRecord::new("com.a", 2, 500);

        assert_eq!(classify(&rec, None, false, 0), UpdateCategory::New);
        assert_eq!(classify(&rec, None, true, 0), UpdateCategory::Recent);
        assert_eq!(classify(&rec, Some(&stored("com.a", 1, 100)), false, 0), UpdateCategory::Upgraded);

        // A different version name alone is no upgrade
        let mut renamed = stored("com.a", 2, 100);
        renamed.ver_name = "2-beta".to_string();
        assert_eq!(classify(&rec, Some(&renamed), false, 0), UpdateCategory::PackageUpdated);

        let same = stored("com.a", 2, 100);
        assert_eq!(classify(&rec, Some(&same), false, 0), UpdateCategory::PackageUpdated);
        assert_eq!(classify(&rec, Some(&same), false, 600), UpdateCategory::Recent);
        assert_eq!(classify(&rec, Some(&same), false, 500), UpdateCategory::PackageUpdated);

        let newer = stored("com.a", 2, 500);
        assert_eq!(classify(&rec, Some(&newer), false, 0), UpdateCategory::Recent);
    }

    #[tokio::test]
    async fn test_empty_input_gives_empty_map() {
        let lists = classifier(Vec::new())
            .get_update_lists(&[], &HashMap::new(), false, 0, 10)
            .await;
        assert!(lists.is_empty());
    }

    #[tokio::test]
    async fn test_new_and_upgraded() {
        let changed = vec![PackageRecord::new("com.a", 2, 200), PackageRecord::new("com.b", 1, 150)];
        let previous: HashMap<String, StoredApp> =
            [("com.a".to_string(), stored("com.a", 1, 100))].into_iter().collect();

        let lists = classifier(Vec::new())
            .get_update_lists(&changed, &previous, false, 0, 10)
            .await;

        assert_eq!(lists.len(), 2);
        assert_eq!(names(&lists, UpdateCategory::New), vec!["com.b"]);
        assert_eq!(names(&lists, UpdateCategory::Upgraded), vec!["com.a"]);
        match &lists[&UpdateCategory::Upgraded][0] {
            UpdatedApp::Upgrade(u) => assert_eq!(u.version_code, (1, 2)),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_split_moves_plain_version_upgrades() {
        let mut api = PackageRecord::new("com.api", 2, 300);
        api.target_api = 34;
        let changed = vec![api, PackageRecord::new("com.ver", 5, 200)];
        let mut api_prev = stored("com.api", 1, 100);
        api_prev.target_api = 33;
        let previous: HashMap<String, StoredApp> = [
            ("com.api".to_string(), api_prev),
            ("com.ver".to_string(), stored("com.ver", 4, 100)),
        ]
        .into_iter()
        .collect();

        let unsplit = classifier(Vec::new())
            .get_update_lists(&changed, &previous, false, 0, 10)
            .await;
        assert_eq!(names(&unsplit, UpdateCategory::Upgraded), vec!["com.api", "com.ver"]);
        assert!(!unsplit.contains_key(&UpdateCategory::VersionChanged));

        let split = classifier(Vec::new())
            .with_api_split(true)
            .get_update_lists(&changed, &previous, false, 0, 10)
            .await;
        assert_eq!(names(&split, UpdateCategory::Upgraded), vec!["com.api"]);
        assert_eq!(names(&split, UpdateCategory::VersionChanged), vec!["com.ver"]);
    }

    #[tokio::test]
    async fn test_upgrades_beyond_limit_are_fetched() {
        let beyond = PackageRecord::new("com.far", 9, 900);
        let changed = vec![
            PackageRecord::new("com.x", 1, 300),
            PackageRecord::new("com.y", 1, 400),
            beyond.clone(),
            PackageRecord::new("com.gone", 5, 50),
        ];
        let previous: HashMap<String, StoredApp> = [
            ("com.far".to_string(), stored("com.far", 3, 10)),
            ("com.gone".to_string(), stored("com.gone", 4, 10)),
            ("com.x".to_string(), stored("com.x", 1, 10)),
            ("com.y".to_string(), stored("com.y", 1, 10)),
        ]
        .into_iter()
        .collect();

        // The registry only knows com.far; com.gone was uninstalled meanwhile
        let lists = classifier(vec![beyond])
            .get_update_lists(&changed, &previous, false, 0, 2)
            .await;

        assert_eq!(names(&lists, UpdateCategory::PackageUpdated), vec!["com.y", "com.x"]);
        assert_eq!(names(&lists, UpdateCategory::Upgraded), vec!["com.far"]);
    }

    #[tokio::test]
    async fn test_every_package_in_one_bucket() {
        let changed: Vec<PackageRecord> = (0..20)
            .map(|i| PackageRecord::new(format!("com.p{i}"), i % 3, 1_000 + i))
            .collect();
        let previous: HashMap<String, StoredApp> = (0..20)
            .filter(|i| i % 4 != 0)
            .map(|i| (format!("com.p{i}"), stored(&format!("com.p{i}"), 1, 1_000)))
            .collect();

        let lists = classifier(Vec::new())
            .get_update_lists(&changed, &previous, false, 1_010, 20)
            .await;

        let mut seen: Vec<&str> = lists.values().flatten().map(UpdatedApp::package_name).collect();
        assert_eq!(seen.len(), 20);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }
}
