// src/loader/mod.rs

//! Multi-stage progressive loader
//!
//! Splits an inventory into priority tiers so a consumer can show the
//! launchable apps before everything else is labelled and sorted. A load
//! produces exactly two [`StageBatch`]es over a channel:
//!
//! 1. launchable packages only, sorted by label
//! 2. every package, ordered launchable, regular, misc, overlay
//!
//! `groups` holds cumulative end offsets of each tier within `packages`.

mod labels;

pub use labels::{LabelProvider, compare_names};

use crate::packages::PackageRecord;
use crate::platform::{LabelResolver, LauncherResolver};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One emission of the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageBatch {
    pub packages: Vec<PackageRecord>,
    /// Cumulative tier boundaries, the last equals `packages.len()`
    pub groups: Vec<usize>,
}

impl StageBatch {
    /// Packages of tier `index`
    pub fn group(&self, index: usize) -> &[PackageRecord] {
        let start = index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i).copied())
            .unwrap_or(0);
        match self.groups.get(index) {
            Some(&end) if start <= end && end <= self.packages.len() => {
                &self.packages[start..end]
            }
            _ => &[],
        }
    }
}

/// Tier assignment after launcher resolution
#[derive(Debug, Default)]
struct Tiers {
    launchable: HashSet<String>,
    overlays: HashSet<String>,
    system_services: usize,
    user_services: usize,
}

#[derive(Clone)]
pub struct StagedLoader {
    launcher: Arc<dyn LauncherResolver>,
    labels: Arc<LabelProvider>,
    max_concurrent: usize,
    timeout: Duration,
}

impl StagedLoader {
    pub fn new(
        launcher: Arc<dyn LauncherResolver>,
        labels: Arc<dyn LabelResolver>,
        max_concurrent: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            labels: Arc::new(LabelProvider::new(labels, timeout)),
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    /// Label cache shared by every load of this loader
    pub fn labels(&self) -> &Arc<LabelProvider> {
        &self.labels
    }

    /// Start loading `inventory`
    ///
    /// The receiver yields two batches and then closes. Dropping it stops
    /// the load at the next emission.
    pub fn load(&self, inventory: Arc<Vec<PackageRecord>>) -> mpsc::Receiver<StageBatch> {
        let (tx, rx) = mpsc::channel(2);
        let loader = self.clone();
        tokio::spawn(async move {
            loader.run(inventory, tx).await;
        });
        rx
    }

    async fn run(&self, inventory: Arc<Vec<PackageRecord>>, tx: mpsc::Sender<StageBatch>) {
        let tiers = self.resolve_tiers(&inventory).await;
        debug!(
            "Loader tiers: {} launchable, {} overlay, {} system services, {} user services",
            tiers.launchable.len(),
            tiers.overlays.len(),
            tiers.system_services,
            tiers.user_services
        );

        let (launchable_names, other_names): (Vec<String>, Vec<String>) = inventory
            .iter()
            .map(|p| p.package_name.clone())
            .partition(|name| tiers.launchable.contains(name));

        self.labels.retrieve_sequential(&launchable_names).await;

        let background = {
            let labels = self.labels.clone();
            let max_concurrent = self.max_concurrent;
            tokio::spawn(async move {
                labels.retrieve_concurrent(&other_names, max_concurrent).await;
            })
        };

        let mut first: Vec<PackageRecord> = inventory
            .iter()
            .filter(|p| tiers.launchable.contains(&p.package_name))
            .cloned()
            .collect();
        first.sort_by(|a, b| self.labels.compare(&a.package_name, &b.package_name));
        let launchable_count = first.len();

        if tx
            .send(StageBatch {
                packages: first,
                groups: vec![launchable_count],
            })
            .await
            .is_err()
        {
            debug!("Loader receiver dropped after launcher resolution");
            background.abort();
            return;
        }

        if let Err(e) = background.await {
            warn!("Background label retrieval failed: {}", e);
        }

        let batch = self.final_batch(&inventory, &tiers);
        if tx.send(batch).await.is_err() {
            debug!("Loader receiver dropped before final batch");
        }
    }

    async fn resolve_tiers(&self, inventory: &[PackageRecord]) -> Tiers {
        let candidates = inventory
            .iter()
            .filter(|p| !(p.flags.debuggable && !p.is_system()))
            .map(|p| p.package_name.clone())
            .collect::<Vec<String>>();

        let launcher = self.launcher.clone();
        let timeout = self.timeout;
        let resolved: HashSet<String> = stream::iter(candidates)
            .map(|name| {
                let launcher = launcher.clone();
                async move {
                    let activity =
                        tokio::time::timeout(timeout, launcher.resolve_launcher_activity(&name))
                            .await
                            .ok()
                            .flatten();
                    activity.map(|_| name)
                }
            })
            .buffer_unordered(self.max_concurrent)
            .filter_map(|name| async move { name })
            .collect()
            .await;

        let mut tiers = Tiers::default();
        for record in inventory {
            let name = &record.package_name;
            if resolved.contains(name) {
                tiers.launchable.insert(name.clone());
            } else if record.overlay_target.is_some() {
                tiers.overlays.insert(name.clone());
            } else if record.is_system() {
                tiers.system_services += 1;
            } else {
                tiers.user_services += 1;
            }
        }
        tiers
    }

    fn final_batch(&self, inventory: &[PackageRecord], tiers: &Tiers) -> StageBatch {
        let misc: HashSet<&str> = inventory
            .iter()
            .filter(|p| {
                !tiers.launchable.contains(&p.package_name)
                    && !tiers.overlays.contains(&p.package_name)
            })
            .filter(|p| self.is_misc(p))
            .map(|p| p.package_name.as_str())
            .collect();

        let mut packages: Vec<PackageRecord> = inventory.to_vec();
        packages.sort_by(|a, b| {
            let (a_name, b_name) = (a.package_name.as_str(), b.package_name.as_str());
            tiers
                .launchable
                .contains(b_name)
                .cmp(&tiers.launchable.contains(a_name))
                .then_with(|| {
                    tiers
                        .overlays
                        .contains(a_name)
                        .cmp(&tiers.overlays.contains(b_name))
                })
                .then_with(|| misc.contains(a_name).cmp(&misc.contains(b_name)))
                .then_with(|| self.labeled(b_name).cmp(&self.labeled(a_name)))
                .then_with(|| self.labels.compare(a_name, b_name))
        });

        let total = packages.len();
        let overlay_count = tiers.overlays.len();
        StageBatch {
            groups: vec![
                tiers.launchable.len(),
                total - misc.len() - overlay_count,
                total - overlay_count,
                total,
            ],
            packages,
        }
    }

    fn is_misc(&self, record: &PackageRecord) -> bool {
        let name = record.package_name.as_str();
        (name.contains('.') && self.labels.looks_unlabeled(name)) || record.icon_res <= 0
    }

    fn labeled(&self, name: &str) -> bool {
        !self.labels.looks_unlabeled(name)
    }
}

impl std::fmt::Debug for StagedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedLoader")
            .field("max_concurrent", &self.max_concurrent)
            .field("timeout", &self.timeout)
            .finish()
    }
}
