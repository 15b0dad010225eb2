// src/commands/load.rs
//! Run the staged loader over a snapshot

use anyhow::Result;
use pkgwatch::platform::{PlatformSnapshot, SnapshotPlatform};
use pkgwatch::{StagedLoader, SyncConfig};
use std::path::Path;
use std::sync::Arc;

const TIER_NAMES: [&str; 4] = ["launchable", "regular", "misc", "overlay"];

pub async fn cmd_load(config: &SyncConfig, snapshot: &Path) -> Result<()> {
    let snapshot = PlatformSnapshot::load(snapshot)?;
    let inventory = Arc::new(snapshot.packages.clone());
    let platform = Arc::new(SnapshotPlatform::new(snapshot));
    let loader = StagedLoader::new(
        platform.clone(),
        platform,
        config.max_concurrent,
        config.service_timeout(),
    );

    let mut batches = loader.load(inventory);
    let mut stage = 0;
    while let Some(batch) = batches.recv().await {
        stage += 1;
        println!("Stage {} ({} packages, groups {:?}):", stage, batch.packages.len(), batch.groups);
        for (index, name) in TIER_NAMES.iter().enumerate().take(batch.groups.len()) {
            let group = batch.group(index);
            if group.is_empty() {
                continue;
            }
            println!("  [{}]", name);
            for record in group {
                println!(
                    "    {:40}  {}",
                    loader.labels().label_or_pkg(&record.package_name),
                    record.package_name
                );
            }
        }
    }
    Ok(())
}
