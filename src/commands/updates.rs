// src/commands/updates.rs
//! Classify changes within a session

use anyhow::{Context, Result};
use pkgwatch::packages::{CachedSource, CombinedSource, PlatformSource, ShellListingSource};
use pkgwatch::platform::{PlatformHandles, PlatformSnapshot, SnapshotPlatform};
use pkgwatch::sync::Maintainer;
use pkgwatch::updates::UpdatedApp;
use pkgwatch::{AppStore, SyncConfig, SystemClock, UpdatesChecker};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn cmd_updates(
    config: &SyncConfig,
    snapshot: &Path,
    session: i64,
    changed_limit: usize,
    used_limit: usize,
) -> Result<()> {
    let platform = Arc::new(SnapshotPlatform::new(PlatformSnapshot::load(snapshot)?));
    let handles = PlatformHandles::from_shared(platform.clone());
    let primary = PlatformSource::new(platform.clone(), platform, config.service_timeout())
        .with_archived(config.include_archived);
    let source = CombinedSource::new(primary, ShellListingSource::from_config(config));
    let inventory = Arc::new(CachedSource::new(source, config.freshness_window()));

    let store = Arc::new(AppStore::open(&config.db_path).context("Failed to open package database")?);
    let clock = Arc::new(SystemClock);
    let maintainer = Arc::new(Maintainer::new(
        store.clone(),
        clock.clone(),
        config.diff_retention_days,
    ));
    let mut checker =
        UpdatesChecker::new(inventory.clone(), store, handles, clock, config)
            .with_maintainer(maintainer);

    let result = checker.check_new_update(session).await?;
    info!("Update check result: {:?}", result);
    let contributions = inventory.inner().contributions();
    if !contributions.primary {
        println!("Package registry unavailable, showing the shell listing only.");
    } else if !contributions.confirmed {
        println!("Package visibility is restricted, results may be incomplete.");
    }

    let sections = checker.get_sections(changed_limit, used_limit).await;
    if let Some(report) = checker.wait_maintenance().await {
        info!(
            "Maintenance: {} upserted, {} removed",
            report.update.upserted, report.removed
        );
    }

    match result {
        None => println!("Nothing to show."),
        Some(false) => println!("No changes since the last check."),
        Some(true) => println!("New changes available."),
    }
    for (category, apps) in &sections {
        println!("{} ({}):", category, apps.len());
        for app in apps {
            match app {
                UpdatedApp::Upgrade(upgrade) => println!(
                    "  {:40}  {} -> {}",
                    upgrade.record.package_name, upgrade.version_code.0, upgrade.version_code.1
                ),
                UpdatedApp::General { record, .. } => {
                    println!("  {:40}  {}", record.package_name, record.version_name)
                }
            }
        }
    }
    Ok(())
}
