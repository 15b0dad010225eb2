// src/commands/sync.rs
//! Reconcile the store against a platform snapshot

use anyhow::{Context, Result};
use pkgwatch::packages::{CombinedSource, InventorySource, PlatformSource, ShellListingSource};
use pkgwatch::platform::{PlatformSnapshot, SnapshotPlatform};
use pkgwatch::sync::Maintainer;
use pkgwatch::{AppStore, SyncConfig, SystemClock};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn cmd_sync(config: &SyncConfig, snapshot: &Path, keep_absent: bool) -> Result<()> {
    let platform = Arc::new(SnapshotPlatform::new(PlatformSnapshot::load(snapshot)?));
    let primary = PlatformSource::new(platform.clone(), platform, config.service_timeout())
        .with_archived(config.include_archived);
    let source = CombinedSource::new(primary, ShellListingSource::from_config(config));

    let records = Arc::new(
        source
            .fetch()
            .await
            .context("Failed to enumerate packages")?,
    );
    let contributions = source.contributions();
    info!(
        "Enumerated {} packages from {} ({} from the shell listing only)",
        records.len(),
        snapshot.display(),
        contributions.secondary_only
    );

    let store = Arc::new(AppStore::open(&config.db_path).context("Failed to open package database")?);

    let maintainer = Maintainer::new(store, Arc::new(SystemClock), config.diff_retention_days);

    if keep_absent || !contributions.is_complete() {
        if !keep_absent {
            warn!("Package listing may be incomplete, absent packages are kept");
        }
        let summary = maintainer.record(records, false).await?;
        println!(
            "Updated {} package(s), {} unchanged, {} corrupt",
            summary.upserted, summary.unchanged, summary.corrupt
        );
        return Ok(());
    }

    let report = maintainer.maintain(records).await?;

    println!(
        "Updated {} package(s), {} unchanged, {} corrupt",
        report.update.upserted, report.update.unchanged, report.update.corrupt
    );
    if report.update.bootstrap {
        println!("  Store was empty, wrote a full snapshot");
    }
    println!("  Removed: {}", report.removed);
    if let Some(rows) = report.diff_rows {
        println!("  Diff records written: {}", rows);
    }
    Ok(())
}
