// src/sync/maintenance.rs

//! End-to-end maintenance routine
//!
//! One pass runs update, advances the maintenance watermark, checks for
//! removals and, when due, runs a diff pass. Passes are mutually
//! exclusive; overlapping callers wait for the running pass.

use super::diff::{self, AppDiff};
use super::reconcile::{Reconciler, UpdateSummary};
use crate::clock::Clock;
use crate::db::models::StoredApp;
use crate::db::models::setting::{LAST_MAINTENANCE_TIME, PACKAGE_CHANGED_DIFF_TIME};
use crate::error::Result;
use crate::packages::PackageRecord;
use crate::store::{AppStore, RecordStore, SafeAppStore, SettingsStore, run_blocking};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of one maintenance pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub update: UpdateSummary,
    pub removed: usize,
    /// Maintenance watermark after the pass, `None` when not advanced
    pub last_maintenance_time: Option<i64>,
    /// Diff rows recorded, `None` when no diff pass ran
    pub diff_rows: Option<usize>,
}

pub struct Maintainer {
    store: Arc<AppStore>,
    reconciler: Reconciler,
    settings: SettingsStore,
    clock: Arc<dyn Clock>,
    retention_days: i64,
    guard: Mutex<()>,
}

impl Maintainer {
    pub fn new(store: Arc<AppStore>, clock: Arc<dyn Clock>, retention_days: i64) -> Self {
        let reconciler = Reconciler::new(SafeAppStore::new(store.clone()));
        let settings = SettingsStore::new(store.clone());
        Self {
            store,
            reconciler,
            settings,
            clock,
            retention_days,
            guard: Mutex::new(()),
        }
    }

    /// Update the store from one enumeration under the maintenance guard
    ///
    /// With `remove_absent` the enumeration is treated as complete and
    /// absent rows are removed once the update succeeded.
    pub async fn record(
        &self,
        fresh: Arc<Vec<PackageRecord>>,
        remove_absent: bool,
    ) -> Result<UpdateSummary> {
        let _guard = self.guard.lock().await;
        let reconciler = self.reconciler.clone();
        run_blocking(move || {
            let summary = reconciler.update(fresh.as_slice());
            if remove_absent && summary.succeeded() {
                reconciler.check_removal(fresh.as_slice());
            }
            summary
        })
        .await
    }

    /// Reconcile a full enumeration into the store
    pub async fn maintain(&self, fresh: Arc<Vec<PackageRecord>>) -> Result<MaintenanceReport> {
        let _guard = self.guard.lock().await;
        let mut report = MaintenanceReport::default();

        let reconciler = self.reconciler.clone();
        let records = fresh.clone();
        report.update = run_blocking(move || reconciler.update(records.as_slice())).await?;

        if report.update.succeeded() {
            let settings = self.settings.clone();
            let now = self.clock.now_millis();
            match run_blocking(move || settings.advance(LAST_MAINTENANCE_TIME, now)).await? {
                Ok(time) => report.last_maintenance_time = Some(time),
                Err(e) => warn!("Failed to advance maintenance time: {}", e),
            }
        } else {
            warn!("Update failed, maintenance time not advanced");
        }

        tokio::task::yield_now().await;

        let reconciler = self.reconciler.clone();
        let records = fresh.clone();
        report.removed = run_blocking(move || reconciler.check_removal(records.as_slice())).await?;

        tokio::task::yield_now().await;

        report.diff_rows = self.diff_if_due(fresh).await?;

        info!(
            "Maintenance done: {} updated, {} removed",
            report.update.upserted, report.removed
        );
        Ok(report)
    }

    async fn diff_if_due(&self, fresh: Arc<Vec<PackageRecord>>) -> Result<Option<usize>> {
        let settings = self.settings.clone();
        let last_diff = match run_blocking(move || settings.get(PACKAGE_CHANGED_DIFF_TIME)).await? {
            Ok(time) => time,
            Err(e) => {
                warn!("Failed to read diff time: {}", e);
                return Ok(None);
            }
        };

        let now = self.clock.now_millis();
        let due = diff::should_diff(now, last_diff, &mut rand::thread_rng());
        if !due {
            debug!("Diff pass not due");
            return Ok(None);
        }

        let store = self.store.clone();
        let retention_days = self.retention_days;
        let outcome = run_blocking(move || -> Result<usize> {
            let fresh_apps: Vec<StoredApp> = fresh
                .iter()
                .filter_map(|record| StoredApp::derive(record).ok())
                .collect();
            let stored = store.all()?;
            let diff: AppDiff = diff::detect_diff(&fresh_apps, &stored);
            let rows = diff::record_diff(&store, &diff, now, retention_days)?;
            diff::apply_diff(&store, &diff)?;
            Ok(rows)
        })
        .await?;

        match outcome {
            Ok(rows) => Ok(Some(rows)),
            Err(e) => {
                warn!("Diff pass failed: {}", e);
                Ok(None)
            }
        }
    }
}
