// src/packages/stored.rs

//! Tertiary inventory source: the persistent record store

use super::{InventorySource, PackageRecord};
use crate::db::models::StoredApp;
use crate::error::Result;
use crate::store::{SafeAppStore, run_blocking};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Serves stored rows, bootstrapping from a full fetch when the store is empty
///
/// An unreadable store count is treated like an empty store.
pub struct StoredSource {
    store: SafeAppStore,
    primary: Arc<dyn InventorySource<Item = PackageRecord>>,
}

impl StoredSource {
    pub fn new(store: SafeAppStore, primary: Arc<dyn InventorySource<Item = PackageRecord>>) -> Self {
        Self { store, primary }
    }
}

#[async_trait]
impl InventorySource for StoredSource {
    type Item = StoredApp;

    async fn fetch(&self) -> Result<Vec<StoredApp>> {
        let store = self.store.clone();
        let count = run_blocking(move || store.count()).await?;

        if let Some(n) = count
            && n > 0
        {
            let store = self.store.clone();
            let apps = run_blocking(move || store.all()).await?;
            debug!("Serving {} stored apps", apps.len());
            return Ok(apps);
        }

        debug!(
            "Store empty or unreadable, full fetch from {}",
            self.primary.name()
        );
        let records = self.primary.fetch().await?;
        let apps: Vec<StoredApp> = records
            .iter()
            .filter_map(|record| match StoredApp::derive(record) {
                Ok(app) => Some(app),
                Err(e) => {
                    warn!("Skipping record: {}", e);
                    None
                }
            })
            .collect();

        let store = self.store.clone();
        let to_store = apps.clone();
        let written = run_blocking(move || store.upsert_many(&to_store)).await?;
        debug!("Persisted {} apps from full fetch", written);

        Ok(apps)
    }

    fn name(&self) -> &str {
        "stored"
    }
}
