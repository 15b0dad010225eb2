// src/packages/recording.rs

//! Persist-on-fetch decorator
//!
//! Wraps a record source so every successful fetch is also reconciled into
//! the store in the background. The fetch result is returned without
//! waiting for its own store write. Writes go through the
//! [`Maintainer`] guard and are applied in fetch order, so a slow write of
//! an older listing can never remove rows a newer one added.

use super::{InventorySource, PackageRecord};
use crate::error::Result;
use crate::sync::Maintainer;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct RecordingSource<S> {
    inner: S,
    maintainer: Arc<Maintainer>,
    /// The inner source enumerates everything, so absent rows may be removed
    full_listing: bool,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<S> RecordingSource<S>
where
    S: InventorySource<Item = PackageRecord>,
{
    pub fn new(inner: S, maintainer: Arc<Maintainer>) -> Self {
        Self {
            inner,
            maintainer,
            full_listing: false,
            pending: Mutex::new(None),
        }
    }

    /// Also run removal checks after each update
    pub fn full_listing(mut self, full_listing: bool) -> Self {
        self.full_listing = full_listing;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Wait for the most recent background write to finish
    pub async fn flush(&self) {
        let handle = self.pending.lock().await.take();
        settle(handle).await;
    }
}

async fn settle(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle
        && let Err(e) = handle.await
    {
        warn!("Background record write failed: {}", e);
    }
}

#[async_trait]
impl<S> InventorySource for RecordingSource<S>
where
    S: InventorySource<Item = PackageRecord>,
{
    type Item = PackageRecord;

    async fn fetch(&self) -> Result<Vec<PackageRecord>> {
        let records = self.inner.fetch().await?;

        // Held until the new write is tracked so concurrent fetches queue here
        let mut pending = self.pending.lock().await;
        settle(pending.take()).await;

        let maintainer = self.maintainer.clone();
        let snapshot = Arc::new(records.clone());
        let full_listing = self.full_listing;
        *pending = Some(tokio::spawn(async move {
            match maintainer.record(snapshot, full_listing).await {
                Ok(summary) => debug!("Recorded {} packages", summary.upserted),
                Err(e) => warn!("Failed to record fetched packages: {}", e),
            }
        }));

        Ok(records)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn last_fetch_confirmed(&self) -> bool {
        self.inner.last_fetch_confirmed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::models::StoredApp;
    use crate::store::{AppStore, RecordStore};

    struct FixedSource(std::sync::Mutex<Vec<PackageRecord>>);

    impl FixedSource {
        fn new(records: Vec<PackageRecord>) -> Self {
            Self(std::sync::Mutex::new(records))
        }

        fn set(&self, records: Vec<PackageRecord>) {
            *self.0.lock().unwrap() = records;
        }
    }

    #[async_trait]
    impl InventorySource for FixedSource {
        type Item = PackageRecord;

        async fn fetch(&self) -> Result<Vec<PackageRecord>> {
            Ok(self.0.lock().unwrap().clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn maintainer() -> (Arc<AppStore>, Arc<Maintainer>) {
        let store = Arc::new(AppStore::open_in_memory().unwrap());
        let maintainer = Maintainer::new(store.clone(), Arc::new(ManualClock::new(1)), 60);
        (store, Arc::new(maintainer))
    }

    fn names(store: &AppStore) -> Vec<String> {
        store
            .all()
            .unwrap()
            .into_iter()
            .map(|a| a.package_name)
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_persists_records() {
        let (store, maintainer) = maintainer();
        store
            .upsert(&StoredApp::derive(&PackageRecord::new("com.gone", 1, 1)).unwrap())
            .unwrap();

        let source = RecordingSource::new(
            FixedSource::new(vec![PackageRecord::new("com.a", 1, 10)]),
            maintainer,
        )
        .full_listing(true);

        let records = source.fetch().await.unwrap();
        assert_eq!(records.len(), 1);

        source.flush().await;
        assert_eq!(names(&store), vec!["com.a"]);
    }

    #[tokio::test]
    async fn test_back_to_back_fetches_keep_newest_listing() {
        let (store, maintainer) = maintainer();
        store
            .upsert(&StoredApp::derive(&PackageRecord::new("com.a", 1, 1)).unwrap())
            .unwrap();

        let source = RecordingSource::new(
            FixedSource::new(vec![PackageRecord::new("com.a", 1, 1)]),
            maintainer,
        )
        .full_listing(true);

        source.fetch().await.unwrap();
        source.inner().set(vec![
            PackageRecord::new("com.a", 1, 1),
            PackageRecord::new("com.x", 1, 2),
        ]);
        source.fetch().await.unwrap();
        source.flush().await;

        assert_eq!(names(&store), vec!["com.a", "com.x"]);
    }
}
