// src/packages/cache.rs

//! Time-bounded inventory cache
//!
//! Wraps a source with a single cached result. A result younger than the
//! freshness window is served as is; anything older triggers a new fetch.
//! Callers are serialized on the slot, so a burst of requests results in
//! one fetch.

use super::InventorySource;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct Slot<T> {
    value: Arc<Vec<T>>,
    fetched_at: Instant,
}

pub struct CachedSource<S: InventorySource> {
    source: S,
    window: Duration,
    slot: Mutex<Option<Slot<S::Item>>>,
}

impl<S: InventorySource> CachedSource<S> {
    pub fn new(source: S, window: Duration) -> Self {
        Self {
            source,
            window,
            slot: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.source
    }

    /// Cached inventory, fetched anew when older than the window
    ///
    /// A failed fetch leaves any previous slot untouched.
    pub async fn get_all(&self) -> Result<Arc<Vec<S::Item>>> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref()
            && cached.fetched_at.elapsed() <= self.window
        {
            debug!("Serving cached {} inventory", self.source.name());
            return Ok(cached.value.clone());
        }

        let value = Arc::new(self.source.fetch().await?);
        *slot = Some(Slot {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    /// Drop the cached result; the next call fetches regardless of age
    pub async fn release(&self) {
        self.slot.lock().await.take();
    }

    /// Drop the cached result unless a fetch is in progress
    ///
    /// For memory-pressure callbacks that must not wait.
    pub fn try_release(&self) -> bool {
        match self.slot.try_lock() {
            Ok(mut slot) => {
                slot.take();
                true
            }
            Err(_) => false,
        }
    }
}

#[async_trait]
impl<S: InventorySource> InventorySource for CachedSource<S> {
    type Item = S::Item;

    async fn fetch(&self) -> Result<Vec<S::Item>> {
        Ok(self.get_all().await?.as_ref().clone())
    }

    fn name(&self) -> &str {
        self.source.name()
    }

    fn last_fetch_confirmed(&self) -> bool {
        self.source.last_fetch_confirmed()
    }
}
