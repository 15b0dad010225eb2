// src/packages/source.rs

//! Inventory source trait
//!
//! A source produces one inventory per call. Sources are polymorphic over
//! the kind of item they yield: the platform registry yields full package
//! records, the shell listing yields identifiers with optional paths, and
//! the stored source yields persisted rows.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait InventorySource: Send + Sync {
    type Item: Clone + Send + Sync + 'static;

    /// Enumerate the current inventory
    ///
    /// Fails with `PermissionDenied` or `SourceUnavailable`.
    async fn fetch(&self) -> Result<Vec<Self::Item>>;

    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// Whether the most recent fetch could see every package
    ///
    /// Sources that may be silently restricted override this.
    fn last_fetch_confirmed(&self) -> bool {
        true
    }
}
