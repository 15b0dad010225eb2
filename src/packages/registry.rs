// src/packages/registry.rs

//! Primary inventory source: the OS package registry

use super::{InventorySource, PackageRecord};
use crate::error::{Error, Result};
use crate::platform::{CapabilityCheck, PackageRegistry, QueryFlags};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Lists installed packages through [`PackageRegistry`]
///
/// The query is issued even when bulk visibility is not confirmed; some
/// platforms silently restrict the result set instead of refusing. Whether
/// the last fetch had the capability is available from
/// [`InventorySource::last_fetch_confirmed`].
pub struct PlatformSource {
    registry: Arc<dyn PackageRegistry>,
    capability: Arc<dyn CapabilityCheck>,
    include_archived: bool,
    timeout: Duration,
    permission_confirmed: AtomicBool,
}

impl PlatformSource {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        capability: Arc<dyn CapabilityCheck>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            capability,
            include_archived: false,
            timeout,
            permission_confirmed: AtomicBool::new(false),
        }
    }

    /// Make a second pass for archived packages
    pub fn with_archived(mut self, include_archived: bool) -> Self {
        self.include_archived = include_archived;
        self
    }

    async fn list(&self, flags: QueryFlags) -> Result<Vec<PackageRecord>> {
        match tokio::time::timeout(self.timeout, self.registry.list_packages(flags)).await {
            Ok(result) => result,
            Err(_) => Err(Error::SourceUnavailable(format!(
                "package registry did not answer within {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl InventorySource for PlatformSource {
    type Item = PackageRecord;

    async fn fetch(&self) -> Result<Vec<PackageRecord>> {
        let confirmed = self.capability.has_bulk_visibility();
        if !confirmed {
            debug!("Bulk package visibility not granted, results may be incomplete");
        }
        self.permission_confirmed.store(confirmed, Ordering::SeqCst);

        let mut packages = self.list(QueryFlags::default()).await?;
        debug!("{} listed {} packages", self.name(), packages.len());

        if self.include_archived {
            match self.list(QueryFlags::archived()).await {
                Ok(all) => {
                    let seen: HashSet<String> =
                        packages.iter().map(|p| p.package_name.clone()).collect();
                    let archived: Vec<PackageRecord> = all
                        .into_iter()
                        .filter(|p| p.archived && !seen.contains(&p.package_name))
                        .collect();
                    debug!("Found {} archived packages", archived.len());
                    packages.extend(archived);
                }
                Err(e) => warn!("Archived package pass failed: {}", e),
            }
        }

        Ok(packages)
    }

    fn name(&self) -> &str {
        "platform"
    }

    /// Whether bulk visibility was confirmed for the most recent fetch
    fn last_fetch_confirmed(&self) -> bool {
        self.permission_confirmed.load(Ordering::SeqCst)
    }
}
