// src/packages/combined.rs

//! Registry and shell listing in one inventory
//!
//! Both sub-sources are started together and awaited side by side. A
//! failing sub-source contributes nothing. Identifiers only the shell
//! listing reports are appended as path-only records after the registry's.

use super::{InventorySource, PackageRecord, ShellPackage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Which sub-sources contributed to a fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contributions {
    pub primary: bool,
    pub secondary: bool,
    /// Bulk visibility was confirmed for the primary fetch
    pub confirmed: bool,
    /// Records known from the shell listing only
    pub secondary_only: usize,
}

impl Contributions {
    /// Whether absent packages can be treated as uninstalled
    pub fn is_complete(&self) -> bool {
        self.primary && self.confirmed
    }
}

/// Record for a package the registry did not report
///
/// Only the identifier and possibly the base path are known.
pub fn path_only_record(package: ShellPackage) -> PackageRecord {
    let mut record = PackageRecord::new(package.package_name, 0, 0);
    record.version_name = String::new();
    record.icon_res = 0;
    record.apk_paths = package.path.into_iter().collect();
    record
}

pub struct CombinedSource<P, S> {
    primary: P,
    secondary: S,
    last: Mutex<Contributions>,
}

impl<P, S> CombinedSource<P, S>
where
    P: InventorySource<Item = PackageRecord>,
    S: InventorySource<Item = ShellPackage>,
{
    pub fn new(primary: P, secondary: S) -> Self {
        Self {
            primary,
            secondary,
            last: Mutex::new(Contributions::default()),
        }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// Contributions of the most recent fetch
    pub fn contributions(&self) -> Contributions {
        self.last.lock().map(|c| *c).unwrap_or_default()
    }
}

#[async_trait]
impl<P, S> InventorySource for CombinedSource<P, S>
where
    P: InventorySource<Item = PackageRecord>,
    S: InventorySource<Item = ShellPackage>,
{
    type Item = PackageRecord;

    async fn fetch(&self) -> Result<Vec<PackageRecord>> {
        let (primary, secondary) = tokio::join!(self.primary.fetch(), self.secondary.fetch());

        let mut contributions = Contributions::default();
        let mut records = match primary {
            Ok(records) => {
                contributions.primary = true;
                contributions.confirmed = self.primary.last_fetch_confirmed();
                records
            }
            Err(e) => {
                warn!("{} contributed nothing: {}", self.primary.name(), e);
                Vec::new()
            }
        };

        match secondary {
            Ok(packages) => {
                contributions.secondary = true;
                let mut seen: HashSet<String> =
                    records.iter().map(|r| r.package_name.clone()).collect();
                for package in packages {
                    if seen.insert(package.package_name.clone()) {
                        records.push(path_only_record(package));
                        contributions.secondary_only += 1;
                    }
                }
            }
            Err(e) => warn!("{} contributed nothing: {}", self.secondary.name(), e),
        }

        if let Ok(mut last) = self.last.lock() {
            *last = contributions;
        }

        if !contributions.primary && !contributions.secondary {
            return Err(Error::SourceUnavailable(
                "no inventory source answered".to_string(),
            ));
        }

        debug!(
            "Combined inventory: {} packages, {} from {} only",
            records.len(),
            contributions.secondary_only,
            self.secondary.name()
        );
        Ok(records)
    }

    fn name(&self) -> &str {
        "combined"
    }

    fn last_fetch_confirmed(&self) -> bool {
        self.contributions().is_complete()
    }
}
