// src/platform/mod.rs

//! Boundary to the host platform
//!
//! The engine never talks to the operating system directly. Package
//! enumeration, capability checks, usage statistics, launcher and label
//! resolution are reached through these traits and injected by the caller.

mod snapshot;

pub use snapshot::{PlatformSnapshot, SnapshotPlatform};

use crate::error::Result;
use crate::packages::PackageRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Flags for a registry listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFlags {
    /// Include packages whose code has been archived
    pub include_archived: bool,
    /// Include special system components (apex)
    pub include_special: bool,
}

impl QueryFlags {
    pub fn archived() -> Self {
        Self {
            include_archived: true,
            include_special: false,
        }
    }
}

/// Packages reported changed since a sequence number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedPackages {
    pub sequence_number: i64,
    pub package_names: Vec<String>,
}

/// Last foreground use of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub package_name: String,
    /// Epoch milliseconds, zero or negative when never used
    pub last_used: i64,
}

/// OS package registry
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Enumerate installed packages
    ///
    /// Fails with `PermissionDenied` when the platform refuses the query.
    async fn list_packages(&self, flags: QueryFlags) -> Result<Vec<PackageRecord>>;

    /// Look up one package, `None` when it is not installed
    async fn get_package(&self, name: &str) -> Result<Option<PackageRecord>>;

    /// Packages changed since `sequence`, `None` when unsupported
    async fn changed_packages(&self, sequence: i64) -> Result<Option<ChangedPackages>>;

    /// Boots since the device was set up; change sequence numbers restart
    /// with every boot
    fn boot_count(&self) -> i64 {
        0
    }
}

/// Capability checks
pub trait CapabilityCheck: Send + Sync {
    /// Whether every installed package is visible to queries
    fn has_bulk_visibility(&self) -> bool;

    /// Whether usage statistics may be read
    fn has_usage_access(&self) -> bool;
}

/// Foreground usage statistics
#[async_trait]
pub trait UsageStatsSource: Send + Sync {
    /// Packages used within the last `window_ms` milliseconds
    async fn query_recently_used(&self, window_ms: i64) -> Result<Vec<UsageEntry>>;
}

/// Entry point resolution
#[async_trait]
pub trait LauncherResolver: Send + Sync {
    /// Launcher activity of a package, `None` when it has no entry point
    async fn resolve_launcher_activity(&self, name: &str) -> Option<String>;

    /// Package of the current default home app
    async fn resolve_default_launcher(&self) -> Option<String>;
}

/// Display labels
#[async_trait]
pub trait LabelResolver: Send + Sync {
    async fn load_label(&self, name: &str) -> Option<String>;
}

/// Every platform collaborator, as shared trait objects
#[derive(Clone)]
pub struct PlatformHandles {
    pub registry: Arc<dyn PackageRegistry>,
    pub capability: Arc<dyn CapabilityCheck>,
    pub usage: Arc<dyn UsageStatsSource>,
    pub launcher: Arc<dyn LauncherResolver>,
    pub labels: Arc<dyn LabelResolver>,
}

impl PlatformHandles {
    /// Handles backed by one value implementing every trait
    pub fn from_shared<P>(platform: Arc<P>) -> Self
    where
        P: PackageRegistry
            + CapabilityCheck
            + UsageStatsSource
            + LauncherResolver
            + LabelResolver
            + 'static,
    {
        Self {
            registry: platform.clone(),
            capability: platform.clone(),
            usage: platform.clone(),
            launcher: platform.clone(),
            labels: platform,
        }
    }
}
