// src/packages/record.rs

//! Raw package records as produced by an inventory source

use serde::{Deserialize, Serialize};

/// Installer flags reported by the package registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerFlags {
    /// Installed as part of the system image
    #[serde(default)]
    pub system: bool,
    /// Built as debuggable
    #[serde(default)]
    pub debuggable: bool,
}

impl InstallerFlags {
    pub fn user() -> Self {
        Self::default()
    }

    pub fn system() -> Self {
        Self {
            system: true,
            debuggable: false,
        }
    }
}

/// An installed package as observed by one enumeration call
///
/// Records are created per enumeration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub package_name: String,
    pub version_code: i64,
    #[serde(default)]
    pub version_name: String,
    /// Epoch milliseconds
    pub last_update_time: i64,
    /// Epoch milliseconds
    #[serde(default)]
    pub first_install_time: i64,
    #[serde(default)]
    pub flags: InstallerFlags,
    /// Base path first, then split paths
    #[serde(default)]
    pub apk_paths: Vec<String>,
    #[serde(default)]
    pub target_api: i32,
    #[serde(default)]
    pub min_api: i32,
    /// Package this one overlays, if it is an overlay
    #[serde(default)]
    pub overlay_target: Option<String>,
    /// Icon resource id; zero or negative means no usable icon
    #[serde(default)]
    pub icon_res: i32,
    #[serde(default)]
    pub archived: bool,
}

impl PackageRecord {
    pub fn new(package_name: impl Into<String>, version_code: i64, last_update_time: i64) -> Self {
        Self {
            package_name: package_name.into(),
            version_code,
            version_name: version_code.to_string(),
            last_update_time,
            first_install_time: last_update_time,
            flags: InstallerFlags::default(),
            apk_paths: Vec::new(),
            target_api: 0,
            min_api: 0,
            overlay_target: None,
            icon_res: 1,
            archived: false,
        }
    }

    /// Base package path, empty when unknown
    pub fn base_path(&self) -> &str {
        self.apk_paths.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_system(&self) -> bool {
        self.flags.system
    }
}
