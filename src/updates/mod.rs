// src/updates/mod.rs

//! Change classification engine
//!
//! Detects which packages changed since the session watermark, buckets
//! them against their previous stored rows and adds the recently used
//! packages.

pub mod checker;
pub mod classifier;
pub mod detector;
pub mod session;
pub mod used;

pub use checker::{PackageListChanges, UpdatesChecker, UsedListChanges};
pub use classifier::{AppUpgrade, Classifier, UpdateCategory, UpdateLists, UpdatedApp, classify};
pub use detector::{PackageChanges, PackageUpdateDetector, changed_package_names};
pub use session::{ChangeTracker, UpdatesSession};
pub use used::UsedPackages;
