// src/packages/mod.rs

//! Inventory sources for pkgwatch
//!
//! Each source implements [`InventorySource`]. The platform source is the
//! primary one; the shell listing catches packages the registry hides; the
//! stored source serves what was persisted. [`CombinedSource`] fetches the
//! first two together. [`CachedSource`] and [`RecordingSource`] wrap any
//! source.

pub mod cache;
pub mod combined;
pub mod record;
pub mod recording;
pub mod registry;
pub mod shell;
pub mod source;
pub mod stored;

pub use cache::CachedSource;
pub use combined::{CombinedSource, Contributions, path_only_record};
pub use record::{InstallerFlags, PackageRecord};
pub use recording::RecordingSource;
pub use registry::PlatformSource;
pub use shell::{ShellListingSource, ShellPackage, parse_shell_package};
pub use source::InventorySource;
pub use stored::StoredSource;
