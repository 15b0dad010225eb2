// src/commands/shell_list.rs
//! Run the shell package listing

use anyhow::Result;
use pkgwatch::SyncConfig;
use pkgwatch::packages::{InventorySource, ShellListingSource};

pub async fn cmd_shell_list(config: &SyncConfig) -> Result<()> {
    let source = ShellListingSource::from_config(config);
    let packages = source.fetch().await?;

    for package in &packages {
        match &package.path {
            Some(path) => println!("{}  {}", package.package_name, path),
            None => println!("{}", package.package_name),
        }
    }
    println!();
    println!("Total: {} package(s)", packages.len());
    Ok(())
}
