// src/commands/diffs.rs
//! Show maintenance diff records

use anyhow::{Context, Result};
use pkgwatch::SyncConfig;
use pkgwatch::db::models::{DiffChange, DiffType};

pub fn cmd_diffs(config: &SyncConfig, since: i64) -> Result<()> {
    let conn = pkgwatch::db::open(&config.db_path).context("Failed to open package database")?;
    let changes = DiffChange::list_since(&conn, since)?;

    if changes.is_empty() {
        println!("No diff records.");
        return Ok(());
    }

    let mut current_diff = "";
    for change in &changes {
        if change.diff_id != current_diff {
            current_diff = &change.diff_id;
            println!("Diff {}:", current_diff);
        }
        match change.change_type {
            DiffType::None => println!("  (no changes)"),
            DiffType::Add | DiffType::Remove => {
                println!("  {:6} {}", change.change_type.as_ref(), change.package_name)
            }
            DiffType::Change => println!(
                "  {:6} {} {}: {} -> {}",
                change.change_type.as_ref(),
                change.package_name,
                change.column_name,
                change.old_value,
                change.new_value
            ),
        }
    }
    Ok(())
}
