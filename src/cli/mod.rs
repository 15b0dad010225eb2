// src/cli/mod.rs
//! CLI definitions for pkgwatch
//!
//! Command implementations live in the `commands` module. Every command
//! that needs platform data reads it from a JSON snapshot captured on the
//! device.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pkgwatch")]
#[command(version)]
#[command(about = "Installed-package inventory sync and change classification", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database file, overrides the configuration
    #[arg(short, long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and apply the schema
    Init,

    /// Reconcile the store with a platform snapshot
    Sync {
        /// Platform snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Skip removal of packages missing from the snapshot
        #[arg(long)]
        keep_absent: bool,
    },

    /// Classify changes within a session
    Updates {
        /// Platform snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Logical session timestamp chosen by the consumer
        #[arg(long)]
        session: i64,

        /// Maximum number of changed packages to classify
        #[arg(long, default_value = "30")]
        changed_limit: usize,

        /// Maximum number of recently used packages to show
        #[arg(long, default_value = "10")]
        used_limit: usize,
    },

    /// List stored packages
    List {
        /// Only list one unit
        #[arg(short, long, value_enum)]
        unit: Option<UnitArg>,
    },

    /// Show maintenance diff records
    Diffs {
        /// Only records at or after this epoch-millisecond time
        #[arg(long, default_value = "0")]
        since: i64,
    },

    /// Run the staged loader over a snapshot and print each batch
    Load {
        /// Platform snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Run the configured shell listing and print the packages found
    ShellList,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum UnitArg {
    User,
    System,
    Archive,
}
