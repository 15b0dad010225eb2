// src/db/mod.rs

//! Database layer for pkgwatch
//!
//! SQLite holds the app metadata table, scalar settings and maintenance
//! diff records. Schema creation and upgrades live in [`schema`].

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Create the database file (and parent directory) and apply the schema
pub fn init(db_path: impl AsRef<Path>) -> Result<()> {
    let db_path = db_path.as_ref();
    info!("Initializing database at {}", db_path.display());

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::InitError(format!(
                "Failed to create database directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let conn = open_raw(db_path)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open an existing database, migrating it to the current schema
pub fn open(db_path: impl AsRef<Path>) -> Result<Connection> {
    let conn = open_raw(db_path.as_ref())?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Open an in-memory database with the current schema
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| Error::InitError(format!("Failed to open in-memory database: {e}")))?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

fn open_raw(db_path: &Path) -> Result<Connection> {
    debug!("Opening database {}", db_path.display());
    let conn = Connection::open(db_path).map_err(|e| {
        Error::InitError(format!("Failed to open database {}: {e}", db_path.display()))
    })?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    // WAL is unavailable for in-memory databases; ignore the returned mode
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

/// Run `f` inside a transaction, committing on success
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_parent_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("pkgwatch.db");

        init(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = open(&db_path).unwrap();
        let version = schema::get_schema_version(&conn).unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut conn = open_in_memory().unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO settings (key, value) VALUES ('k', 1)",
                [],
            )?;
            Err(Error::StorageFailure("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
