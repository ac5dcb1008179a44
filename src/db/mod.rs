// src/db/mod.rs

//! SQLite persistence for artifacts and their history
//!
//! All writes that must be atomic go through [`transaction`], which opens an
//! IMMEDIATE transaction so concurrent writers serialize on the database
//! write lock instead of failing late on commit.

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a connection waits for another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the database file (and its directory) and bring the schema up to date
pub fn init(db_path: impl AsRef<Path>) -> Result<()> {
    let db_path = db_path.as_ref();
    info!("Initializing database at {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    debug!("Journal mode: {}", mode);
    schema::migrate(&conn)?;

    info!("Database initialized");
    Ok(())
}

/// Open an existing database
pub fn open(db_path: impl AsRef<Path>) -> Result<Connection> {
    let db_path = db_path.as_ref();
    if !db_path.exists() {
        return Err(Error::NotFound(format!(
            "database {} (run `transmute init` first)",
            db_path.display()
        )));
    }

    debug!("Opening database {}", db_path.display());
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Per-connection settings
pub fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// Run `f` inside an IMMEDIATE transaction
///
/// Commits when `f` returns `Ok`; rolls back on any error.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match f(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_directory_and_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("transmute.db");

        init(&path).unwrap();
        let conn = open(&path).unwrap();
        assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);

        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_open_missing_database() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(open(dir.path().join("absent.db")), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        init(&path).unwrap();
        let mut conn = open(&path).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute("CREATE TABLE scratch (x INTEGER)", [])?;
            tx.execute("INSERT INTO scratch (x) VALUES (1)", [])?;
            Err(Error::Config("abort".to_string()))
        });
        assert!(result.is_err());

        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'scratch'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(exists, 0);
    }
}
