// src/db/schema.rs

//! Database schema definitions and migrations for Transmute
//!
//! Migrations are applied in order and recorded in `schema_version`.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(Error::Config(format!("Unknown migration version: {version}"))),
    }
}

/// Initial schema - Version 1
///
/// - artifacts: one row per conversion job, holding the canonical output
/// - history_entries: re-conversion attempts against an artifact
///
/// Accepted history versions are unique per artifact; pending entries may
/// share a version until one of them is accepted.
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE artifacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            user_id INTEGER,
            name TEXT NOT NULL UNIQUE,
            conversion_kind TEXT NOT NULL CHECK(conversion_kind IN ('MISP_TO_STIX', 'STIX_TO_MISP')),
            description TEXT,
            input_text TEXT NOT NULL,
            output_text TEXT NOT NULL,
            public INTEGER NOT NULL DEFAULT 0,
            share_key TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX idx_artifacts_created_at ON artifacts(created_at);
        CREATE INDEX idx_artifacts_user_id ON artifacts(user_id);

        CREATE TABLE history_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            artifact_id INTEGER NOT NULL REFERENCES artifacts(id) ON DELETE CASCADE,
            user_id INTEGER,
            version INTEGER NOT NULL CHECK(version >= 2),
            status TEXT NOT NULL CHECK(status IN ('pending', 'accepted', 'rejected')),
            public INTEGER NOT NULL DEFAULT 0,
            input_text TEXT NOT NULL,
            old_output_text TEXT NOT NULL,
            new_output_text TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            decided_at TEXT
        );

        CREATE INDEX idx_history_artifact_version ON history_entries(artifact_id, version);
        CREATE UNIQUE INDEX idx_history_accepted_version
            ON history_entries(artifact_id, version) WHERE status = 'accepted';
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_migrate_fresh_database() {
        let (_temp, conn) = create_test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"artifacts".to_string()));
        assert!(tables.contains(&"history_entries".to_string()));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_unknown_migration_is_an_error() {
        let (_temp, conn) = create_test_db();
        assert!(apply_migration(&conn, 99).is_err());
    }
}
