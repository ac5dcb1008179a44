// src/db/models/history.rs

//! History entry model - one re-conversion attempt against an artifact
//!
//! Version 1 of an artifact is its original output, so entries start at 2.

use super::{Artifact, invalid_column};
use crate::error::{Error, Result};
use crate::hash::pair_fingerprint;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use std::str::FromStr;

/// Version number of the first history entry of an artifact
pub const FIRST_HISTORY_VERSION: i64 = 2;

const COLUMNS: &str = "id, uuid, artifact_id, user_id, version, status, public, input_text, \
                       old_output_text, new_output_text, fingerprint, comment, created_at, decided_at";

/// History entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Pending,
    Accepted,
    Rejected,
}

/// What a requested status change amounts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status changes; for acceptance the output is promoted
    Apply,
    /// Accepting an accepted entry copies its output again; the ledger
    /// allows this only for the latest accepted entry
    Reapply,
    /// Rejecting a rejected entry changes nothing
    Unchanged,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &str {
        match self {
            HistoryStatus::Pending => "pending",
            HistoryStatus::Accepted => "accepted",
            HistoryStatus::Rejected => "rejected",
        }
    }

    /// Transition table
    ///
    /// | from     | to accepted | to rejected |
    /// |----------|-------------|-------------|
    /// | pending  | Apply       | Apply       |
    /// | accepted | Reapply     | error       |
    /// | rejected | error       | Unchanged   |
    ///
    /// Nothing moves an entry back to pending.
    pub fn transition(self, target: HistoryStatus) -> Result<Transition> {
        use HistoryStatus::*;
        match (self, target) {
            (Pending, Accepted) | (Pending, Rejected) => Ok(Transition::Apply),
            (Accepted, Accepted) => Ok(Transition::Reapply),
            (Rejected, Rejected) => Ok(Transition::Unchanged),
            (from, to) => Err(Error::InvalidTransition(format!(
                "{} -> {}",
                from.as_str(),
                to.as_str()
            ))),
        }
    }
}

impl FromStr for HistoryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(HistoryStatus::Pending),
            "accepted" => Ok(HistoryStatus::Accepted),
            "rejected" => Ok(HistoryStatus::Rejected),
            _ => Err(format!("Invalid history status: {s}")),
        }
    }
}

/// One re-conversion attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: Option<i64>,
    pub uuid: String,
    pub artifact_id: i64,
    pub user_id: Option<i64>,
    pub version: i64,
    pub status: HistoryStatus,
    pub public: bool,
    /// Artifact input at the time of the attempt
    pub input_text: String,
    /// Artifact output at the time of the attempt
    pub old_output_text: String,
    pub new_output_text: String,
    #[serde(skip_serializing)]
    pub fingerprint: String,
    pub comment: Option<String>,
    pub created_at: String,
    pub decided_at: Option<String>,
}

impl HistoryEntry {
    /// New pending entry snapshotting the artifact's input and output
    pub fn new(
        artifact: &Artifact,
        user_id: Option<i64>,
        version: i64,
        new_output_text: String,
        comment: Option<String>,
    ) -> Result<Self> {
        let artifact_id = artifact
            .id
            .ok_or_else(|| Error::NotFound("artifact has not been stored".to_string()))?;

        Ok(Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            artifact_id,
            user_id,
            version,
            status: HistoryStatus::Pending,
            public: artifact.public,
            input_text: artifact.input_text.clone(),
            old_output_text: artifact.output_text.clone(),
            fingerprint: pair_fingerprint(&artifact.input_text, &new_output_text),
            new_output_text,
            comment,
            created_at: super::timestamp(),
            decided_at: None,
        })
    }

    /// Same (input, output) pair after trimming
    ///
    /// The fingerprint is a fast reject; the strings decide.
    pub fn records_same_result(&self, input_text: &str, new_output_text: &str) -> bool {
        self.fingerprint == pair_fingerprint(input_text, new_output_text)
            && self.input_text.trim() == input_text.trim()
            && self.new_output_text.trim() == new_output_text.trim()
    }

    /// Insert this entry into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO history_entries (uuid, artifact_id, user_id, version, status, public,
                                          input_text, old_output_text, new_output_text,
                                          fingerprint, comment, created_at, decided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                &self.uuid,
                self.artifact_id,
                self.user_id,
                self.version,
                self.status.as_str(),
                self.public,
                &self.input_text,
                &self.old_output_text,
                &self.new_output_text,
                &self.fingerprint,
                &self.comment,
                &self.created_at,
                &self.decided_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an entry by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM history_entries WHERE id = ?1"))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find an entry by its external UUID
    pub fn find_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM history_entries WHERE uuid = ?1"))?;
        Ok(stmt.query_row([uuid], Self::from_row).optional()?)
    }

    /// Most recent accepted entry of an artifact
    pub fn frontier(conn: &Connection, artifact_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM history_entries
             WHERE artifact_id = ?1 AND status = 'accepted'
             ORDER BY version DESC LIMIT 1"
        ))?;
        Ok(stmt.query_row([artifact_id], Self::from_row).optional()?)
    }

    /// Highest-versioned entry of any status, newest first on ties
    pub fn latest(conn: &Connection, artifact_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM history_entries
             WHERE artifact_id = ?1
             ORDER BY version DESC, id DESC LIMIT 1"
        ))?;
        Ok(stmt.query_row([artifact_id], Self::from_row).optional()?)
    }

    /// Accepted entries, oldest version first
    pub fn list_accepted(conn: &Connection, artifact_id: i64) -> Result<Vec<Self>> {
        Self::query_list(
            conn,
            &format!(
                "SELECT {COLUMNS} FROM history_entries
                 WHERE artifact_id = ?1 AND status = 'accepted'
                 ORDER BY version ASC"
            ),
            artifact_id,
        )
    }

    /// Every entry, newest version first
    pub fn list_all(conn: &Connection, artifact_id: i64) -> Result<Vec<Self>> {
        Self::query_list(
            conn,
            &format!(
                "SELECT {COLUMNS} FROM history_entries
                 WHERE artifact_id = ?1
                 ORDER BY version DESC, id DESC"
            ),
            artifact_id,
        )
    }

    /// Pending entries, oldest first
    pub fn list_pending(conn: &Connection, artifact_id: i64) -> Result<Vec<Self>> {
        Self::query_list(
            conn,
            &format!(
                "SELECT {COLUMNS} FROM history_entries
                 WHERE artifact_id = ?1 AND status = 'pending'
                 ORDER BY id ASC"
            ),
            artifact_id,
        )
    }

    pub fn count_for(conn: &Connection, artifact_id: i64) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM history_entries WHERE artifact_id = ?1",
            [artifact_id],
            |row| row.get(0),
        )?)
    }

    fn query_list(conn: &Connection, sql: &str, artifact_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map([artifact_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Record a decision
    pub(crate) fn update_status(
        &mut self,
        conn: &Connection,
        status: HistoryStatus,
        decided_at: &str,
    ) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::NotFound("history entry has not been stored".to_string()))?;
        conn.execute(
            "UPDATE history_entries SET status = ?1, decided_at = ?2 WHERE id = ?3",
            params![status.as_str(), decided_at, id],
        )?;
        self.status = status;
        self.decided_at = Some(decided_at.to_string());
        Ok(())
    }

    /// Move a pending entry to another version number
    pub(crate) fn update_version(&mut self, conn: &Connection, version: i64) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::NotFound("history entry has not been stored".to_string()))?;
        conn.execute(
            "UPDATE history_entries SET version = ?1 WHERE id = ?2",
            params![version, id],
        )?;
        self.version = version;
        Ok(())
    }

    /// Convert a database row to a HistoryEntry
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(5)?;
        let status = status_str
            .parse::<HistoryStatus>()
            .map_err(|e| invalid_column(5, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            artifact_id: row.get(2)?,
            user_id: row.get(3)?,
            version: row.get(4)?,
            status,
            public: row.get(6)?,
            input_text: row.get(7)?,
            old_output_text: row.get(8)?,
            new_output_text: row.get(9)?,
            fingerprint: row.get(10)?,
            comment: row.get(11)?,
            created_at: row.get(12)?,
            decided_at: row.get(13)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamingConfig;
    use crate::conversion::ConversionKind;
    use crate::db::models::NewArtifact;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection, Artifact) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        let artifact = Artifact::create(
            &conn,
            NewArtifact::new(ConversionKind::StixToMisp, "{\"a\":1}".to_string(), "out-v1".to_string()),
            &NamingConfig::default(),
        )
        .unwrap();
        (temp_file, conn, artifact)
    }

    #[test]
    fn test_transition_table() {
        use HistoryStatus::*;
        assert_eq!(Pending.transition(Accepted).unwrap(), Transition::Apply);
        assert_eq!(Pending.transition(Rejected).unwrap(), Transition::Apply);
        assert_eq!(Accepted.transition(Accepted).unwrap(), Transition::Reapply);
        assert_eq!(Rejected.transition(Rejected).unwrap(), Transition::Unchanged);
        assert!(matches!(Rejected.transition(Accepted), Err(Error::InvalidTransition(_))));
        assert!(Accepted.transition(Rejected).is_err());
        assert!(Accepted.transition(Pending).is_err());
        assert!(Pending.transition(Pending).is_err());
    }

    #[test]
    fn test_entry_snapshots_artifact() {
        let (_temp, conn, artifact) = create_test_db();
        let mut entry =
            HistoryEntry::new(&artifact, Some(3), 2, "out-v2".to_string(), Some("note".to_string())).unwrap();
        let id = entry.insert(&conn).unwrap();

        let found = HistoryEntry::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found, entry);
        assert_eq!(found.status, HistoryStatus::Pending);
        assert_eq!(found.input_text, "{\"a\":1}");
        assert_eq!(found.old_output_text, "out-v1");
        assert_eq!(found.public, artifact.public);
        assert_eq!(HistoryEntry::find_by_uuid(&conn, &entry.uuid).unwrap().unwrap().id, Some(id));
    }

    #[test]
    fn test_same_result_is_whitespace_insensitive() {
        let (_temp, _conn, artifact) = create_test_db();
        let entry = HistoryEntry::new(&artifact, None, 2, "out-v2\n".to_string(), None).unwrap();
        assert!(entry.records_same_result("  {\"a\":1}", "out-v2"));
        assert!(!entry.records_same_result("{\"a\":1}", "out-v3"));
        assert!(!entry.records_same_result("{\"a\":2}", "out-v2"));
    }

    #[test]
    fn test_accepted_versions_are_unique() {
        let (_temp, conn, artifact) = create_test_db();
        let mut a = HistoryEntry::new(&artifact, None, 2, "x".to_string(), None).unwrap();
        a.insert(&conn).unwrap();
        let mut b = HistoryEntry::new(&artifact, None, 2, "y".to_string(), None).unwrap();
        b.insert(&conn).unwrap();

        a.update_status(&conn, HistoryStatus::Accepted, "2024-01-01T00:00:00.000000Z").unwrap();
        let err = b
            .update_status(&conn, HistoryStatus::Accepted, "2024-01-01T00:00:00.000000Z")
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_version_floor_is_enforced() {
        let (_temp, conn, artifact) = create_test_db();
        let mut entry = HistoryEntry::new(&artifact, None, 1, "x".to_string(), None).unwrap();
        assert!(entry.insert(&conn).is_err());
    }

    #[test]
    fn test_history_cascades_with_artifact() {
        let (_temp, conn, artifact) = create_test_db();
        let mut entry = HistoryEntry::new(&artifact, None, 2, "x".to_string(), None).unwrap();
        entry.insert(&conn).unwrap();

        Artifact::delete(&conn, artifact.id.unwrap()).unwrap();
        assert_eq!(HistoryEntry::count_for(&conn, artifact.id.unwrap()).unwrap(), 0);
    }
}
