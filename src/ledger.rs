// src/ledger.rs

//! Conversion history ledger
//!
//! Records re-conversions of an artifact as versioned entries and moves
//! them through `pending -> accepted | rejected`. Accepting an entry makes
//! its output the artifact's canonical output.
//!
//! The frontier of an artifact is its most recent accepted entry. It sets
//! the next version number and is the baseline for duplicate suppression.
//! Numbering and the duplicate check run inside one IMMEDIATE transaction,
//! so two concurrent creators cannot both claim the same frontier.

use crate::db;
use crate::db::models::{
    Artifact, FIRST_HISTORY_VERSION, HistoryEntry, HistoryStatus, Transition, timestamp,
};
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

/// Result of [`HistoryLedger::create`]
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A new pending entry was written
    Created(HistoryEntry),
    /// Same input and output as the frontier; nothing was written
    Duplicate(HistoryEntry),
}

impl CreateOutcome {
    pub fn entry(&self) -> &HistoryEntry {
        match self {
            CreateOutcome::Created(e) | CreateOutcome::Duplicate(e) => e,
        }
    }

    pub fn into_entry(self) -> HistoryEntry {
        match self {
            CreateOutcome::Created(e) | CreateOutcome::Duplicate(e) => e,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CreateOutcome::Duplicate(_))
    }
}

/// Versioned history over one database connection
pub struct HistoryLedger<'c> {
    conn: &'c mut Connection,
}

impl<'c> HistoryLedger<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }

    /// Record a re-conversion result for an artifact
    ///
    /// Returns the frontier unchanged when the artifact's current input and
    /// `new_output` match what the frontier recorded.
    pub fn create(
        &mut self,
        artifact_id: i64,
        user_id: Option<i64>,
        new_output: &str,
        comment: Option<&str>,
    ) -> Result<CreateOutcome> {
        let outcome = db::transaction(self.conn, |tx| {
            let artifact = Artifact::find_by_id(tx, artifact_id)?
                .ok_or_else(|| Error::NotFound(format!("artifact {artifact_id}")))?;

            let frontier = HistoryEntry::frontier(tx, artifact_id)?;
            let next_version = match &frontier {
                Some(prior) if prior.records_same_result(&artifact.input_text, new_output) => {
                    return Ok(CreateOutcome::Duplicate(prior.clone()));
                }
                Some(prior) => prior.version + 1,
                None => FIRST_HISTORY_VERSION,
            };

            let mut entry = HistoryEntry::new(
                &artifact,
                user_id,
                next_version,
                new_output.to_string(),
                comment.map(str::to_string),
            )?;
            entry.insert(tx)?;
            Ok(CreateOutcome::Created(entry))
        });

        match &outcome {
            Ok(CreateOutcome::Created(entry)) => info!(
                "Recorded version {} of artifact {} as pending",
                entry.version, artifact_id
            ),
            Ok(CreateOutcome::Duplicate(entry)) => info!(
                "Re-conversion of artifact {} matches accepted version {}; nothing recorded",
                artifact_id, entry.version
            ),
            Err(e) => warn!("Failed to record history for artifact {}: {}", artifact_id, e),
        }
        outcome
    }

    /// Accept an entry and promote its output; false when the entry does not exist
    ///
    /// A pending entry is renumbered to follow the frontier if other entries
    /// were accepted since it was created. Accepting the frontier again copies
    /// its output again; an older accepted entry is an invalid transition, so
    /// the artifact output always matches the frontier.
    pub fn accept(&mut self, entry_id: i64) -> Result<bool> {
        db::transaction(self.conn, |tx| {
            let Some(mut entry) = HistoryEntry::find_by_id(tx, entry_id)? else {
                warn!("Cannot accept history entry {}: not found", entry_id);
                return Ok(false);
            };

            let now = timestamp();
            match entry.status.transition(HistoryStatus::Accepted)? {
                Transition::Apply => {
                    let expected = HistoryEntry::frontier(tx, entry.artifact_id)?
                        .map_or(FIRST_HISTORY_VERSION, |f| f.version + 1);
                    if entry.version != expected {
                        debug!(
                            "Renumbering history entry {} from version {} to {}",
                            entry_id, entry.version, expected
                        );
                        entry.update_version(tx, expected)?;
                    }
                    entry.update_status(tx, HistoryStatus::Accepted, &now)?;
                }
                Transition::Reapply => {
                    let frontier_id = HistoryEntry::frontier(tx, entry.artifact_id)?
                        .and_then(|f| f.id);
                    if frontier_id != entry.id {
                        return Err(Error::InvalidTransition(format!(
                            "entry {} is not the latest accepted version of artifact {}",
                            entry_id, entry.artifact_id
                        )));
                    }
                    debug!("History entry {} already accepted; re-applying output", entry_id);
                }
                Transition::Unchanged => return Ok(true),
            }

            Artifact::set_output(tx, entry.artifact_id, &entry.new_output_text, &now)?;
            info!(
                "Accepted version {} of artifact {}",
                entry.version, entry.artifact_id
            );
            Ok(true)
        })
    }

    /// Reject an entry; false when the entry does not exist
    ///
    /// The artifact is never touched.
    pub fn reject(&mut self, entry_id: i64) -> Result<bool> {
        db::transaction(self.conn, |tx| {
            let Some(mut entry) = HistoryEntry::find_by_id(tx, entry_id)? else {
                warn!("Cannot reject history entry {}: not found", entry_id);
                return Ok(false);
            };

            match entry.status.transition(HistoryStatus::Rejected)? {
                Transition::Apply => {
                    entry.update_status(tx, HistoryStatus::Rejected, &timestamp())?;
                    info!(
                        "Rejected version {} of artifact {}",
                        entry.version, entry.artifact_id
                    );
                }
                Transition::Reapply | Transition::Unchanged => {
                    debug!("History entry {} already rejected", entry_id);
                }
            }
            Ok(true)
        })
    }

    /// Highest-versioned entry regardless of status
    pub fn latest(&self, artifact_id: i64) -> Result<Option<HistoryEntry>> {
        HistoryEntry::latest(&*self.conn, artifact_id)
    }

    /// The most recent accepted entry
    pub fn frontier(&self, artifact_id: i64) -> Result<Option<HistoryEntry>> {
        HistoryEntry::frontier(&*self.conn, artifact_id)
    }

    /// Accepted entries by ascending version
    pub fn accepted_history(&self, artifact_id: i64) -> Result<Vec<HistoryEntry>> {
        HistoryEntry::list_accepted(&*self.conn, artifact_id)
    }

    /// All entries by descending version
    pub fn all_entries(&self, artifact_id: i64) -> Result<Vec<HistoryEntry>> {
        HistoryEntry::list_all(&*self.conn, artifact_id)
    }

    /// Entries awaiting a decision
    pub fn pending(&self, artifact_id: i64) -> Result<Vec<HistoryEntry>> {
        HistoryEntry::list_pending(&*self.conn, artifact_id)
    }

    pub fn get(&self, entry_id: i64) -> Result<Option<HistoryEntry>> {
        HistoryEntry::find_by_id(&*self.conn, entry_id)
    }

    pub fn get_by_uuid(&self, uuid: &str) -> Result<Option<HistoryEntry>> {
        HistoryEntry::find_by_uuid(&*self.conn, uuid)
    }
}
