// src/db/models/mod.rs

//! Data models for Transmute database entities
//!
//! Each struct mirrors one table and carries its own CRUD helpers.

mod artifact;
mod history;

pub use artifact::{Artifact, ArtifactPage, ArtifactQuery, NewArtifact, SortOrder, Viewer};
pub use history::{FIRST_HISTORY_VERSION, HistoryEntry, HistoryStatus, Transition};

use chrono::{SecondsFormat, Utc};

/// Current time as stored in the database
///
/// Fixed-width RFC 3339 in UTC, so text ordering matches time ordering.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Map a bad enum string in a row to a conversion failure
pub(crate) fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}
