// src/error.rs

//! Error types for Transmute

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the loader, the dispatcher and the history ledger
#[derive(Error, Debug)]
pub enum Error {
    /// The payload is not parseable as structured data at all
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Per-object reconstruction left nothing to put in a bundle
    #[error("no valid objects survived reconstruction ({quarantined} quarantined)")]
    NoValidObjects { quarantined: usize },

    /// Strict validation of a whole document failed
    #[error("validation failed: {0}")]
    Validation(#[from] crate::stix::ValidationError),

    /// Entity lookup failed
    #[error("{0} not found")]
    NotFound(String),

    /// Entity with the same unique key already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Status change not allowed from the entry's current state
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// User-supplied conversion option out of range or unparseable
    #[error("invalid option {key}: {reason}")]
    InvalidOption { key: String, reason: String },

    /// The external format converter failed or returned an error payload
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for an invalid option error
    pub fn invalid_option(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True when the underlying SQLite error is a UNIQUE/PRIMARY KEY violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Error::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    }
}
