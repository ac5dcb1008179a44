// src/lib.rs

//! Transmute - threat-intelligence format conversion
//!
//! Converts between MISP events and STIX 2.0/2.1 bundles through an external
//! converter, and keeps every stored conversion under a reviewable history.
//!
//! # Architecture
//!
//! - Database-first: artifacts and their history live in SQLite
//! - Tolerant loading: STIX input is read strictly, then reinterpreted across
//!   sub-versions, then rebuilt object by object with failures quarantined
//! - Dispatch: user options become converter arguments, narrowed to what the
//!   detected content origin accepts
//! - Ledger: re-conversions are versioned entries that must be accepted
//!   before they replace an artifact's output

pub mod config;
pub mod conversion;
pub mod db;
mod error;
pub mod hash;
pub mod ledger;
pub mod stix;

pub use config::TransmuteConfig;
pub use conversion::{ConversionDispatcher, ConversionKind, ConvertOptions, FormatConverter};
pub use error::{Error, Result};
pub use ledger::{CreateOutcome, HistoryLedger};
pub use stix::{Bundle, ContentLoader, SpecVersion};
