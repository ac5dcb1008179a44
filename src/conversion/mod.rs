// src/conversion/mod.rs

//! Conversion between MISP events and STIX 2.x bundles
//!
//! The object-by-object translation is done by an external converter behind
//! the [`FormatConverter`] trait. This module owns everything around it:
//! mapping user options to converter arguments ([`ConversionDispatcher`]),
//! the HTTP transport ([`HttpConverter`]), artifact naming rules, and the
//! re-conversion workflow that feeds the history ledger.

pub mod converter;
pub mod dispatcher;
pub mod naming;
pub mod reconvert;

pub use converter::{FormatConverter, HttpConverter};
pub use dispatcher::{
    ConversionDispatcher, ConvertOptions, ConverterArguments, ConverterCall, LabelOriginDetector,
    OriginDetector, SourceOrigin,
};
pub use reconvert::{NewConversion, ReconvertOutcome, Reconverter};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Human-readable list of the converters behind the external service
pub const AVAILABLE_CONVERTERS: &[&str] = &["MISP to STIX 2.0 & 2.1", "STIX 2.0 & 2.1 to MISP"];

/// Direction of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionKind {
    MispToStix,
    StixToMisp,
}

impl ConversionKind {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionKind::MispToStix => "MISP_TO_STIX",
            ConversionKind::StixToMisp => "STIX_TO_MISP",
        }
    }

    /// Converter entry point, relative to the configured endpoint
    pub fn route(&self) -> &'static str {
        match self {
            ConversionKind::MispToStix => "misp_to_stix",
            ConversionKind::StixToMisp => "stix_to_misp",
        }
    }

    /// Prefix for generated artifact names, after the output format
    pub fn name_prefix(&self) -> &'static str {
        match self {
            ConversionKind::MispToStix => "STIX",
            ConversionKind::StixToMisp => "MISP",
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "misp_to_stix" => Ok(ConversionKind::MispToStix),
            "stix_to_misp" => Ok(ConversionKind::StixToMisp),
            _ => Err(format!("Invalid conversion kind: {s}")),
        }
    }
}
