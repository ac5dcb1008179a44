// src/conversion/reconvert.rs

//! First conversions and re-conversions of stored artifacts
//!
//! A re-conversion runs the converter again on the artifact's stored input.
//! Output identical to the artifact's current output (after trimming) is
//! reported but not recorded. Anything else goes to the history ledger as a
//! pending entry; if the ledger write fails the re-conversion fails and the
//! new output is discarded.

use super::converter::FormatConverter;
use super::dispatcher::{ConversionDispatcher, ConvertOptions, LabelOriginDetector, OriginDetector};
use super::{ConversionKind, naming};
use crate::config::{NamingConfig, TransmuteConfig};
use crate::db;
use crate::db::models::{Artifact, NewArtifact};
use crate::error::{Error, Result};
use crate::ledger::{CreateOutcome, HistoryLedger};
use crate::stix::ContentLoader;
use rusqlite::Connection;
use serde_json::Value;
use tracing::{info, warn};

/// Result of re-running a conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ReconvertOutcome {
    /// Pretty-printed converter output
    pub output: String,
    /// Output matches the artifact's current output
    pub identical: bool,
    /// Ledger result when the output differed
    pub history: Option<CreateOutcome>,
}

/// Request for a first conversion
#[derive(Debug, Clone)]
pub struct NewConversion {
    pub kind: ConversionKind,
    pub input: String,
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub public: bool,
    pub options: ConvertOptions,
}

/// Drives the converter for stored and new artifacts
pub struct Reconverter<C, D = LabelOriginDetector> {
    converter: C,
    dispatcher: ConversionDispatcher<D>,
    loader: ContentLoader,
    naming: NamingConfig,
    comment: String,
}

impl<C: FormatConverter> Reconverter<C> {
    pub fn new(converter: C, config: &TransmuteConfig) -> Self {
        Self::with_dispatcher(converter, ConversionDispatcher::new(), config)
    }
}

impl<C: FormatConverter, D: OriginDetector> Reconverter<C, D> {
    pub fn with_dispatcher(
        converter: C,
        dispatcher: ConversionDispatcher<D>,
        config: &TransmuteConfig,
    ) -> Self {
        Self {
            converter,
            dispatcher,
            loader: ContentLoader::new(&config.loader),
            naming: config.naming.clone(),
            comment: config.history.reconvert_comment.clone(),
        }
    }

    /// Run the converter on an input document; returns pretty-printed JSON
    ///
    /// STIX input is normalized by the content loader first, so quarantined
    /// objects never reach the converter.
    pub fn run(&self, kind: ConversionKind, input: &str, options: &ConvertOptions) -> Result<String> {
        let (call, document) = match kind {
            ConversionKind::MispToStix => {
                let document: Value = serde_json::from_str(input)
                    .map_err(|e| Error::MalformedInput(format!("invalid MISP JSON: {e}")))?;
                (self.dispatcher.misp_to_stix(options), document)
            }
            ConversionKind::StixToMisp => {
                let loaded = self.loader.load(input)?;
                if !loaded.quarantine.is_empty() {
                    warn!(
                        "Converting without {} quarantined object(s): {}",
                        loaded.quarantine.len(),
                        loaded.quarantined_ids().join(", ")
                    );
                }
                let call = self.dispatcher.stix_to_misp(&loaded.bundle, options)?;
                (call, loaded.bundle.to_value())
            }
        };

        let converted = self.converter.convert(&call, &document)?;
        Ok(serde_json::to_string_pretty(&converted)?)
    }

    /// Convert new input and store it as an artifact
    ///
    /// Missing name and description are taken from the input content when
    /// possible.
    pub fn convert_new(&self, conn: &mut Connection, request: NewConversion) -> Result<Artifact> {
        let output = self.run(request.kind, &request.input, &request.options)?;

        let suggestion = naming::suggest(request.kind, &request.input);
        let new = NewArtifact {
            user_id: request.user_id,
            name: request.name.or(suggestion.name),
            kind: request.kind,
            description: request.description.or(suggestion.description),
            input_text: request.input,
            output_text: output,
            public: request.public,
        };
        db::transaction(conn, |tx| Artifact::create(tx, new, &self.naming))
    }

    /// Re-run the conversion of a stored artifact
    pub fn reconvert(
        &self,
        conn: &mut Connection,
        artifact_id: i64,
        user_id: Option<i64>,
        options: &ConvertOptions,
    ) -> Result<ReconvertOutcome> {
        let artifact = Artifact::find_by_id(conn, artifact_id)?
            .ok_or_else(|| Error::NotFound(format!("artifact {artifact_id}")))?;

        let output = self.run(artifact.kind, &artifact.input_text, options)?;
        if artifact.output_text.trim() == output.trim() {
            info!("Re-conversion of {} produced identical output", artifact.name);
            return Ok(ReconvertOutcome {
                output,
                identical: true,
                history: None,
            });
        }

        let history = HistoryLedger::new(conn).create(
            artifact_id,
            user_id,
            &output,
            Some(&self.comment),
        )?;
        Ok(ReconvertOutcome {
            output,
            identical: false,
            history: Some(history),
        })
    }
}
