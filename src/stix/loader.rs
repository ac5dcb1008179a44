// src/stix/loader.rs

//! Content loader for claimed STIX documents
//!
//! Loading never fails just because one object inside is malformed:
//!
//! 1. Strict parse of the whole document under its declared sub-version
//!    (bundle-level marker, else sniffed from the objects).
//! 2. On a validation failure, reinterpretation: re-parse the whole document
//!    under the sniffed sub-version and then the other one, with version
//!    markers rewritten to match when the document carries any. This covers
//!    a mislabeled marker without quarantining anything.
//! 3. Per-object reconstruction under the sniffed sub-version. Objects that
//!    fail are quarantined; the original bundle id is kept when valid.
//!
//! The load fails only for input that is not structured data at all, or
//! when reconstruction keeps zero objects.

use super::quarantine::{ObjectQuarantine, Quarantine};
use super::schema::{ObjectValidator, StrictValidator, requires_spec_version};
use super::sniff::{VersionSniff, sniff_version};
use super::{Bundle, SPEC_VERSION_PROPERTY, SpecVersion, StixId, ValidationError, kind_of};
use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Raw input accepted by the loader
#[derive(Debug, Clone)]
pub enum Document {
    /// UTF-8 JSON bytes
    Bytes(Vec<u8>),
    /// JSON text
    Text(String),
    /// Already-parsed JSON; a JSON string is parsed again as JSON text
    Value(Value),
}

impl Document {
    fn into_value(self) -> Result<Value> {
        match self {
            Document::Bytes(bytes) => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| Error::MalformedInput(format!("input is not UTF-8: {e}")))?;
                parse_text(&text)
            }
            Document::Text(text) => parse_text(&text),
            Document::Value(Value::String(text)) => parse_text(&text),
            Document::Value(value) => Ok(value),
        }
    }
}

fn parse_text(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| Error::MalformedInput(format!("invalid JSON: {e}")))
}

impl From<Vec<u8>> for Document {
    fn from(bytes: Vec<u8>) -> Self {
        Document::Bytes(bytes)
    }
}

impl From<&[u8]> for Document {
    fn from(bytes: &[u8]) -> Self {
        Document::Bytes(bytes.to_vec())
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Document::Text(text)
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Document::Text(text.to_string())
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Document::Value(value)
    }
}

/// How a bundle was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPath {
    /// The document was valid as declared
    Strict,
    /// The whole document parsed after switching sub-version
    Reinterpreted { from: SpecVersion, to: SpecVersion },
    /// Built object by object; failures are in the quarantine
    Reconstructed,
}

/// A usable bundle plus the objects that had to be set aside
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub bundle: Bundle,
    pub quarantine: Quarantine,
    pub path: LoadPath,
}

impl LoadOutcome {
    /// Identifiers of quarantined objects
    pub fn quarantined_ids(&self) -> Vec<String> {
        self.quarantine.ids().map(str::to_string).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `{"type": "bundle", ...}`
    Bundle,
    /// Bare list of objects, or a single bare object
    Collection,
}

/// The parts of a document the loader works with
#[derive(Debug, Clone, PartialEq)]
struct Envelope {
    shape: Shape,
    bundle_id: Option<Value>,
    /// Bundle-level `spec_version`
    marker: Option<Value>,
    objects: Vec<Value>,
    /// Kind of a non-array `objects` property
    malformed_objects: Option<&'static str>,
}

impl Envelope {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(mut map)
                if map.get("type").and_then(Value::as_str) == Some("bundle") =>
            {
                let (objects, malformed_objects) = match map.remove("objects") {
                    None => (Vec::new(), None),
                    Some(Value::Array(items)) => (items, None),
                    Some(other) => (Vec::new(), Some(kind_of(&other))),
                };
                Ok(Self {
                    shape: Shape::Bundle,
                    bundle_id: map.remove("id"),
                    marker: map.remove(SPEC_VERSION_PROPERTY),
                    objects,
                    malformed_objects,
                })
            }
            Value::Object(map) => Ok(Self::collection(vec![Value::Object(map)])),
            Value::Array(items) => Ok(Self::collection(items)),
            other => Err(Error::MalformedInput(format!(
                "expected a bundle, an object or a list of objects, found {}",
                kind_of(&other)
            ))),
        }
    }

    fn collection(objects: Vec<Value>) -> Self {
        Self {
            shape: Shape::Collection,
            bundle_id: None,
            marker: None,
            objects,
            malformed_objects: None,
        }
    }

    /// Bundle-level marker if recognizable, else sniffed from the objects
    fn declared_version(&self, sniff: &VersionSniff) -> SpecVersion {
        self.marker
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(sniff.version)
    }

    fn has_markers(&self) -> bool {
        self.marker.is_some()
            || self
                .objects
                .iter()
                .any(|o| o.get(SPEC_VERSION_PROPERTY).is_some())
    }

    /// Copy with every version marker rewritten for `version`
    fn retag(&self, version: SpecVersion) -> Self {
        let mut retagged = self.clone();
        match version {
            SpecVersion::V20 => {
                if self.shape == Shape::Bundle {
                    retagged.marker = Some(Value::String(version.as_str().to_string()));
                }
                for object in retagged.objects.iter_mut() {
                    if let Some(map) = object.as_object_mut() {
                        map.remove(SPEC_VERSION_PROPERTY);
                    }
                }
            }
            SpecVersion::V21 => {
                retagged.marker = None;
                for object in retagged.objects.iter_mut() {
                    let Some(map) = object.as_object_mut() else {
                        continue;
                    };
                    let needs_marker = map.contains_key(SPEC_VERSION_PROPERTY)
                        || map
                            .get("type")
                            .and_then(Value::as_str)
                            .is_some_and(requires_spec_version);
                    if needs_marker {
                        map.insert(
                            SPEC_VERSION_PROPERTY.to_string(),
                            Value::String(version.as_str().to_string()),
                        );
                    }
                }
            }
        }
        retagged
    }

    /// The source bundle id, when present and well-formed
    fn source_id(&self) -> Option<StixId> {
        let raw = self.bundle_id.as_ref()?.as_str()?;
        StixId::parse(raw)
            .ok()
            .filter(|id| id.object_type() == "bundle")
    }
}

/// Loads and normalizes claimed STIX documents
pub struct ContentLoader<V = StrictValidator> {
    validator: V,
}

impl ContentLoader {
    /// Loader backed by the built-in schema table
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            validator: StrictValidator::new(config),
        }
    }
}

impl Default for ContentLoader {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

impl<V: ObjectValidator> ContentLoader<V> {
    /// Loader backed by an injected object validator
    pub fn with_validator(validator: V) -> Self {
        Self { validator }
    }

    /// Load a document, repairing or quarantining what does not validate
    pub fn load(&self, document: impl Into<Document>) -> Result<LoadOutcome> {
        let envelope = Envelope::from_value(document.into().into_value()?)?;
        let sniff = sniff_version(&envelope.objects);
        let declared = envelope.declared_version(&sniff);

        match self.parse_strict(&envelope, declared) {
            Ok(bundle) => {
                debug!(
                    "Loaded {} object(s) as STIX {} without repair",
                    bundle.len(),
                    declared
                );
                return Ok(LoadOutcome {
                    bundle,
                    quarantine: Quarantine::new(),
                    path: LoadPath::Strict,
                });
            }
            Err(e) => debug!("Strict parse as STIX {} failed: {}", declared, e),
        }

        let target = sniff.version;
        for (version, candidate) in reinterpretations(&envelope, declared, target) {
            match self.parse_strict(&candidate, version) {
                Ok(bundle) => {
                    info!(
                        "Reinterpreted document from STIX {} to STIX {} ({} objects)",
                        declared,
                        version,
                        bundle.len()
                    );
                    return Ok(LoadOutcome {
                        bundle,
                        quarantine: Quarantine::new(),
                        path: LoadPath::Reinterpreted {
                            from: declared,
                            to: version,
                        },
                    });
                }
                Err(e) => debug!("Reinterpretation as STIX {} failed: {}", version, e),
            }
        }

        let (objects, quarantine) =
            ObjectQuarantine::new(&self.validator, target).sort(&envelope.objects);
        if objects.is_empty() {
            return Err(Error::NoValidObjects {
                quarantined: quarantine.len(),
            });
        }

        let id = match envelope.source_id() {
            Some(id) => id,
            None => {
                if envelope.bundle_id.is_some() {
                    warn!("Source bundle id is not valid; generating a new one");
                }
                StixId::generate("bundle")
            }
        };
        warn!(
            "Reconstructed STIX {} bundle {}: {} kept, {} quarantined",
            target,
            id,
            objects.len(),
            quarantine.len()
        );
        Ok(LoadOutcome {
            bundle: Bundle::new(id, target, objects),
            quarantine,
            path: LoadPath::Reconstructed,
        })
    }

    /// Validate a whole document under one sub-version
    fn parse_strict(
        &self,
        envelope: &Envelope,
        version: SpecVersion,
    ) -> std::result::Result<Bundle, ValidationError> {
        let id = match envelope.shape {
            Shape::Collection => StixId::generate("bundle"),
            Shape::Bundle => {
                check_bundle_marker(envelope.marker.as_ref(), version)?;
                if let Some(kind) = envelope.malformed_objects {
                    return Err(ValidationError::InvalidProperty {
                        property: "objects".to_string(),
                        reason: format!("expected array, found {kind}"),
                    });
                }
                parse_bundle_id(envelope.bundle_id.as_ref())?
            }
        };

        let objects = envelope
            .objects
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                self.validator
                    .validate(raw, version)
                    .map_err(|reason| ValidationError::InObject {
                        index,
                        id: raw.get("id").and_then(Value::as_str).map(str::to_string),
                        reason: Box::new(reason),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Bundle::new(id, version, objects))
    }
}

/// Whole-document re-parse candidates, in the order they are tried
fn reinterpretations(
    envelope: &Envelope,
    declared: SpecVersion,
    target: SpecVersion,
) -> Vec<(SpecVersion, Envelope)> {
    let marked = envelope.has_markers();
    let mut attempts: Vec<(SpecVersion, Envelope)> = Vec::new();

    for version in [target, target.toggled()] {
        let mut variants = vec![envelope.clone()];
        if marked {
            variants.push(envelope.retag(version));
        }
        for variant in variants {
            if version == declared && variant == *envelope {
                continue;
            }
            if attempts.iter().any(|(v, e)| *v == version && *e == variant) {
                continue;
            }
            attempts.push((version, variant));
        }
    }
    attempts
}

fn check_bundle_marker(
    marker: Option<&Value>,
    version: SpecVersion,
) -> std::result::Result<(), ValidationError> {
    match (version, marker) {
        (_, None) => Ok(()),
        (SpecVersion::V20, Some(Value::String(s))) if s == SpecVersion::V20.as_str() => Ok(()),
        (SpecVersion::V20, Some(other)) => Err(ValidationError::VersionMismatch {
            expected: version,
            found: other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string()),
        }),
        (SpecVersion::V21, Some(_)) => Err(ValidationError::UnexpectedProperty {
            property: SPEC_VERSION_PROPERTY.to_string(),
            version,
        }),
    }
}

fn parse_bundle_id(raw: Option<&Value>) -> std::result::Result<StixId, ValidationError> {
    let raw = raw.ok_or_else(|| ValidationError::MissingProperty {
        object_type: "bundle".to_string(),
        property: "id".to_string(),
    })?;
    let s = raw.as_str().ok_or_else(|| ValidationError::InvalidProperty {
        property: "id".to_string(),
        reason: format!("expected string, found {}", kind_of(raw)),
    })?;
    let id = StixId::parse(s)?;
    if id.object_type() != "bundle" {
        return Err(ValidationError::IdTypeMismatch {
            id: id.to_string(),
            object_type: "bundle".to_string(),
        });
    }
    Ok(id)
}
