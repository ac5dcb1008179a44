// src/stix/mod.rs

//! STIX 2.x document model
//!
//! A [`Bundle`] is an identified, ordered collection of typed objects tagged
//! with a sub-version ([`SpecVersion`]). Objects are held as a sum type per
//! object category ([`StixObject`]); each variant carries the parsed
//! identifier and the full original property map, so a normalized bundle
//! serializes back to the same objects it was built from.
//!
//! The submodules implement loading:
//! - [`schema`]: per-sub-version property rules and the strict validator
//! - [`sniff`]: sub-version inference from version markers
//! - [`quarantine`]: per-object validation that sets failures aside
//! - [`loader`]: the top-level [`ContentLoader`]

pub mod loader;
pub mod quarantine;
pub mod schema;
pub mod sniff;

pub use loader::{ContentLoader, Document, LoadOutcome, LoadPath};
pub use quarantine::{ObjectQuarantine, Quarantine, QuarantinedObject};
pub use schema::{ObjectValidator, StrictValidator};
pub use sniff::{VersionSniff, sniff_version};

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Property carrying the sub-version marker
pub const SPEC_VERSION_PROPERTY: &str = "spec_version";

/// STIX sub-version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum SpecVersion {
    /// STIX 2.0, the older sub-version and the fallback when nothing is declared
    #[default]
    V20,
    /// STIX 2.1
    V21,
}

impl SpecVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecVersion::V20 => "2.0",
            SpecVersion::V21 => "2.1",
        }
    }

    /// The other sub-version
    pub fn toggled(&self) -> Self {
        match self {
            SpecVersion::V20 => SpecVersion::V21,
            SpecVersion::V21 => SpecVersion::V20,
        }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "2.0" | "20" => Ok(SpecVersion::V20),
            "2.1" | "21" => Ok(SpecVersion::V21),
            _ => Err(format!("Invalid STIX version: {s}")),
        }
    }
}

/// Reasons a single object or a whole document fails strict validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("document is not a bundle: {0}")]
    NotABundle(String),

    #[error("missing required property '{property}' on {object_type}")]
    MissingProperty { object_type: String, property: String },

    #[error("invalid type name '{0}'")]
    InvalidType(String),

    #[error("type '{object_type}' is not defined in STIX {version}")]
    UnknownType { object_type: String, version: SpecVersion },

    #[error("invalid identifier '{value}': {reason}")]
    InvalidId { value: String, reason: String },

    #[error("identifier '{id}' does not match object type '{object_type}'")]
    IdTypeMismatch { id: String, object_type: String },

    #[error("property '{property}' is not a valid timestamp: {value}")]
    InvalidTimestamp { property: String, value: String },

    #[error("property '{property}' is not a valid reference: {value}")]
    InvalidReference { property: String, value: String },

    #[error("invalid property '{property}': {reason}")]
    InvalidProperty { property: String, reason: String },

    #[error("version marker '{found}' does not match STIX {expected}")]
    VersionMismatch { expected: SpecVersion, found: String },

    #[error("property '{property}' is not allowed in STIX {version}")]
    UnexpectedProperty { property: String, version: SpecVersion },

    #[error("object {index} ({}): {reason}", .id.as_deref().unwrap_or("no id"))]
    InObject {
        index: usize,
        id: Option<String>,
        reason: Box<ValidationError>,
    },
}

/// Name of a JSON value's kind, for error messages
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A STIX identifier: `<object-type>--<uuid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StixId {
    object_type: String,
    uuid: Uuid,
}

impl StixId {
    /// Generate a fresh identifier for the given object type
    pub fn generate(object_type: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            uuid: Uuid::new_v4(),
        }
    }

    /// Parse an identifier string
    pub fn parse(value: &str) -> std::result::Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidId {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (object_type, uuid) = value
            .split_once("--")
            .ok_or_else(|| invalid("missing '--' separator"))?;
        if !schema::is_valid_type_name(object_type) {
            return Err(invalid("invalid object type prefix"));
        }
        if !is_hyphenated_uuid(uuid) {
            return Err(invalid("invalid UUID part"));
        }
        let uuid = Uuid::parse_str(uuid).map_err(|_| invalid("invalid UUID part"))?;

        Ok(Self {
            object_type: object_type.to_string(),
            uuid,
        })
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }
}

/// Canonical 8-4-4-4-12 hex form; the urn, braced and simple forms are not identifiers
fn is_hyphenated_uuid(value: &str) -> bool {
    value.len() == 36
        && value.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

impl fmt::Display for StixId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}--{}", self.object_type, self.uuid)
    }
}

/// Object category, as assigned by the schema table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectCategory {
    /// STIX Domain Object (indicator, malware, report, ...)
    Domain,
    /// STIX Relationship Object (relationship, sighting)
    Relationship,
    /// STIX Cyber-observable Object (ipv4-addr, file, ...)
    Observable,
    /// Meta object (marking-definition, language-content, extension-definition)
    Meta,
    /// Custom `x-` or otherwise unregistered type
    Custom,
}

impl ObjectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectCategory::Domain => "sdo",
            ObjectCategory::Relationship => "sro",
            ObjectCategory::Observable => "sco",
            ObjectCategory::Meta => "meta",
            ObjectCategory::Custom => "custom",
        }
    }
}

/// Validated contents shared by every object variant
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBody {
    pub id: StixId,
    /// Full property map as received, including `type` and `id`
    pub properties: Map<String, Value>,
}

impl ObjectBody {
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// String property, if present and a string
    pub fn get_str(&self, property: &str) -> Option<&str> {
        self.properties.get(property).and_then(Value::as_str)
    }
}

/// A strictly validated STIX object
#[derive(Debug, Clone, PartialEq)]
pub enum StixObject {
    Domain(ObjectBody),
    Relationship(ObjectBody),
    Observable(ObjectBody),
    Meta(ObjectBody),
    Custom(ObjectBody),
}

impl StixObject {
    pub fn new(category: ObjectCategory, body: ObjectBody) -> Self {
        match category {
            ObjectCategory::Domain => StixObject::Domain(body),
            ObjectCategory::Relationship => StixObject::Relationship(body),
            ObjectCategory::Observable => StixObject::Observable(body),
            ObjectCategory::Meta => StixObject::Meta(body),
            ObjectCategory::Custom => StixObject::Custom(body),
        }
    }

    pub fn body(&self) -> &ObjectBody {
        match self {
            StixObject::Domain(b)
            | StixObject::Relationship(b)
            | StixObject::Observable(b)
            | StixObject::Meta(b)
            | StixObject::Custom(b) => b,
        }
    }

    pub fn category(&self) -> ObjectCategory {
        match self {
            StixObject::Domain(_) => ObjectCategory::Domain,
            StixObject::Relationship(_) => ObjectCategory::Relationship,
            StixObject::Observable(_) => ObjectCategory::Observable,
            StixObject::Meta(_) => ObjectCategory::Meta,
            StixObject::Custom(_) => ObjectCategory::Custom,
        }
    }

    pub fn id(&self) -> &StixId {
        &self.body().id
    }

    pub fn object_type(&self) -> &str {
        self.body().id.object_type()
    }

    /// The object as JSON
    pub fn to_value(&self) -> Value {
        Value::Object(self.body().properties.clone())
    }
}

/// An identified, ordered collection of validated objects
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub id: StixId,
    pub spec_version: SpecVersion,
    pub objects: Vec<StixObject>,
}

impl Bundle {
    pub fn new(id: StixId, spec_version: SpecVersion, objects: Vec<StixObject>) -> Self {
        Self {
            id,
            spec_version,
            objects,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Find an object by identifier string
    pub fn find(&self, id: &str) -> Option<&StixObject> {
        self.objects.iter().find(|o| o.id().to_string() == id)
    }

    /// Serialize as a bundle document
    ///
    /// STIX 2.0 bundles carry the version on the bundle itself; 2.1 bundles
    /// carry it on the objects only.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String("bundle".to_string()));
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        if self.spec_version == SpecVersion::V20 {
            map.insert(
                SPEC_VERSION_PROPERTY.to_string(),
                Value::String(SpecVersion::V20.as_str().to_string()),
            );
        }
        map.insert(
            "objects".to_string(),
            Value::Array(self.objects.iter().map(StixObject::to_value).collect()),
        );
        Value::Object(map)
    }

    /// Digest of the canonical serialization
    pub fn digest(&self) -> crate::hash::Hash {
        crate::hash::json_digest(crate::hash::HashAlgorithm::Xxh128, &self.to_value())
    }
}
