// src/stix/schema.rs

//! Per-sub-version schema table and the strict object validator
//!
//! Each registered type has a category and, per sub-version, the list of
//! required properties beyond `type` and `id`. A type whose entry is `None`
//! for a sub-version does not exist in that sub-version (e.g. `grouping` in
//! 2.0, any cyber-observable as a top-level 2.0 object).
//!
//! On top of the table the validator enforces the version marker rules:
//! - 2.0 objects must not carry `spec_version`
//! - 2.1 domain, relationship, meta and custom objects must carry
//!   `spec_version: "2.1"`; cyber-observables may omit it

use super::{
    ObjectBody, ObjectCategory, SPEC_VERSION_PROPERTY, SpecVersion, StixId, StixObject,
    ValidationError, kind_of,
};
use crate::config::LoaderConfig;
use chrono::DateTime;
use serde_json::Value;
use std::sync::LazyLock;

/// Strict single-object parser for a given sub-version
///
/// The loader and the quarantine depend on this seam rather than on the
/// built-in table, so a stricter or looser validator can be injected.
pub trait ObjectValidator {
    fn validate(&self, raw: &Value, version: SpecVersion) -> Result<StixObject, ValidationError>;
}

/// One row of the schema table
#[derive(Debug)]
pub struct TypeRule {
    pub object_type: &'static str,
    pub category: ObjectCategory,
    pub v20: Option<&'static [&'static str]>,
    pub v21: Option<&'static [&'static str]>,
}

impl TypeRule {
    pub fn required(&self, version: SpecVersion) -> Option<&'static [&'static str]> {
        match version {
            SpecVersion::V20 => self.v20,
            SpecVersion::V21 => self.v21,
        }
    }
}

const fn sdo(
    object_type: &'static str,
    v20: Option<&'static [&'static str]>,
    v21: Option<&'static [&'static str]>,
) -> TypeRule {
    TypeRule {
        object_type,
        category: ObjectCategory::Domain,
        v20,
        v21,
    }
}

const fn sco(object_type: &'static str, v21: &'static [&'static str]) -> TypeRule {
    TypeRule {
        object_type,
        category: ObjectCategory::Observable,
        v20: None,
        v21: Some(v21),
    }
}

static TYPE_RULES: &[TypeRule] = &[
    // Domain objects
    sdo("attack-pattern", Some(&["name"]), Some(&["name"])),
    sdo("campaign", Some(&["name"]), Some(&["name"])),
    sdo("course-of-action", Some(&["name"]), Some(&["name"])),
    sdo("grouping", None, Some(&["context", "object_refs"])),
    sdo("identity", Some(&["name", "identity_class"]), Some(&["name"])),
    sdo(
        "indicator",
        Some(&["labels", "pattern", "valid_from"]),
        Some(&["pattern", "pattern_type", "valid_from"]),
    ),
    sdo("infrastructure", None, Some(&["name"])),
    sdo("intrusion-set", Some(&["name"]), Some(&["name"])),
    sdo("location", None, Some(&[])),
    sdo("malware", Some(&["labels", "name"]), Some(&["is_family"])),
    sdo("malware-analysis", None, Some(&["product"])),
    sdo("note", None, Some(&["content", "object_refs"])),
    sdo(
        "observed-data",
        Some(&["first_observed", "last_observed", "number_observed", "objects"]),
        Some(&["first_observed", "last_observed", "number_observed"]),
    ),
    sdo("opinion", None, Some(&["opinion", "object_refs"])),
    sdo(
        "report",
        Some(&["labels", "name", "published", "object_refs"]),
        Some(&["name", "published", "object_refs"]),
    ),
    sdo("threat-actor", Some(&["labels", "name"]), Some(&["name"])),
    sdo("tool", Some(&["labels", "name"]), Some(&["name"])),
    sdo("vulnerability", Some(&["name"]), Some(&["name"])),
    // Relationship objects
    TypeRule {
        object_type: "relationship",
        category: ObjectCategory::Relationship,
        v20: Some(&["relationship_type", "source_ref", "target_ref"]),
        v21: Some(&["relationship_type", "source_ref", "target_ref"]),
    },
    TypeRule {
        object_type: "sighting",
        category: ObjectCategory::Relationship,
        v20: Some(&["sighting_of_ref"]),
        v21: Some(&["sighting_of_ref"]),
    },
    // Meta objects
    TypeRule {
        object_type: "marking-definition",
        category: ObjectCategory::Meta,
        v20: Some(&["created", "definition_type", "definition"]),
        v21: Some(&["created"]),
    },
    TypeRule {
        object_type: "language-content",
        category: ObjectCategory::Meta,
        v20: None,
        v21: Some(&["created", "modified", "object_ref", "contents"]),
    },
    TypeRule {
        object_type: "extension-definition",
        category: ObjectCategory::Meta,
        v20: None,
        v21: Some(&[
            "created",
            "modified",
            "created_by_ref",
            "name",
            "schema",
            "version",
            "extension_types",
        ]),
    },
    // Cyber-observables (top-level only in 2.1)
    sco("artifact", &[]),
    sco("autonomous-system", &["number"]),
    sco("directory", &["path"]),
    sco("domain-name", &["value"]),
    sco("email-addr", &["value"]),
    sco("email-message", &["is_multipart"]),
    sco("file", &[]),
    sco("ipv4-addr", &["value"]),
    sco("ipv6-addr", &["value"]),
    sco("mac-addr", &["value"]),
    sco("mutex", &["name"]),
    sco("network-traffic", &["protocols"]),
    sco("process", &[]),
    sco("software", &["name"]),
    sco("url", &["value"]),
    sco("user-account", &[]),
    sco("windows-registry-key", &[]),
    sco("x509-certificate", &[]),
];

/// Properties that must hold RFC 3339 timestamps when present
const TIMESTAMP_PROPERTIES: &[&str] = &[
    "created",
    "modified",
    "valid_from",
    "valid_until",
    "first_seen",
    "last_seen",
    "first_observed",
    "last_observed",
    "published",
];

static TYPE_NAME_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[a-z0-9][a-z0-9-]{1,248}[a-z0-9]$").unwrap());

/// Check a type name: lowercase ASCII letters, digits and single hyphens, 3-250 chars
pub fn is_valid_type_name(name: &str) -> bool {
    TYPE_NAME_RE.is_match(name) && !name.contains("--")
}

/// Look up a registered type
pub fn rule_for(object_type: &str) -> Option<&'static TypeRule> {
    TYPE_RULES.iter().find(|r| r.object_type == object_type)
}

/// Category of a type, treating unregistered types as custom
pub fn category_of(object_type: &str) -> ObjectCategory {
    rule_for(object_type)
        .map(|r| r.category)
        .unwrap_or(ObjectCategory::Custom)
}

/// Whether a 2.1 object of this type must carry the version marker
pub fn requires_spec_version(object_type: &str) -> bool {
    category_of(object_type) != ObjectCategory::Observable
}

/// Validator backed by the built-in schema table
#[derive(Debug, Clone)]
pub struct StrictValidator {
    allow_custom: bool,
}

impl StrictValidator {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            allow_custom: config.allow_custom,
        }
    }
}

impl Default for StrictValidator {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

impl ObjectValidator for StrictValidator {
    fn validate(&self, raw: &Value, version: SpecVersion) -> Result<StixObject, ValidationError> {
        let map = raw
            .as_object()
            .ok_or_else(|| ValidationError::NotAnObject(kind_of(raw)))?;

        let object_type = match map.get("type") {
            Some(Value::String(t)) => t.as_str(),
            Some(other) => {
                return Err(ValidationError::InvalidProperty {
                    property: "type".to_string(),
                    reason: format!("expected string, found {}", kind_of(other)),
                });
            }
            None => {
                return Err(ValidationError::MissingProperty {
                    object_type: "object".to_string(),
                    property: "type".to_string(),
                });
            }
        };
        if !is_valid_type_name(object_type) {
            return Err(ValidationError::InvalidType(object_type.to_string()));
        }

        let (category, required) = match rule_for(object_type) {
            Some(rule) => match rule.required(version) {
                Some(required) => (rule.category, required),
                None => {
                    return Err(ValidationError::UnknownType {
                        object_type: object_type.to_string(),
                        version,
                    });
                }
            },
            None if self.allow_custom => (ObjectCategory::Custom, &[][..]),
            None => {
                return Err(ValidationError::UnknownType {
                    object_type: object_type.to_string(),
                    version,
                });
            }
        };

        let id = match map.get("id") {
            Some(Value::String(id)) => StixId::parse(id)?,
            Some(other) => {
                return Err(ValidationError::InvalidProperty {
                    property: "id".to_string(),
                    reason: format!("expected string, found {}", kind_of(other)),
                });
            }
            None => {
                return Err(ValidationError::MissingProperty {
                    object_type: object_type.to_string(),
                    property: "id".to_string(),
                });
            }
        };
        if id.object_type() != object_type {
            return Err(ValidationError::IdTypeMismatch {
                id: id.to_string(),
                object_type: object_type.to_string(),
            });
        }

        check_version_marker(object_type, category, map.get(SPEC_VERSION_PROPERTY), version)?;

        let missing = |property: &str| ValidationError::MissingProperty {
            object_type: object_type.to_string(),
            property: property.to_string(),
        };
        if matches!(category, ObjectCategory::Domain | ObjectCategory::Relationship) {
            for property in ["created", "modified"] {
                if !map.contains_key(property) {
                    return Err(missing(property));
                }
            }
        }
        for &property in required {
            match map.get(property) {
                None | Some(Value::Null) => return Err(missing(property)),
                _ => {}
            }
        }

        for (property, value) in map {
            check_property(property, value)?;
        }
        check_modified_not_before_created(map)?;

        if object_type == "observed-data" {
            check_number_observed(map.get("number_observed"))?;
        }

        Ok(StixObject::new(
            category,
            ObjectBody {
                id,
                properties: map.clone(),
            },
        ))
    }
}

fn check_version_marker(
    object_type: &str,
    category: ObjectCategory,
    marker: Option<&Value>,
    version: SpecVersion,
) -> Result<(), ValidationError> {
    match (version, marker) {
        (SpecVersion::V20, None) => Ok(()),
        (SpecVersion::V20, Some(_)) => Err(ValidationError::UnexpectedProperty {
            property: SPEC_VERSION_PROPERTY.to_string(),
            version,
        }),
        (SpecVersion::V21, Some(Value::String(s))) if s == SpecVersion::V21.as_str() => Ok(()),
        (SpecVersion::V21, Some(other)) => Err(ValidationError::VersionMismatch {
            expected: version,
            found: other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string()),
        }),
        (SpecVersion::V21, None) if category == ObjectCategory::Observable => Ok(()),
        (SpecVersion::V21, None) => Err(ValidationError::MissingProperty {
            object_type: object_type.to_string(),
            property: SPEC_VERSION_PROPERTY.to_string(),
        }),
    }
}

/// Value checks driven by property naming conventions
fn check_property(property: &str, value: &Value) -> Result<(), ValidationError> {
    if TIMESTAMP_PROPERTIES.contains(&property) {
        let ok = value
            .as_str()
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
        if !ok {
            return Err(ValidationError::InvalidTimestamp {
                property: property.to_string(),
                value: value.to_string(),
            });
        }
    } else if property.ends_with("_refs") {
        let refs = value.as_array().ok_or_else(|| ValidationError::InvalidProperty {
            property: property.to_string(),
            reason: format!("expected array, found {}", kind_of(value)),
        })?;
        for r in refs {
            check_reference(property, r)?;
        }
    } else if property.ends_with("_ref") {
        check_reference(property, value)?;
    } else if property == "labels" {
        let labels = value.as_array().ok_or_else(|| ValidationError::InvalidProperty {
            property: property.to_string(),
            reason: format!("expected array, found {}", kind_of(value)),
        })?;
        if labels.is_empty() || !labels.iter().all(Value::is_string) {
            return Err(ValidationError::InvalidProperty {
                property: property.to_string(),
                reason: "expected a non-empty list of strings".to_string(),
            });
        }
    } else if property == "name" && !value.is_string() {
        return Err(ValidationError::InvalidProperty {
            property: property.to_string(),
            reason: format!("expected string, found {}", kind_of(value)),
        });
    }
    Ok(())
}

fn check_reference(property: &str, value: &Value) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidReference {
        property: property.to_string(),
        value: value.to_string(),
    };
    let s = value.as_str().ok_or_else(invalid)?;
    StixId::parse(s).map(|_| ()).map_err(|_| invalid())
}

fn check_modified_not_before_created(
    map: &serde_json::Map<String, Value>,
) -> Result<(), ValidationError> {
    let parse = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    };
    if let (Some(created), Some(modified)) = (parse("created"), parse("modified")) {
        if modified < created {
            return Err(ValidationError::InvalidProperty {
                property: "modified".to_string(),
                reason: "must not be earlier than created".to_string(),
            });
        }
    }
    Ok(())
}

fn check_number_observed(value: Option<&Value>) -> Result<(), ValidationError> {
    let Some(value) = value else {
        return Ok(());
    };
    match value.as_u64() {
        Some(n) if (1..=999_999_999).contains(&n) => Ok(()),
        _ => Err(ValidationError::InvalidProperty {
            property: "number_observed".to_string(),
            reason: format!("expected integer in 1..=999999999, found {value}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn indicator_v21() -> Value {
        json!({
            "type": "indicator",
            "spec_version": "2.1",
            "id": "indicator--8e2e2d2b-17d4-4cbf-938f-98ee46b3cd3f",
            "created": "2016-04-06T20:03:48.000Z",
            "modified": "2016-04-06T20:03:48.000Z",
            "pattern": "[ipv4-addr:value = '198.51.100.1']",
            "pattern_type": "stix",
            "valid_from": "2016-01-01T00:00:00Z"
        })
    }

    fn indicator_v20() -> Value {
        json!({
            "type": "indicator",
            "id": "indicator--8e2e2d2b-17d4-4cbf-938f-98ee46b3cd3f",
            "created": "2016-04-06T20:03:48.000Z",
            "modified": "2016-04-06T20:03:48.000Z",
            "labels": ["malicious-activity"],
            "pattern": "[ipv4-addr:value = '198.51.100.1']",
            "valid_from": "2016-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_valid_indicator_per_version() {
        let v = StrictValidator::default();
        let obj = v.validate(&indicator_v21(), SpecVersion::V21).unwrap();
        assert_eq!(obj.category(), ObjectCategory::Domain);
        assert_eq!(obj.object_type(), "indicator");

        assert!(v.validate(&indicator_v20(), SpecVersion::V20).is_ok());
    }

    #[test]
    fn test_marker_rules() {
        let v = StrictValidator::default();
        // 2.1 object parsed as 2.0 carries a forbidden marker
        assert!(matches!(
            v.validate(&indicator_v21(), SpecVersion::V20),
            Err(ValidationError::UnexpectedProperty { .. })
        ));
        // 2.0 object parsed as 2.1 lacks the marker
        assert!(matches!(
            v.validate(&indicator_v20(), SpecVersion::V21),
            Err(ValidationError::MissingProperty { .. })
        ));
    }

    #[test]
    fn test_missing_required_property() {
        let mut raw = indicator_v21();
        raw.as_object_mut().unwrap().remove("pattern_type");
        let err = StrictValidator::default()
            .validate(&raw, SpecVersion::V21)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingProperty {
                object_type: "indicator".to_string(),
                property: "pattern_type".to_string()
            }
        );
    }

    #[test]
    fn test_type_unknown_in_version() {
        let raw = json!({
            "type": "ipv4-addr",
            "id": "ipv4-addr--ff26c055-6336-5bc5-b98d-13d6226742dd",
            "value": "198.51.100.3"
        });
        let v = StrictValidator::default();
        assert!(v.validate(&raw, SpecVersion::V21).is_ok());
        assert!(matches!(
            v.validate(&raw, SpecVersion::V20),
            Err(ValidationError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_custom_objects_follow_config() {
        let raw = json!({
            "type": "x-misp-object",
            "spec_version": "2.1",
            "id": "x-misp-object--ff26c055-6336-5bc5-b98d-13d6226742dd"
        });
        let permissive = StrictValidator::default();
        assert_eq!(
            permissive.validate(&raw, SpecVersion::V21).unwrap().category(),
            ObjectCategory::Custom
        );

        let strict = StrictValidator::new(&LoaderConfig { allow_custom: false });
        assert!(strict.validate(&raw, SpecVersion::V21).is_err());
    }

    #[test]
    fn test_bad_reference_and_timestamp() {
        let v = StrictValidator::default();

        let mut raw = indicator_v21();
        raw["created_by_ref"] = json!("not-an-id");
        assert!(matches!(
            v.validate(&raw, SpecVersion::V21),
            Err(ValidationError::InvalidReference { .. })
        ));

        let mut raw = indicator_v21();
        raw["valid_from"] = json!("yesterday");
        assert!(matches!(
            v.validate(&raw, SpecVersion::V21),
            Err(ValidationError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_id_must_match_type() {
        let mut raw = indicator_v21();
        raw["id"] = json!("malware--8e2e2d2b-17d4-4cbf-938f-98ee46b3cd3f");
        assert!(matches!(
            StrictValidator::default().validate(&raw, SpecVersion::V21),
            Err(ValidationError::IdTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_modified_before_created() {
        let mut raw = indicator_v21();
        raw["modified"] = json!("2015-01-01T00:00:00Z");
        assert!(StrictValidator::default().validate(&raw, SpecVersion::V21).is_err());
    }

    #[test]
    fn test_type_name_rules() {
        assert!(is_valid_type_name("attack-pattern"));
        assert!(is_valid_type_name("x-misp-galaxy-cluster"));
        assert!(!is_valid_type_name("ab"));
        assert!(!is_valid_type_name("Attack-Pattern"));
        assert!(!is_valid_type_name("bad--type"));
        assert!(!is_valid_type_name("-leading"));
    }

    #[test]
    fn test_requires_spec_version() {
        assert!(requires_spec_version("indicator"));
        assert!(requires_spec_version("x-custom"));
        assert!(!requires_spec_version("ipv4-addr"));
    }
}
