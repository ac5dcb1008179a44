// src/stix/quarantine.rs

//! Per-object validation with quarantine
//!
//! Objects are validated one at a time against a single sub-version.
//! Objects that pass are kept in arrival order; objects that fail are set
//! aside keyed by their declared identifier instead of failing the batch.
//!
//! An identifier is either kept or quarantined, never both: when a failing
//! object shares its identifier with objects that passed, those objects are
//! evicted from the kept set.

use super::{ObjectValidator, SpecVersion, StixObject, ValidationError};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::collections::btree_map::Entry;
use tracing::{debug, warn};

/// A raw object that failed strict validation
#[derive(Debug, Clone, PartialEq)]
pub struct QuarantinedObject {
    /// The object exactly as received
    pub raw: Value,
    /// Why validation failed
    pub reason: ValidationError,
    /// Position in the source document
    pub index: usize,
    /// False when the key was synthesized because the object had no usable id
    pub has_declared_id: bool,
}

/// Quarantined objects keyed by identifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quarantine {
    entries: BTreeMap<String, QuarantinedObject>,
}

impl Quarantine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Raw representation of a quarantined object
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.entries.get(id).map(|e| &e.raw)
    }

    pub fn entry(&self, id: &str) -> Option<&QuarantinedObject> {
        self.entries.get(id)
    }

    /// Quarantined identifiers in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QuarantinedObject)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Record a failure; the first failure for an identifier is kept
    fn insert(&mut self, key: String, object: QuarantinedObject) {
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(object);
            }
            Entry::Occupied(slot) => {
                debug!(
                    "Object {} repeats quarantined id {}; keeping the first failure",
                    object.index,
                    slot.key()
                );
            }
        }
    }
}

/// Key used for an object that has no usable identifier
pub fn missing_id_key(raw: &Value, index: usize) -> String {
    let object_type = raw
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| super::schema::is_valid_type_name(t))
        .unwrap_or("unknown");
    format!("{object_type}--missing-id-{index}")
}

/// Splits raw objects into validated objects and a quarantine
pub struct ObjectQuarantine<'v> {
    validator: &'v dyn ObjectValidator,
    version: SpecVersion,
}

impl<'v> ObjectQuarantine<'v> {
    pub fn new(validator: &'v dyn ObjectValidator, version: SpecVersion) -> Self {
        Self { validator, version }
    }

    pub fn version(&self) -> SpecVersion {
        self.version
    }

    /// Validate every object, keeping passes in order and quarantining failures
    pub fn sort(&self, objects: &[Value]) -> (Vec<StixObject>, Quarantine) {
        let mut kept = Vec::with_capacity(objects.len());
        let mut quarantine = Quarantine::new();

        for (index, raw) in objects.iter().enumerate() {
            match self.validator.validate(raw, self.version) {
                Ok(object) => kept.push(object),
                Err(reason) => {
                    let declared = raw.get("id").and_then(Value::as_str);
                    let (key, has_declared_id) = match declared {
                        Some(id) if !id.is_empty() => (id.to_string(), true),
                        _ => {
                            let key = missing_id_key(raw, index);
                            warn!(
                                "Object {} has no identifier; quarantined as {}",
                                index, key
                            );
                            (key, false)
                        }
                    };
                    debug!("Quarantining {}: {}", key, reason);
                    quarantine.insert(
                        key,
                        QuarantinedObject {
                            raw: raw.clone(),
                            reason,
                            index,
                            has_declared_id,
                        },
                    );
                }
            }
        }

        // Survivors carry the normalized id while keys are raw; compare both lowercased
        let evicted: BTreeSet<String> = quarantine.ids().map(str::to_ascii_lowercase).collect();
        let before = kept.len();
        kept.retain(|o: &StixObject| !evicted.contains(&o.id().to_string()));
        if kept.len() != before {
            warn!(
                "Evicted {} valid object(s) sharing an id with a quarantined object",
                before - kept.len()
            );
        }

        (kept, quarantine)
    }
}
