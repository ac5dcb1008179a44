// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use tempfile::TempDir;
use transmute::Result;
use transmute::conversion::{ConverterCall, FormatConverter};
use transmute::db;
use transmute::db::models::{Artifact, NewArtifact};
use transmute::{ConversionKind, TransmuteConfig};

/// Create an initialized test database.
///
/// Returns (TempDir, db_path) - keep the TempDir alive to prevent cleanup.
pub fn setup_test_db() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");
    db::init(&db_path).unwrap();
    (temp_dir, db_path)
}

/// Store an artifact with the given input and output.
pub fn create_artifact(
    conn: &mut rusqlite::Connection,
    kind: ConversionKind,
    input: &str,
    output: &str,
) -> Artifact {
    let config = TransmuteConfig::default();
    db::transaction(conn, |tx| {
        Artifact::create(
            tx,
            NewArtifact::new(kind, input.to_string(), output.to_string()),
            &config.naming,
        )
    })
    .unwrap()
}

/// In-process stand-in for the external converter.
///
/// Returns queued responses in order, then echoes the document back.
#[derive(Default)]
pub struct ScriptedConverter {
    responses: RefCell<VecDeque<Value>>,
    calls: RefCell<Vec<ConverterCall>>,
}

impl ScriptedConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, response: Value) {
        self.responses.borrow_mut().push_back(response);
    }

    pub fn calls(&self) -> Vec<ConverterCall> {
        self.calls.borrow().clone()
    }
}

impl FormatConverter for &ScriptedConverter {
    fn convert(&self, call: &ConverterCall, document: &Value) -> Result<Value> {
        self.calls.borrow_mut().push(call.clone());
        Ok(self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| json!({"echo": document})))
    }
}

/// A valid STIX 2.1 indicator.
pub fn indicator_v21(id: &str) -> Value {
    json!({
        "type": "indicator",
        "spec_version": "2.1",
        "id": id,
        "created": "2023-03-01T10:00:00.000Z",
        "modified": "2023-03-01T10:00:00.000Z",
        "name": "Known C2",
        "pattern": "[ipv4-addr:value = '203.0.113.10']",
        "pattern_type": "stix",
        "valid_from": "2023-03-01T10:00:00Z"
    })
}

/// A valid STIX 2.0 indicator.
pub fn indicator_v20(id: &str) -> Value {
    json!({
        "type": "indicator",
        "id": id,
        "created": "2023-03-01T10:00:00.000Z",
        "modified": "2023-03-01T10:00:00.000Z",
        "labels": ["malicious-activity"],
        "pattern": "[ipv4-addr:value = '203.0.113.10']",
        "valid_from": "2023-03-01T10:00:00Z"
    })
}

/// A valid STIX 2.1 malware object.
pub fn malware_v21(id: &str) -> Value {
    json!({
        "type": "malware",
        "spec_version": "2.1",
        "id": id,
        "created": "2023-03-01T10:00:00.000Z",
        "modified": "2023-03-01T10:00:00.000Z",
        "name": "Loader",
        "is_family": true
    })
}

/// Wrap objects in a bundle, marked 2.0 when `version` is given.
pub fn bundle(id: &str, version: Option<&str>, objects: Vec<Value>) -> Value {
    let mut bundle = json!({
        "type": "bundle",
        "id": id,
        "objects": objects,
    });
    if let Some(version) = version {
        bundle["spec_version"] = Value::String(version.to_string());
    }
    bundle
}
