// tests/loader.rs

//! Integration tests for tolerant STIX loading.
//!
//! These tests verify that:
//! 1. Valid documents load unchanged with an empty quarantine
//! 2. Invalid objects are quarantined while the rest of the bundle survives
//! 3. A document labelled with the wrong sub-version is reinterpreted whole
//! 4. Loaded bundles drive the dispatcher's origin detection

mod common;

use common::{bundle, indicator_v20, indicator_v21, malware_v21};
use serde_json::json;
use transmute::config::LoaderConfig;
use transmute::conversion::{ConversionDispatcher, ConvertOptions, SourceOrigin};
use transmute::stix::{ContentLoader, LoadPath};
use transmute::{Error, SpecVersion};

const BUNDLE_ID: &str = "bundle--5d0092c5-5f74-4287-9642-33f4c354e56d";
const INDICATOR_X: &str = "indicator--a740531e-63ff-4e49-a9e1-a0a3eed0e3e7";
const INDICATOR_Y: &str = "indicator--c410e480-e42b-47d1-9476-85307c12bcbf";
const MALWARE: &str = "malware--31b940d4-6f7f-459a-80ea-9c1f17b5891b";

fn loader() -> ContentLoader {
    ContentLoader::new(&LoaderConfig::default())
}

#[test]
fn test_valid_bundle_loads_every_object() {
    let document = bundle(
        BUNDLE_ID,
        None,
        vec![indicator_v21(INDICATOR_X), malware_v21(MALWARE)],
    );

    let outcome = loader().load(document.to_string()).unwrap();
    assert_eq!(outcome.path, LoadPath::Strict);
    assert!(outcome.quarantine.is_empty());
    assert_eq!(outcome.bundle.len(), 2);
    assert_eq!(outcome.bundle.spec_version, SpecVersion::V21);
    assert_eq!(outcome.bundle.id.to_string(), BUNDLE_ID);
}

#[test]
fn test_one_malformed_indicator_is_quarantined() {
    let malformed = json!({
        "type": "indicator",
        "spec_version": "2.1",
        "id": INDICATOR_Y,
        "created": "2023-03-01T10:00:00.000Z",
        "modified": "2023-03-01T10:00:00.000Z"
    });
    let document = json!([indicator_v21(INDICATOR_X), malformed.clone()]);

    let outcome = loader().load(document).unwrap();
    assert_eq!(outcome.path, LoadPath::Reconstructed);
    assert_eq!(outcome.bundle.len(), 1);
    assert!(outcome.bundle.find(INDICATOR_X).is_some());
    assert_eq!(outcome.quarantined_ids(), vec![INDICATOR_Y.to_string()]);
    assert_eq!(outcome.quarantine.get(INDICATOR_Y), Some(&malformed));
}

#[test]
fn test_quarantine_keeps_source_bundle_id() {
    let mut broken = malware_v21(MALWARE);
    broken.as_object_mut().unwrap().remove("is_family");
    let document = bundle(BUNDLE_ID, None, vec![indicator_v21(INDICATOR_X), broken]);

    let outcome = loader().load(document).unwrap();
    assert_eq!(outcome.bundle.id.to_string(), BUNDLE_ID);
    assert_eq!(outcome.bundle.len(), 1);
    assert!(outcome.quarantine.contains(MALWARE));
}

#[test]
fn test_mislabelled_bundle_is_reinterpreted() {
    // 2.1-shaped objects in a bundle claiming 2.0
    let document = bundle(
        BUNDLE_ID,
        Some("2.0"),
        vec![indicator_v21(INDICATOR_X), malware_v21(MALWARE)],
    );

    let outcome = loader().load(document.to_string().into_bytes()).unwrap();
    assert!(matches!(outcome.path, LoadPath::Reinterpreted { .. }));
    assert!(outcome.quarantine.is_empty());
    assert_eq!(outcome.bundle.len(), 2);
    assert_eq!(outcome.bundle.spec_version, SpecVersion::V21);
}

#[test]
fn test_v20_bundle_loads_strictly() {
    let document = bundle(
        BUNDLE_ID,
        Some("2.0"),
        vec![indicator_v20(INDICATOR_X), indicator_v20(INDICATOR_Y)],
    );

    let outcome = loader().load(document).unwrap();
    assert_eq!(outcome.path, LoadPath::Strict);
    assert_eq!(outcome.bundle.spec_version, SpecVersion::V20);
    assert_eq!(outcome.bundle.len(), 2);

    // 2.0 bundles keep the version on the bundle when serialized
    let value = outcome.bundle.to_value();
    assert_eq!(value["spec_version"], "2.0");
}

#[test]
fn test_unparseable_input_fails() {
    let result = loader().load("{\"type\": \"bundle\", ");
    assert!(matches!(result, Err(Error::MalformedInput(_))));
}

#[test]
fn test_nothing_valid_fails() {
    let document = json!([
        {"type": "indicator", "id": INDICATOR_X},
        {"type": "indicator", "id": INDICATOR_Y}
    ]);
    let result = loader().load(document);
    assert!(matches!(result, Err(Error::NoValidObjects { quarantined: 2 })));
}

#[test]
fn test_loaded_bundle_selects_external_origin() {
    let outcome = loader()
        .load(json!([indicator_v21(INDICATOR_X)]))
        .unwrap();

    let options = ConvertOptions {
        cluster_distribution: Some(2),
        galaxies_as_tags: false,
        single_event: true,
        ..Default::default()
    };
    let call = ConversionDispatcher::new()
        .stix_to_misp(&outcome.bundle, &options)
        .unwrap();

    assert_eq!(call.origin, Some(SourceOrigin::External));
    assert_eq!(call.arguments.get("cluster_distribution"), Some("2"));
    assert!(!call.arguments.contains_key("galaxies_as_tags"));
    assert!(call.arguments.contains_key("single_event"));
}

#[test]
fn test_urn_form_identifier_is_quarantined() {
    let urn_id = "indicator--urn:uuid:c410e480-e42b-47d1-9476-85307c12bcbf";
    let document = json!([indicator_v21(INDICATOR_X), indicator_v21(urn_id)]);

    let outcome = loader().load(document).unwrap();
    assert_eq!(outcome.bundle.len(), 1);
    assert!(outcome.bundle.find(INDICATOR_X).is_some());
    assert!(outcome.quarantine.contains(urn_id));
}
