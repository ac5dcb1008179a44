// src/conversion/dispatcher.rs

//! Maps user-supplied conversion options onto converter arguments
//!
//! The external converter's argument parser treats a boolean key as true
//! whenever it is present, whatever its value. Boolean options are therefore
//! only ever emitted when true, as a key with an empty value.

use super::ConversionKind;
use crate::error::{Error, Result};
use crate::stix::{Bundle, SpecVersion};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

pub const KEY_DISTRIBUTION: &str = "distribution";
pub const KEY_SHARING_GROUP_ID: &str = "sharing_group_id";
pub const KEY_GALAXIES_AS_TAGS: &str = "galaxies_as_tags";
pub const KEY_NO_FORCE_CONTEXTUAL_DATA: &str = "no_force_contextual_data";
pub const KEY_CLUSTER_DISTRIBUTION: &str = "cluster_distribution";
pub const KEY_CLUSTER_SHARING_GROUP_ID: &str = "cluster_sharing_group_id";
pub const KEY_ORGANISATION_UUID: &str = "organisation_uuid";
pub const KEY_SINGLE_EVENT: &str = "single_event";
pub const KEY_PRODUCER: &str = "producer";
pub const KEY_TITLE: &str = "title";
pub const KEY_VERSION: &str = "version";

/// Highest distribution level (4 = sharing group)
pub const MAX_DISTRIBUTION: u8 = 4;

/// Keys only the externally-produced STIX path understands
const EXTERNAL_ONLY_KEYS: &[&str] = &[
    KEY_NO_FORCE_CONTEXTUAL_DATA,
    KEY_CLUSTER_DISTRIBUTION,
    KEY_CLUSTER_SHARING_GROUP_ID,
    KEY_ORGANISATION_UUID,
];

/// Options a user can set for a conversion
///
/// Everything is optional. A sharing group id is meaningful when the
/// distribution is 4, but enforcing that is left to the converter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    pub distribution: Option<u8>,
    pub sharing_group_id: Option<u32>,
    pub galaxies_as_tags: bool,
    pub no_force_contextual_data: bool,
    pub cluster_distribution: Option<u8>,
    pub cluster_sharing_group_id: Option<u32>,
    pub organisation_uuid: Option<Uuid>,
    pub single_event: bool,
    pub producer: Option<String>,
    pub title: Option<String>,
    /// Target STIX version for MISP to STIX
    pub version: Option<SpecVersion>,
}

impl ConvertOptions {
    /// Parse form-style `key=value` pairs
    ///
    /// Empty values count as absent. Booleans accept the usual spellings and
    /// treat `""`, `false`, `False`, `0`, `off` and `no` as false.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            let key = key.as_ref().trim();
            let value = value.as_ref().trim();
            match key {
                KEY_DISTRIBUTION => options.distribution = parse_level(key, value)?,
                KEY_SHARING_GROUP_ID => options.sharing_group_id = parse_id(key, value)?,
                KEY_GALAXIES_AS_TAGS => options.galaxies_as_tags = parse_flag(key, value)?,
                KEY_NO_FORCE_CONTEXTUAL_DATA => {
                    options.no_force_contextual_data = parse_flag(key, value)?
                }
                KEY_CLUSTER_DISTRIBUTION => {
                    options.cluster_distribution = parse_level(key, value)?
                }
                KEY_CLUSTER_SHARING_GROUP_ID => {
                    options.cluster_sharing_group_id = parse_id(key, value)?
                }
                KEY_ORGANISATION_UUID => {
                    options.organisation_uuid = if value.is_empty() {
                        None
                    } else {
                        Some(
                            Uuid::parse_str(value)
                                .map_err(|e| Error::invalid_option(key, e.to_string()))?,
                        )
                    }
                }
                KEY_SINGLE_EVENT => options.single_event = parse_flag(key, value)?,
                KEY_PRODUCER => options.producer = parse_text(value),
                KEY_TITLE => options.title = parse_text(value),
                KEY_VERSION => {
                    options.version = if value.is_empty() {
                        None
                    } else {
                        Some(value.parse().map_err(|e| Error::invalid_option(key, e))?)
                    }
                }
                other => return Err(Error::invalid_option(other, "unknown option")),
            }
        }
        options.validate()?;
        Ok(options)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        for (key, level) in [
            (KEY_DISTRIBUTION, self.distribution),
            (KEY_CLUSTER_DISTRIBUTION, self.cluster_distribution),
        ] {
            if let Some(level) = level {
                check_level(key, level)?;
            }
        }
        Ok(())
    }
}

fn check_level(key: &str, level: u8) -> Result<()> {
    if level > MAX_DISTRIBUTION {
        return Err(Error::invalid_option(
            key,
            format!("expected 0-{MAX_DISTRIBUTION}, got {level}"),
        ));
    }
    Ok(())
}

fn parse_level(key: &str, value: &str) -> Result<Option<u8>> {
    if value.is_empty() {
        return Ok(None);
    }
    let level: u8 = value
        .parse()
        .map_err(|_| Error::invalid_option(key, format!("expected 0-{MAX_DISTRIBUTION}, got {value}")))?;
    check_level(key, level)?;
    Ok(Some(level))
}

fn parse_id(key: &str, value: &str) -> Result<Option<u32>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::invalid_option(key, format!("expected a numeric id, got {value}")))
}

/// Parse a form boolean
pub fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "off" | "no" | "n" => Ok(false),
        "true" | "1" | "on" | "yes" | "y" => Ok(true),
        _ => Err(Error::invalid_option(key, format!("expected a boolean, got {value}"))),
    }
}

fn parse_text(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Argument set passed to the external converter, as query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterArguments {
    params: BTreeMap<String, String>,
}

impl ConverterArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.params.insert(key.to_string(), value.into());
    }

    /// Present-means-true flag; nothing is written for false
    pub fn insert_flag(&mut self, key: &str, enabled: bool) {
        if enabled {
            self.params.insert(key.to_string(), String::new());
        }
    }

    fn insert_opt<T: ToString>(&mut self, key: &str, value: Option<T>) {
        if let Some(value) = value {
            self.params.insert(key.to_string(), value.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.params.retain(|k, _| keep(k));
    }
}

/// Where a STIX document came from, as far as the converter cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Produced by the MISP exporter; converted back by the internal parser
    MispExported,
    /// Produced elsewhere
    External,
}

impl SourceOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOrigin::MispExported => "misp",
            SourceOrigin::External => "external",
        }
    }

    /// Whether the converter variant for this origin understands `key`
    pub fn accepts(&self, key: &str) -> bool {
        match self {
            SourceOrigin::External => true,
            SourceOrigin::MispExported => !EXTERNAL_ONLY_KEYS.contains(&key),
        }
    }
}

/// Decides whether a bundle was produced by the MISP exporter
pub trait OriginDetector {
    fn detect(&self, bundle: &Bundle) -> SourceOrigin;
}

/// Recognizes MISP exports by `misp:` labels or `x-misp-` custom types
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelOriginDetector;

impl OriginDetector for LabelOriginDetector {
    fn detect(&self, bundle: &Bundle) -> SourceOrigin {
        let from_misp = bundle.objects.iter().any(|object| {
            object.object_type().starts_with("x-misp-")
                || object
                    .body()
                    .get("labels")
                    .and_then(Value::as_array)
                    .is_some_and(|labels| {
                        labels
                            .iter()
                            .filter_map(Value::as_str)
                            .any(|label| label.starts_with("misp:"))
                    })
        });
        if from_misp {
            SourceOrigin::MispExported
        } else {
            SourceOrigin::External
        }
    }
}

/// A fully resolved converter invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterCall {
    pub kind: ConversionKind,
    /// Detected origin, for STIX to MISP only
    pub origin: Option<SourceOrigin>,
    pub arguments: ConverterArguments,
}

/// Builds converter arguments and picks the converter variant
#[derive(Debug, Clone, Default)]
pub struct ConversionDispatcher<D = LabelOriginDetector> {
    detector: D,
}

impl ConversionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: OriginDetector> ConversionDispatcher<D> {
    pub fn with_detector(detector: D) -> Self {
        Self { detector }
    }

    /// Full STIX to MISP argument set for a set of options
    pub fn build_arguments(&self, options: &ConvertOptions) -> Result<ConverterArguments> {
        options.validate()?;

        let mut args = ConverterArguments::new();
        args.insert_opt(KEY_DISTRIBUTION, options.distribution);
        args.insert_opt(KEY_SHARING_GROUP_ID, options.sharing_group_id);
        args.insert_flag(KEY_GALAXIES_AS_TAGS, options.galaxies_as_tags);
        args.insert_flag(KEY_NO_FORCE_CONTEXTUAL_DATA, options.no_force_contextual_data);
        args.insert_opt(KEY_CLUSTER_DISTRIBUTION, options.cluster_distribution);
        args.insert_opt(KEY_CLUSTER_SHARING_GROUP_ID, options.cluster_sharing_group_id);
        args.insert_opt(KEY_ORGANISATION_UUID, options.organisation_uuid);
        args.insert_flag(KEY_SINGLE_EVENT, options.single_event);
        args.insert_opt(KEY_PRODUCER, options.producer.as_deref());
        args.insert_opt(KEY_TITLE, options.title.as_deref());
        Ok(args)
    }

    /// MISP to STIX takes only the target version (2.1 unless set)
    pub fn misp_to_stix(&self, options: &ConvertOptions) -> ConverterCall {
        let mut arguments = ConverterArguments::new();
        arguments.insert(KEY_VERSION, options.version.unwrap_or(SpecVersion::V21).as_str());
        ConverterCall {
            kind: ConversionKind::MispToStix,
            origin: None,
            arguments,
        }
    }

    /// STIX to MISP arguments narrowed to what the detected variant accepts
    pub fn stix_to_misp(&self, bundle: &Bundle, options: &ConvertOptions) -> Result<ConverterCall> {
        let origin = self.detector.detect(bundle);
        let mut arguments = self.build_arguments(options)?;
        let before = arguments.len();
        arguments.retain(|key| origin.accepts(key));
        if arguments.len() != before {
            debug!(
                "Dropped {} argument(s) not used for {} STIX content",
                before - arguments.len(),
                origin.as_str()
            );
        }
        Ok(ConverterCall {
            kind: ConversionKind::StixToMisp,
            origin: Some(origin),
            arguments,
        })
    }

    /// Dispatch on conversion direction
    pub fn dispatch(
        &self,
        kind: ConversionKind,
        bundle: Option<&Bundle>,
        options: &ConvertOptions,
    ) -> Result<ConverterCall> {
        match (kind, bundle) {
            (ConversionKind::MispToStix, _) => Ok(self.misp_to_stix(options)),
            (ConversionKind::StixToMisp, Some(bundle)) => self.stix_to_misp(bundle, options),
            (ConversionKind::StixToMisp, None) => Err(Error::ConversionFailed(
                "STIX to MISP needs a loaded bundle".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::stix::ContentLoader;
    use serde_json::json;

    const FLAGS: [&str; 3] = [KEY_GALAXIES_AS_TAGS, KEY_NO_FORCE_CONTEXTUAL_DATA, KEY_SINGLE_EVENT];

    fn bundle_with_labels(labels: Value) -> Bundle {
        let doc = json!([{
            "type": "indicator",
            "spec_version": "2.1",
            "id": "indicator--11111111-1111-4111-8111-111111111111",
            "created": "2020-01-01T00:00:00Z",
            "modified": "2020-01-01T00:00:00Z",
            "pattern": "[ipv4-addr:value = '198.51.100.1']",
            "pattern_type": "stix",
            "valid_from": "2020-01-01T00:00:00Z",
            "labels": labels
        }]);
        ContentLoader::new(&LoaderConfig::default()).load(doc).unwrap().bundle
    }

    #[test]
    fn test_false_flags_are_omitted() {
        let args = ConversionDispatcher::new()
            .build_arguments(&ConvertOptions::default())
            .unwrap();
        assert!(args.is_empty());
        for flag in FLAGS {
            assert!(!args.contains_key(flag));
        }
    }

    #[test]
    fn test_true_flags_are_present_and_empty() {
        let options = ConvertOptions {
            galaxies_as_tags: true,
            no_force_contextual_data: true,
            single_event: true,
            ..Default::default()
        };
        let args = ConversionDispatcher::new().build_arguments(&options).unwrap();
        for flag in FLAGS {
            assert_eq!(args.get(flag), Some(""));
        }
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_values_are_stringified() {
        let org = Uuid::parse_str("5f6e7d8c-1234-4a5b-9c8d-0123456789ab").unwrap();
        let options = ConvertOptions {
            distribution: Some(4),
            sharing_group_id: Some(12),
            cluster_distribution: Some(0),
            organisation_uuid: Some(org),
            producer: Some("CIRCL".to_string()),
            title: Some("Daily feed".to_string()),
            ..Default::default()
        };
        let args = ConversionDispatcher::new().build_arguments(&options).unwrap();
        assert_eq!(args.get(KEY_DISTRIBUTION), Some("4"));
        assert_eq!(args.get(KEY_SHARING_GROUP_ID), Some("12"));
        assert_eq!(args.get(KEY_CLUSTER_DISTRIBUTION), Some("0"));
        assert_eq!(args.get(KEY_ORGANISATION_UUID), Some(org.to_string().as_str()));
        assert_eq!(args.get(KEY_PRODUCER), Some("CIRCL"));
        assert_eq!(args.get(KEY_TITLE), Some("Daily feed"));
    }

    #[test]
    fn test_from_pairs_treats_false_spellings_as_absent() {
        let options = ConvertOptions::from_pairs([
            ("distribution", "1"),
            ("sharing_group_id", ""),
            ("galaxies_as_tags", "False"),
            ("single_event", "True"),
            ("no_force_contextual_data", ""),
            ("producer", "  "),
        ])
        .unwrap();
        assert_eq!(options.distribution, Some(1));
        assert_eq!(options.sharing_group_id, None);
        assert!(!options.galaxies_as_tags);
        assert!(options.single_event);
        assert_eq!(options.producer, None);

        let args = ConversionDispatcher::new().build_arguments(&options).unwrap();
        assert!(!args.contains_key(KEY_GALAXIES_AS_TAGS));
        assert_eq!(args.get(KEY_SINGLE_EVENT), Some(""));
    }

    #[test]
    fn test_out_of_range_levels_are_rejected() {
        assert!(matches!(
            ConvertOptions::from_pairs([("distribution", "5")]),
            Err(Error::InvalidOption { .. })
        ));
        assert!(ConvertOptions::from_pairs([("cluster_distribution", "-1")]).is_err());
        assert!(ConvertOptions::from_pairs([("organisation_uuid", "acme")]).is_err());
        assert!(ConvertOptions::from_pairs([("single_event", "maybe")]).is_err());
        assert!(ConvertOptions::from_pairs([("colour", "red")]).is_err());

        let options = ConvertOptions {
            cluster_distribution: Some(9),
            ..Default::default()
        };
        assert!(ConversionDispatcher::new().build_arguments(&options).is_err());
    }

    #[test]
    fn test_misp_to_stix_defaults_to_v21() {
        let dispatcher = ConversionDispatcher::new();
        let call = dispatcher.misp_to_stix(&ConvertOptions::default());
        assert_eq!(call.kind, ConversionKind::MispToStix);
        assert_eq!(call.arguments.get(KEY_VERSION), Some("2.1"));

        let options = ConvertOptions::from_pairs([("version", "2.0")]).unwrap();
        assert_eq!(dispatcher.misp_to_stix(&options).arguments.get(KEY_VERSION), Some("2.0"));
    }

    #[test]
    fn test_origin_detection_narrows_arguments() {
        let options = ConvertOptions {
            distribution: Some(0),
            no_force_contextual_data: true,
            cluster_distribution: Some(2),
            cluster_sharing_group_id: Some(3),
            single_event: true,
            ..Default::default()
        };
        let dispatcher = ConversionDispatcher::new();

        let misp = bundle_with_labels(json!(["misp:name=\"ip-src\""]));
        let call = dispatcher.stix_to_misp(&misp, &options).unwrap();
        assert_eq!(call.origin, Some(SourceOrigin::MispExported));
        assert!(!call.arguments.contains_key(KEY_CLUSTER_DISTRIBUTION));
        assert!(!call.arguments.contains_key(KEY_CLUSTER_SHARING_GROUP_ID));
        assert!(!call.arguments.contains_key(KEY_NO_FORCE_CONTEXTUAL_DATA));
        assert_eq!(call.arguments.get(KEY_SINGLE_EVENT), Some(""));

        let external = bundle_with_labels(json!(["malicious-activity"]));
        let call = dispatcher.stix_to_misp(&external, &options).unwrap();
        assert_eq!(call.origin, Some(SourceOrigin::External));
        assert_eq!(call.arguments.get(KEY_CLUSTER_DISTRIBUTION), Some("2"));
        assert_eq!(call.arguments.get(KEY_NO_FORCE_CONTEXTUAL_DATA), Some(""));
    }

    #[test]
    fn test_injected_detector() {
        struct AlwaysMisp;
        impl OriginDetector for AlwaysMisp {
            fn detect(&self, _bundle: &Bundle) -> SourceOrigin {
                SourceOrigin::MispExported
            }
        }

        let bundle = bundle_with_labels(json!(["benign"]));
        let call = ConversionDispatcher::with_detector(AlwaysMisp)
            .dispatch(ConversionKind::StixToMisp, Some(&bundle), &ConvertOptions::default())
            .unwrap();
        assert_eq!(call.origin, Some(SourceOrigin::MispExported));
    }
}
