// src/conversion/naming.rs

//! Artifact naming rules
//!
//! Generated names follow `<OUTPUT>_<YYYYmmddHHMMSS>`. A name that is already
//! taken gets `_<SUFFIX>` appended, where the suffix is random uppercase
//! letters and digits, and the base is cut so the result fits the length
//! limit. Lengths are counted in characters.

use super::ConversionKind;
use crate::config::NamingConfig;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;

const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Name used when the user supplies none
pub fn default_name(kind: ConversionKind, now: DateTime<Utc>) -> String {
    format!("{}_{}", kind.name_prefix(), now.format("%Y%m%d%H%M%S"))
}

/// Description used when the user supplies none
pub fn default_description(kind: ConversionKind, now: DateTime<Utc>) -> String {
    let direction = match kind {
        ConversionKind::MispToStix => "MISP to STIX",
        ConversionKind::StixToMisp => "STIX to MISP",
    };
    format!("{direction} conversion saved at {}", now.to_rfc3339())
}

/// First `max` characters of `s`
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Random `[A-Z0-9]` suffix
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

/// `name` with `_<suffix>` appended, cut to the configured limit
pub fn with_suffix(name: &str, suffix: &str, config: &NamingConfig) -> String {
    let suffix_chars = suffix.chars().count();
    let base_len = config.max_name_len.saturating_sub(suffix_chars + 1);
    let candidate = format!("{}_{}", truncate_chars(name, base_len), suffix);
    truncate_chars(&candidate, config.max_name_len).to_string()
}

/// Collision-avoiding variant of `name`
pub fn disambiguate(name: &str, config: &NamingConfig) -> String {
    with_suffix(name, &random_suffix(config.suffix_len), config)
}

/// Random alphanumeric secret for share links
pub fn generate_share_key(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Name and description found in the input content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSuggestion {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Suggest a name from the input document
///
/// MISP input uses the event `info`; STIX input uses the name and
/// description of the first report or grouping.
pub fn suggest(kind: ConversionKind, input: &str) -> NameSuggestion {
    let Ok(document) = serde_json::from_str::<Value>(input) else {
        return NameSuggestion::default();
    };
    match kind {
        ConversionKind::MispToStix => {
            let info = misp_event_info(&document);
            NameSuggestion {
                description: info.map(|i| format!("MISP to STIX conversion - {i}")),
                name: info.map(str::to_string),
            }
        }
        ConversionKind::StixToMisp => stix_report_name(&document),
    }
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn misp_event_info(document: &Value) -> Option<&str> {
    let event = match document {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let event = event.get("Event").unwrap_or(event);
    non_empty(event.get("info"))
}

fn stix_report_name(document: &Value) -> NameSuggestion {
    let objects = match document {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("objects") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => std::slice::from_ref(document),
        },
        _ => &[],
    };
    objects
        .iter()
        .find(|o| {
            matches!(o.get("type").and_then(Value::as_str), Some("report" | "grouping"))
                && non_empty(o.get("name")).is_some()
        })
        .map(|o| NameSuggestion {
            name: non_empty(o.get("name")).map(str::to_string),
            description: non_empty(o.get("description")).map(str::to_string),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_name_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(default_name(ConversionKind::MispToStix, now), "STIX_20240309070501");
        assert_eq!(default_name(ConversionKind::StixToMisp, now), "MISP_20240309070501");
    }

    #[test]
    fn test_suffix_fits_limit() {
        let config = NamingConfig::default();
        let long = "n".repeat(150);
        let name = with_suffix(&long, "ABC123", &config);
        assert_eq!(name.chars().count(), 100);
        assert!(name.ends_with("_ABC123"));

        assert_eq!(with_suffix("report", "ZZZZZZ", &config), "report_ZZZZZZ");
    }

    #[test]
    fn test_suffix_counts_characters() {
        let config = NamingConfig::default();
        let name = with_suffix(&"é".repeat(120), "AAAAAA", &config);
        assert_eq!(name.chars().count(), 100);
    }

    #[test]
    fn test_random_suffix_charset() {
        let suffix = random_suffix(6);
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| SUFFIX_CHARSET.contains(&b)));
        assert_ne!(disambiguate("x", &NamingConfig::default()), "x");
    }

    #[test]
    fn test_share_key() {
        let key = generate_share_key(36);
        assert_eq!(key.len(), 36);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_suggest_from_misp_event() {
        let input = r#"{"Event": {"info": " Phishing wave ", "Attribute": []}}"#;
        let suggestion = suggest(ConversionKind::MispToStix, input);
        assert_eq!(suggestion.name.as_deref(), Some("Phishing wave"));
        assert!(suggestion.description.unwrap().contains("Phishing wave"));

        assert_eq!(suggest(ConversionKind::MispToStix, "not json"), NameSuggestion::default());
    }

    #[test]
    fn test_suggest_from_stix_report() {
        let input = r#"{"type": "bundle", "id": "bundle--x", "objects": [
            {"type": "identity", "name": "CIRCL"},
            {"type": "report", "name": "APT report", "description": "Quarterly"},
            {"type": "grouping", "name": "Later"}
        ]}"#;
        let suggestion = suggest(ConversionKind::StixToMisp, input);
        assert_eq!(suggestion.name.as_deref(), Some("APT report"));
        assert_eq!(suggestion.description.as_deref(), Some("Quarterly"));

        let none = suggest(ConversionKind::StixToMisp, r#"[{"type": "indicator"}]"#);
        assert_eq!(none, NameSuggestion::default());
    }
}
