// src/stix/sniff.rs

//! Sub-version inference
//!
//! One pass over the contained objects in arrival order: the first object
//! carrying a recognizable `spec_version` marker decides. When no object
//! carries one the document is treated as the older sub-version. The result
//! is deterministic for a given object order.

use super::{SPEC_VERSION_PROPERTY, SpecVersion};
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of sniffing a set of objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSniff {
    pub version: SpecVersion,
    /// Index of the object whose marker decided the version
    pub decided_by: Option<usize>,
    /// Markers present but unrecognized (e.g. "2.2"), skipped during the scan
    pub unrecognized_markers: usize,
}

impl VersionSniff {
    /// No marker decided; the older sub-version was assumed
    pub fn is_ambiguous(&self) -> bool {
        self.decided_by.is_none()
    }
}

/// Infer the sub-version of a set of raw objects
pub fn sniff_version(objects: &[Value]) -> VersionSniff {
    let mut unrecognized_markers = 0;

    for (index, object) in objects.iter().enumerate() {
        let Some(marker) = object.get(SPEC_VERSION_PROPERTY) else {
            continue;
        };
        match marker.as_str().map(str::parse::<SpecVersion>) {
            Some(Ok(version)) => {
                debug!("Object {} declares STIX {}", index, version);
                return VersionSniff {
                    version,
                    decided_by: Some(index),
                    unrecognized_markers,
                };
            }
            _ => {
                debug!("Skipping unrecognized version marker {} on object {}", marker, index);
                unrecognized_markers += 1;
            }
        }
    }

    warn!(
        "No version marker among {} object(s); assuming STIX {}",
        objects.len(),
        SpecVersion::V20
    );
    VersionSniff {
        version: SpecVersion::V20,
        decided_by: None,
        unrecognized_markers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_marker_wins() {
        let objects = vec![
            json!({"type": "identity"}),
            json!({"type": "indicator", "spec_version": "2.1"}),
            json!({"type": "malware", "spec_version": "2.0"}),
        ];
        let sniff = sniff_version(&objects);
        assert_eq!(sniff.version, SpecVersion::V21);
        assert_eq!(sniff.decided_by, Some(1));
        assert!(!sniff.is_ambiguous());
    }

    #[test]
    fn test_order_dependent() {
        let objects = vec![
            json!({"type": "malware", "spec_version": "2.0"}),
            json!({"type": "indicator", "spec_version": "2.1"}),
        ];
        assert_eq!(sniff_version(&objects).version, SpecVersion::V20);
    }

    #[test]
    fn test_defaults_to_older_version() {
        let objects = vec![json!({"type": "indicator"}), json!("not even an object")];
        let sniff = sniff_version(&objects);
        assert_eq!(sniff.version, SpecVersion::V20);
        assert!(sniff.is_ambiguous());
    }

    #[test]
    fn test_unrecognized_markers_are_skipped() {
        let objects = vec![
            json!({"type": "indicator", "spec_version": "9.9"}),
            json!({"type": "indicator", "spec_version": 2.1}),
            json!({"type": "indicator", "spec_version": "2.1"}),
        ];
        let sniff = sniff_version(&objects);
        assert_eq!(sniff.version, SpecVersion::V21);
        assert_eq!(sniff.decided_by, Some(2));
        assert_eq!(sniff.unrecognized_markers, 2);
    }
}
