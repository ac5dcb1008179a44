// src/conversion/converter.rs

//! External format converter seam and its HTTP transport
//!
//! The converter is a black box: it receives a document and an argument set
//! and returns the converted document. Failures are never retried here.

use super::{ConversionKind, ConverterCall};
use crate::config::ConverterSection;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, info};

/// Runs one conversion
pub trait FormatConverter {
    fn convert(&self, call: &ConverterCall, document: &Value) -> Result<Value>;
}

/// Converter reached over HTTP
///
/// The document is posted as the JSON body to `<endpoint>/<route>`, with the
/// dispatcher arguments as query parameters.
pub struct HttpConverter {
    client: Client,
    endpoint: String,
}

impl HttpConverter {
    pub fn new(config: &ConverterSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL of a converter entry point
    pub fn url_for(&self, kind: ConversionKind) -> String {
        format!("{}/{}", self.endpoint, kind.route())
    }
}

impl FormatConverter for HttpConverter {
    fn convert(&self, call: &ConverterCall, document: &Value) -> Result<Value> {
        let url = self.url_for(call.kind);
        info!(
            "Calling converter {} with {} argument(s)",
            url,
            call.arguments.len()
        );

        let response = self
            .client
            .post(&url)
            .query(call.arguments.as_map())
            .json(document)
            .send()
            .map_err(|e| Error::ConversionFailed(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ConversionFailed(format!("HTTP {status} from {url}")));
        }

        let body: Value = response
            .json()
            .map_err(|e| Error::ConversionFailed(format!("invalid JSON returned from converter: {e}")))?;
        check_error_payload(&body)?;

        debug!("Converter {} returned a {} payload", url, payload_kind(&body));
        Ok(body)
    }
}

/// Turn an `{"error": ...}` payload into a conversion failure
pub fn check_error_payload(body: &Value) -> Result<()> {
    let Some(error) = body.get("error") else {
        return Ok(());
    };
    let message = match error {
        Value::Null | Value::Bool(false) => return Ok(()),
        Value::String(s) if s.is_empty() => return Ok(()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Err(Error::ConversionFailed(message))
}

fn payload_kind(body: &Value) -> &'static str {
    match body {
        Value::Array(_) => "list",
        Value::Object(_) => "object",
        _ => "scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_for_joins_endpoint_and_route() {
        let config = ConverterSection {
            endpoint: "http://127.0.0.1:6868/api/convert/".to_string(),
            timeout_secs: 5,
        };
        let converter = HttpConverter::new(&config).unwrap();
        assert_eq!(
            converter.url_for(ConversionKind::StixToMisp),
            "http://127.0.0.1:6868/api/convert/stix_to_misp"
        );
        assert_eq!(
            converter.url_for(ConversionKind::MispToStix),
            "http://127.0.0.1:6868/api/convert/misp_to_stix"
        );
    }

    #[test]
    fn test_error_payloads() {
        assert!(check_error_payload(&json!({"Event": {}})).is_ok());
        assert!(check_error_payload(&json!([{"error": "inside a list is data"}])).is_ok());
        assert!(check_error_payload(&json!({"error": null})).is_ok());
        assert!(check_error_payload(&json!({"error": ""})).is_ok());

        match check_error_payload(&json!({"error": "Error loading STIX content"})) {
            Err(Error::ConversionFailed(msg)) => assert_eq!(msg, "Error loading STIX content"),
            other => panic!("expected ConversionFailed, got {other:?}"),
        }
        assert!(check_error_payload(&json!({"error": {"code": 3}})).is_err());
    }
}
