// src/config.rs

//! Configuration file parsing for Transmute
//!
//! Supports TOML configuration files with the following sections:
//! - [general] - Log level
//! - [database] - SQLite database location
//! - [converter] - External format converter endpoint
//! - [loader] - Content loader policy
//! - [naming] - Artifact naming and share key rules
//! - [history] - Re-conversion history defaults
//!
//! Every section is optional. The resulting [`TransmuteConfig`] is built once
//! and handed to the components that need it.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable pointing at a configuration file
pub const CONFIG_ENV: &str = "TRANSMUTE_CONFIG";

/// Default database location
pub const DEFAULT_DB_PATH: &str = "/var/lib/transmute/transmute.db";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransmuteConfig {
    #[serde(default)]
    pub general: GeneralSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub converter: ConverterSection,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

impl TransmuteConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: TransmuteConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Load from an explicit path, else from `TRANSMUTE_CONFIG`, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.naming.max_name_len <= self.naming.suffix_len + 1 {
            return Err(Error::Config(format!(
                "naming.max_name_len ({}) must exceed naming.suffix_len + 1 ({})",
                self.naming.max_name_len,
                self.naming.suffix_len + 1
            )));
        }
        if self.naming.suffix_len == 0 {
            return Err(Error::Config("naming.suffix_len must be at least 1".to_string()));
        }
        if self.naming.share_key_len < 16 {
            return Err(Error::Config(format!(
                "naming.share_key_len ({}) must be at least 16",
                self.naming.share_key_len
            )));
        }
        if self.converter.endpoint.trim().is_empty() {
            return Err(Error::Config("converter.endpoint must not be empty".to_string()));
        }
        if self.converter.timeout_secs == 0 {
            return Err(Error::Config("converter.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// General settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralSection {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

/// External converter settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConverterSection {
    /// Base URL of the conversion API (`/misp_to_stix` and `/stix_to_misp` are appended)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ConverterSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConverterSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:6868/api/convert".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Content loader policy
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Accept `x-` prefixed custom object types
    #[serde(default = "default_true")]
    pub allow_custom: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { allow_custom: true }
    }
}

fn default_true() -> bool {
    true
}

/// Artifact naming rules
#[derive(Debug, Clone, Deserialize)]
pub struct NamingConfig {
    /// Maximum artifact name length
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    /// Length of the random suffix appended on a name collision
    #[serde(default = "default_suffix_len")]
    pub suffix_len: usize,

    /// Length of generated share keys
    #[serde(default = "default_share_key_len")]
    pub share_key_len: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_name_len: default_max_name_len(),
            suffix_len: default_suffix_len(),
            share_key_len: default_share_key_len(),
        }
    }
}

fn default_max_name_len() -> usize {
    100
}

fn default_suffix_len() -> usize {
    6
}

fn default_share_key_len() -> usize {
    36
}

/// History ledger defaults
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Comment attached to entries created by a re-conversion
    #[serde(default = "default_reconvert_comment")]
    pub reconvert_comment: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            reconvert_comment: default_reconvert_comment(),
        }
    }
}

fn default_reconvert_comment() -> String {
    "Reconversion triggered from history".to_string()
}
