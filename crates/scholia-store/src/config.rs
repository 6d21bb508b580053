//! Configuration for scholia-store
//!
//! Where the store lives, which host storage backend it uses, and how it
//! behaves when startup does not go cleanly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "scholia";

/// Which host storage backend holds the blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum BackendKind {
    /// Process-local, lost on exit
    Memory,
    /// One file per key in `data_dir`
    File,
    /// A key-value table in `data_dir/scholia.sqlite3`
    Sqlite,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Memory, BackendKind::File, BackendKind::Sqlite];

    /// Spelling used in config files and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|kind| kind.as_str()).collect();
                ConfigError::Invalid(format!(
                    "unknown backend '{}' ({})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

impl TryFrom<String> for BackendKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendKind> for &'static str {
    fn from(kind: BackendKind) -> Self {
        kind.as_str()
    }
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prefix for every storage key
    pub namespace: String,
    /// Directory for file and sqlite backends; platform data dir when unset
    pub data_dir: Option<PathBuf>,
    pub backend: BackendKind,
    /// Accept writes after a migration failure
    pub allow_degraded_writes: bool,
    /// Copy unreadable blobs aside before falling back to an empty store
    pub backup_corrupt_blobs: bool,
    /// Indent the persisted JSON
    pub pretty_json: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data_dir: None,
            backend: BackendKind::File,
            allow_degraded_writes: false,
            backup_corrupt_blobs: true,
            pretty_json: false,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// An ephemeral in-memory configuration
    pub fn in_memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file: JSON for a `.json` extension, TOML otherwise
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_toml(&text),
        }
    }

    /// The directory file-backed storage uses
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(&self.namespace)
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::OutOfRange(
                "namespace must not be empty".to_string(),
            ));
        }

        // '.' separates the namespace from the version tag in storage keys
        if !self
            .namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "namespace '{}' may only contain ASCII letters, digits, '-' and '_'",
                self.namespace
            )));
        }

        Ok(())
    }
}
