//! Error types for scholia-store

use scholia_domain::{EntityKind, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced synchronously by the entity store
#[derive(Error, Debug)]
pub enum StoreError {
    /// A payload or patch violated a field rule or named a missing entity
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An update or delete targeted an id that does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The store was opened degraded and refuses writes
    #[error("Store is read-only: {0}")]
    ReadOnly(String),

    /// The snapshot could not be written
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The store configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Host storage and blob encoding errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The storage backend rejected an operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored data exists but cannot be understood
    #[error("Malformed stored data under '{key}': {reason}")]
    Malformed { key: String, reason: String },
}

/// A migration step that did not complete
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum MigrationError {
    /// A transform returned an error or panicked
    #[error("Migration to v{version} ({name}) failed: {reason}")]
    StepFailed {
        version: u32,
        name: String,
        reason: String,
    },

    /// The stored blob was written by a newer application
    #[error("Stored schema v{stored} is newer than supported v{supported}")]
    VersionTooNew { stored: u32, supported: u32 },

    /// Registry versions must be positive and strictly increasing
    #[error("Invalid migration registry: {0}")]
    InvalidRegistry(String),

    /// Migrated state could not be written back
    #[error("Failed to persist migrated state at v{version}: {reason}")]
    PersistFailed { version: u32, reason: String },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Value is out of valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Value has the wrong shape
    #[error("Invalid value: {0}")]
    Invalid(String),

    /// Config file could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::Database(err.to_string())
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
