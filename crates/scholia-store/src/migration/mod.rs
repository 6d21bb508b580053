//! Forward-only schema migrations over the raw stored blob
//!
//! The blob records the schema that wrote it in `schemaVersion`. At startup
//! every registered migration newer than that runs in ascending order, each
//! on its own copy of the state. The walk stops at the first failure and the
//! furthest successful state is written back, so a failure never loses the
//! steps that did succeed.
//!
//! # Schema Versions
//!
//! - 0: unversioned legacy blobs
//! - 1: normalized paper status fields, timestamps on every entity
//! - 2: stable ids for embedded arguments and evidence
//! - 3: thesis archiving, assistant-suggested connections
//! - 4: analytical collections and the migration audit trail

mod steps;

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::MigrationError;
use crate::persistence::PersistenceAdapter;
use crate::snapshot::CURRENT_SCHEMA_VERSION;

/// Error type a transform may return
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

type Transform = Box<dyn Fn(Value) -> Result<Value, TransformError> + Send + Sync>;

/// One registered schema step: raw state at `version - 1` in, `version` out
pub struct Migration {
    pub version: u32,
    pub name: String,
    transform: Transform,
}

impl Migration {
    pub fn new<F>(version: u32, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        Self {
            version,
            name: name.into(),
            transform: Box::new(transform),
        }
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered set of migrations
#[derive(Debug)]
pub struct MigrationRegistry {
    migrations: Vec<Migration>,
}

impl MigrationRegistry {
    /// Versions must start above 0 and strictly increase.
    pub fn new(migrations: Vec<Migration>) -> Result<Self, MigrationError> {
        let mut previous = 0;
        for migration in &migrations {
            if migration.version <= previous {
                return Err(MigrationError::InvalidRegistry(format!(
                    "version {} ({}) does not follow {}",
                    migration.version, migration.name, previous
                )));
            }
            previous = migration.version;
        }
        Ok(Self { migrations })
    }

    /// The schema history this build ships with
    pub fn builtin() -> Self {
        Self {
            migrations: steps::builtin(),
        }
    }

    /// Highest version reachable, 0 for an empty registry
    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map_or(0, |m| m.version)
    }

    /// Migrations that still have to run over a blob at `stored`
    pub fn pending(&self, stored: u32) -> impl Iterator<Item = &Migration> {
        self.migrations.iter().filter(move |m| m.version > stored)
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// What a migration run did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub success: bool,
    pub from_version: u32,
    pub to_version: u32,
    pub migrations_applied: Vec<u32>,
    pub errors: Vec<MigrationError>,
}

impl MigrationReport {
    /// A run that had nothing to do
    pub fn up_to_date(version: u32) -> Self {
        Self {
            success: true,
            from_version: version,
            to_version: version,
            migrations_applied: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// The run stopped because the blob is newer than this build
    pub fn is_version_too_new(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, MigrationError::VersionTooNew { .. }))
    }

    /// A transform failed, so the state stopped short of the latest schema
    pub fn has_step_failure(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, MigrationError::StepFailed { .. }))
    }
}

/// The migrated state together with its report
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub state: Value,
    pub report: MigrationReport,
}

/// Result of version compatibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheckResult {
    /// Blob is at current version
    Current,
    /// Blob needs migration
    NeedsMigration { from: u32, to: u32 },
    /// Blob is from a newer app
    NewerThanApp { version: u32 },
    /// Legacy blob without version info
    Legacy,
}

/// Check compatibility of a stored schema version
pub fn check_version(raw_version: Option<u32>) -> VersionCheckResult {
    match raw_version {
        None => VersionCheckResult::Legacy,
        Some(v) if v == CURRENT_SCHEMA_VERSION => VersionCheckResult::Current,
        Some(v) if v < CURRENT_SCHEMA_VERSION => VersionCheckResult::NeedsMigration {
            from: v,
            to: CURRENT_SCHEMA_VERSION,
        },
        Some(v) => VersionCheckResult::NewerThanApp { version: v },
    }
}

/// The `schemaVersion` a raw blob records, if it records a usable one
pub fn recorded_version(raw: &Value) -> Option<u32> {
    raw.get("schemaVersion")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

/// Runs a registry over raw state
pub struct MigrationEngine<'r> {
    registry: &'r MigrationRegistry,
}

impl<'r> MigrationEngine<'r> {
    pub fn new(registry: &'r MigrationRegistry) -> Self {
        Self { registry }
    }

    /// Apply every pending migration to a copy of `raw`. Writes nothing.
    pub fn run(&self, raw: &Value) -> MigrationOutcome {
        let stored = recorded_version(raw).unwrap_or(0);
        let latest = self.registry.latest_version();
        let mut report = MigrationReport::up_to_date(stored);

        if stored > latest {
            report.success = false;
            report.errors.push(MigrationError::VersionTooNew {
                stored,
                supported: latest,
            });
            return MigrationOutcome {
                state: raw.clone(),
                report,
            };
        }

        let mut state = raw.clone();
        for migration in self.registry.pending(stored) {
            match apply(migration, &state) {
                Ok(next) => {
                    state = next;
                    report.to_version = migration.version;
                    report.migrations_applied.push(migration.version);
                    info!(version = migration.version, name = %migration.name, "Applied migration");
                }
                Err(reason) => {
                    warn!(
                        version = migration.version,
                        name = %migration.name,
                        reason = %reason,
                        "Migration failed"
                    );
                    report.errors.push(MigrationError::StepFailed {
                        version: migration.version,
                        name: migration.name.clone(),
                        reason,
                    });
                    break;
                }
            }
        }

        report.success = report.errors.is_empty();
        MigrationOutcome { state, report }
    }

    /// Run pending migrations and persist the furthest state reached.
    ///
    /// Nothing is written when no step succeeded.
    pub fn ensure_migrated(&self, raw: &Value, adapter: &PersistenceAdapter) -> MigrationOutcome {
        let mut outcome = self.run(raw);
        let report = &mut outcome.report;

        if !report.migrations_applied.is_empty() {
            if let Err(e) = adapter.save_raw(&outcome.state, report.to_version) {
                warn!(version = report.to_version, error = %e, "Could not persist migrated state");
                report.errors.push(MigrationError::PersistFailed {
                    version: report.to_version,
                    reason: e.to_string(),
                });
                report.success = false;
            }
        }

        if report.success {
            info!(
                from = report.from_version,
                to = report.to_version,
                applied = report.migrations_applied.len(),
                "Schema up to date"
            );
        }
        outcome
    }
}

/// Run one step on its own copy of `state` and stamp the result
fn apply(migration: &Migration, state: &Value) -> Result<Value, String> {
    let input = state.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(|| (migration.transform)(input)));

    let mut next = match result {
        Ok(Ok(next)) => next,
        Ok(Err(e)) => return Err(e.to_string()),
        Err(payload) => return Err(panic_message(payload.as_ref())),
    };

    let Some(object) = next.as_object_mut() else {
        return Err("transform did not return an object".to_string());
    };
    object.insert("schemaVersion".to_string(), Value::from(migration.version));
    let trail = object
        .entry("appliedMigrations")
        .or_insert_with(|| Value::Array(Vec::new()));
    match trail.as_array_mut() {
        Some(versions) => versions.push(Value::from(migration.version)),
        None => *trail = Value::Array(vec![Value::from(migration.version)]),
    }
    Ok(next)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
