//! Scholia Store - Persistent entity store for the thesis knowledge graph
//!
//! This crate owns every thesis, paper, connection and analysis artifact a
//! researcher keeps:
//!
//! - **Persistence**: the whole state as one versioned JSON blob in host key-value
//!   storage (memory, one file per key, or SQLite), written atomically
//! - **Migration**: an ordered registry of schema steps run at startup, with a
//!   report of what was applied and what failed
//! - **Store**: validated CRUD with referential integrity and cascading deletes
//! - **Index**: derived views such as screening stats and reading progress
//! - **Config**: namespace, backend and startup behavior
//!
//! # Startup
//!
//! ```text
//! load blob → migrate (persist if advanced) → decode → reconcile → ready
//! ```
//!
//! A blob written by a newer build, or a failed migration step, opens the
//! store read-only instead of risking data the code cannot understand.

pub mod config;
pub mod error;
pub mod index;
pub mod migration;
pub mod persistence;
pub mod snapshot;
pub mod store;

pub use config::{BackendKind, StoreConfig, DEFAULT_NAMESPACE};
pub use error::{ConfigError, MigrationError, PersistenceError, Result, StoreError};
pub use index::{ReadingBreakdown, RelationshipIndex, ScreeningStats, ThesisOverview};
pub use migration::{
    check_version, Migration, MigrationEngine, MigrationOutcome, MigrationRegistry,
    MigrationReport, VersionCheckResult,
};
pub use persistence::{
    AttachmentStore, FileStorage, KeyValueStorage, MemoryStorage, PersistenceAdapter,
};
#[cfg(feature = "sqlite")]
pub use persistence::SqliteStorage;
pub use snapshot::{Snapshot, CURRENT_SCHEMA_VERSION};
pub use store::{CascadeSummary, EntityStore, IntegrityViolation, StoreMode, StoreOptions};
