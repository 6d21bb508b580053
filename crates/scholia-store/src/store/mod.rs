//! The entity store: single owner of all thesis graph state
//!
//! Every mutation runs against a staged copy of the snapshot. The copy is
//! validated, changed and persisted, and only then swapped in, so a rejected
//! or unwritable mutation leaves the store exactly as it was.

mod analysis;
mod connection;
mod integrity;
mod paper;
mod refs;
mod thesis;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use scholia_domain::{Paper, PaperId, ThesisId};

pub use integrity::IntegrityViolation;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::index::{RelationshipIndex, ScreeningStats};
use crate::migration::{MigrationEngine, MigrationRegistry, MigrationReport};
use crate::persistence::{self, AttachmentStore, KeyValueStorage, MemoryStorage, PersistenceAdapter};
use crate::snapshot::{Snapshot, CURRENT_SCHEMA_VERSION};

/// Whether the store accepts writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    ReadWrite,
    ReadOnly,
}

/// Startup behavior
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Accept writes even though a migration step failed
    pub allow_degraded_writes: bool,
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            allow_degraded_writes: config.allow_degraded_writes,
        }
    }
}

/// Everything removed by a cascading delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSummary {
    pub theses: usize,
    pub papers: usize,
    pub connections: usize,
    pub themes: usize,
    pub gaps: usize,
    pub sections: usize,
    pub evidence_syntheses: usize,
    pub clusters: usize,
}

impl CascadeSummary {
    pub fn total(&self) -> usize {
        self.theses
            + self.papers
            + self.connections
            + self.themes
            + self.gaps
            + self.sections
            + self.evidence_syntheses
            + self.clusters
    }
}

/// Owns the snapshot and every write to it
pub struct EntityStore {
    state: Snapshot,
    adapter: PersistenceAdapter,
    attachments: AttachmentStore,
    mode: StoreMode,
    report: MigrationReport,
    load_error: Option<String>,
    repairs: Vec<IntegrityViolation>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("adapter", &self.adapter)
            .field("mode", &self.mode)
            .field("schema_version", &self.state.schema_version)
            .field("theses", &self.state.theses.len())
            .field("papers", &self.state.papers.len())
            .finish_non_exhaustive()
    }
}

impl EntityStore {
    /// Load, migrate and reconcile the stored state.
    ///
    /// Never fails: unreadable data falls back to an empty store, and a
    /// migration failure opens the store read-only unless
    /// `allow_degraded_writes` is set. Inspect [`migration_report`] and
    /// [`load_error`] to find out what happened.
    ///
    /// [`migration_report`]: EntityStore::migration_report
    /// [`load_error`]: EntityStore::load_error
    pub fn init(
        adapter: PersistenceAdapter,
        registry: &MigrationRegistry,
        options: StoreOptions,
    ) -> Self {
        let attachments = AttachmentStore::new(adapter.storage(), adapter.namespace());
        let mut load_error = None;

        let raw = match adapter.load_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Stored state unreadable, starting empty");
                load_error = Some(e.to_string());
                None
            }
        };

        let (mut state, report, mode) = match raw {
            None => (
                Snapshot::empty(),
                MigrationReport::up_to_date(CURRENT_SCHEMA_VERSION),
                StoreMode::ReadWrite,
            ),
            Some(raw) => Self::hydrate(&raw, &adapter, registry, &options, &mut load_error),
        };

        let repairs = integrity::reconcile(&mut state);
        for repair in &repairs {
            warn!(repair = %repair, "Repaired stored state");
        }

        info!(
            schema_version = state.schema_version,
            theses = state.theses.len(),
            papers = state.papers.len(),
            mode = ?mode,
            "Store ready"
        );

        Self {
            state,
            adapter,
            attachments,
            mode,
            report,
            load_error,
            repairs,
        }
    }

    fn hydrate(
        raw: &Value,
        adapter: &PersistenceAdapter,
        registry: &MigrationRegistry,
        options: &StoreOptions,
        load_error: &mut Option<String>,
    ) -> (Snapshot, MigrationReport, StoreMode) {
        let outcome = MigrationEngine::new(registry).ensure_migrated(raw, adapter);
        let report = outcome.report;

        let mode = if report.is_version_too_new()
            || (report.has_step_failure() && !options.allow_degraded_writes)
        {
            StoreMode::ReadOnly
        } else {
            StoreMode::ReadWrite
        };
        if !report.success {
            warn!(errors = report.errors.len(), mode = ?mode, "Migration did not complete");
        }

        let state = match Snapshot::from_value(outcome.state) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Migrated state does not decode, starting empty");
                adapter.quarantine(raw);
                *load_error = Some(e.to_string());
                Snapshot::empty()
            }
        };
        (state, report, mode)
    }

    /// Open the store a configuration describes, with the built-in migrations
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let adapter = persistence::adapter_for(config)?;
        Ok(Self::init(
            adapter,
            &MigrationRegistry::builtin(),
            StoreOptions::from(config),
        ))
    }

    /// An empty store persisted only in memory
    pub fn in_memory() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()))
    }

    /// Open over caller-provided host storage with default settings
    pub fn with_storage(storage: Arc<dyn KeyValueStorage>) -> Self {
        let config = StoreConfig::default();
        let adapter = PersistenceAdapter::new(storage, config.namespace);
        Self::init(adapter, &MigrationRegistry::builtin(), StoreOptions::default())
    }

    // ==================== Status ====================

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == StoreMode::ReadOnly
    }

    /// What the startup migration run did
    pub fn migration_report(&self) -> &MigrationReport {
        &self.report
    }

    /// Why the stored state was discarded at startup, if it was
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Inconsistencies fixed while loading
    pub fn repairs(&self) -> &[IntegrityViolation] {
        &self.repairs
    }

    /// Read-only view of the whole state, e.g. for the assistant or export
    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Check every cross-entity invariant. Empty when the state is sound.
    pub fn verify_integrity(&self) -> Vec<IntegrityViolation> {
        let mut copy = self.state.clone();
        integrity::reconcile(&mut copy)
    }

    // ==================== Derived views ====================

    pub fn index(&self) -> RelationshipIndex<'_> {
        RelationshipIndex::new(&self.state)
    }

    pub fn papers_for_thesis(&self, thesis: &ThesisId) -> Vec<&Paper> {
        self.index().papers_for_thesis(thesis)
    }

    pub fn screening_stats(&self, thesis: &ThesisId) -> ScreeningStats {
        self.index().screening_stats(thesis)
    }

    pub fn reading_progress(&self, thesis: &ThesisId) -> f64 {
        self.index().reading_progress(thesis)
    }

    // ==================== Commit ====================

    fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            let reason = self
                .report
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "opened read-only".to_string());
            return Err(StoreError::ReadOnly(reason));
        }
        Ok(())
    }

    /// Stage a mutation, persist it, then make it visible
    fn commit<T>(&mut self, mutate: impl FnOnce(&mut Snapshot, DateTime<Utc>) -> Result<T>) -> Result<T> {
        self.ensure_writable()?;
        let mut next = self.state.clone();
        let value = mutate(&mut next, Utc::now())?;
        self.adapter.save(&next)?;
        self.state = next;
        Ok(value)
    }

    /// Remove attachments of papers that no longer exist. Failures are logged.
    fn discard_attachments(&self, papers: &[PaperId]) {
        for paper in papers {
            if let Err(e) = self.attachments.remove(paper.as_str()) {
                warn!(paper = %paper, error = %e, "Could not remove attachment");
            }
        }
    }
}

/// Remove the first item matching `pred`
fn take_where<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> Option<T> {
    let position = items.iter().position(pred)?;
    Some(items.remove(position))
}

/// Remove every item matching `pred`, returning how many went
fn drain_where<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> usize {
    let before = items.len();
    items.retain(|item| !pred(item));
    before - items.len()
}
