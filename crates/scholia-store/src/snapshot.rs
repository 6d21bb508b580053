//! The persisted state: every entity collection in one versioned record

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scholia_domain::{
    ArgumentId, Cluster, ClusterId, Connection, ConnectionId, EvidenceSynthesis,
    EvidenceSynthesisId, GapId, Paper, PaperId, ResearchGap, ReviewSection, SectionId,
    SynthesisTheme, ThemeId, Thesis, ThesisId, ThesisScoped,
};

use crate::error::PersistenceError;

/// Schema version this build reads and writes
pub const CURRENT_SCHEMA_VERSION: u32 = 4;

/// Full store state as written to host storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub theses: Vec<Thesis>,
    #[serde(default)]
    pub papers: Vec<Paper>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub themes: Vec<SynthesisTheme>,
    #[serde(default)]
    pub gaps: Vec<ResearchGap>,
    #[serde(default)]
    pub sections: Vec<ReviewSection>,
    #[serde(default)]
    pub evidence_syntheses: Vec<EvidenceSynthesis>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub active_thesis_id: Option<ThesisId>,
    /// Audit trail of every migration version applied to this blob
    #[serde(default)]
    pub applied_migrations: Vec<u32>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Snapshot {
    /// An empty store at the current schema version
    pub fn empty() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            theses: Vec::new(),
            papers: Vec::new(),
            connections: Vec::new(),
            themes: Vec::new(),
            gaps: Vec::new(),
            sections: Vec::new(),
            evidence_syntheses: Vec::new(),
            clusters: Vec::new(),
            active_thesis_id: None,
            applied_migrations: Vec::new(),
        }
    }

    /// Decode a (migrated) raw blob
    pub fn from_value(value: Value) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, PersistenceError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.theses.is_empty()
            && self.papers.is_empty()
            && self.connections.is_empty()
            && self.themes.is_empty()
            && self.gaps.is_empty()
            && self.sections.is_empty()
            && self.evidence_syntheses.is_empty()
            && self.clusters.is_empty()
    }

    // ==================== Lookups ====================

    pub fn thesis(&self, id: &ThesisId) -> Option<&Thesis> {
        self.theses.iter().find(|t| &t.id == id)
    }

    pub fn thesis_mut(&mut self, id: &ThesisId) -> Option<&mut Thesis> {
        self.theses.iter_mut().find(|t| &t.id == id)
    }

    pub fn paper(&self, id: &PaperId) -> Option<&Paper> {
        self.papers.iter().find(|p| &p.id == id)
    }

    pub fn paper_mut(&mut self, id: &PaperId) -> Option<&mut Paper> {
        self.papers.iter_mut().find(|p| &p.id == id)
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    pub fn theme(&self, id: &ThemeId) -> Option<&SynthesisTheme> {
        self.themes.iter().find(|t| &t.id == id)
    }

    pub fn gap(&self, id: &GapId) -> Option<&ResearchGap> {
        self.gaps.iter().find(|g| &g.id == id)
    }

    pub fn section(&self, id: &SectionId) -> Option<&ReviewSection> {
        self.sections.iter().find(|s| &s.id == id)
    }

    pub fn evidence_synthesis(&self, id: &EvidenceSynthesisId) -> Option<&EvidenceSynthesis> {
        self.evidence_syntheses.iter().find(|s| &s.id == id)
    }

    pub fn cluster(&self, id: &ClusterId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| &c.id == id)
    }

    /// The paper embedding `argument`, if any
    pub fn paper_with_argument(&self, argument: &ArgumentId) -> Option<&Paper> {
        self.papers
            .iter()
            .find(|p| p.arguments.iter().any(|a| &a.id == argument))
    }

    /// Whether `id` is taken by any entity, embedded ones included
    pub fn contains_id(&self, id: &str) -> bool {
        self.theses.iter().any(|t| t.id.as_str() == id)
            || self.papers.iter().any(|p| {
                p.id.as_str() == id
                    || p.arguments.iter().any(|a| a.id.as_str() == id)
                    || p.evidence.iter().any(|e| e.id.as_str() == id)
            })
            || self.connections.iter().any(|c| c.id.as_str() == id)
            || self.themes.iter().any(|t| t.id.as_str() == id)
            || self.gaps.iter().any(|g| g.id.as_str() == id)
            || self.sections.iter().any(|s| s.id.as_str() == id)
            || self.evidence_syntheses.iter().any(|s| s.id.as_str() == id)
            || self.clusters.iter().any(|c| c.id.as_str() == id)
    }

    /// A fresh id no entity uses yet
    pub fn fresh_id<I: From<String>>(&self) -> I {
        loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if !self.contains_id(&candidate) {
                return I::from(candidate);
            }
        }
    }
}

/// Entities of `items` owned by `thesis`, or all of them
pub(crate) fn scoped<'a, T: ThesisScoped>(
    items: &'a [T],
    thesis: Option<&ThesisId>,
) -> Vec<&'a T> {
    items
        .iter()
        .filter(|item| thesis.map_or(true, |t| item.thesis_id() == t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_is_current() {
        let snapshot = Snapshot::empty();
        assert_eq!(snapshot.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_layout_keys() {
        let value = Snapshot::empty().to_value().unwrap();
        for key in [
            "schemaVersion",
            "theses",
            "papers",
            "connections",
            "themes",
            "gaps",
            "sections",
            "evidenceSyntheses",
            "clusters",
            "appliedMigrations",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_missing_collections_default() {
        let snapshot = Snapshot::from_value(serde_json::json!({ "schemaVersion": 4 })).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_fresh_id_unused() {
        let snapshot = Snapshot::empty();
        let id: ThesisId = snapshot.fresh_id();
        assert!(!snapshot.contains_id(id.as_str()));
    }
}
