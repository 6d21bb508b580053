//! Analytical artifacts derived by the researcher from a thesis's papers
//!
//! Themes, gaps, review sections, evidence syntheses and clusters all belong
//! to one thesis and reference papers of that thesis by id. The store keeps
//! those references valid; this module only knows their shapes and field rules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{dedupe_ids, require_non_empty, ValidationError};
use crate::{
    ArgumentId, ClusterId, EvidenceSynthesisId, GapId, PaperId, PaperRefs, SectionId, ThemeId,
    ThesisId, ThesisScoped,
};

string_enum! {
    /// What is missing from the literature
    pub enum GapKind {
        Methodological => "methodological",
        Empirical => "empirical",
        Theoretical => "theoretical",
        Population => "population",
        Contextual => "contextual",
        Other => "other",
    }
}

string_enum! {
    pub enum GapPriority {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

impl Default for GapPriority {
    fn default() -> Self {
        GapPriority::Medium
    }
}

string_enum! {
    /// How settled a synthesized claim is
    pub enum SynthesisConfidence {
        High => "high",
        Moderate => "moderate",
        Low => "low",
        Insufficient => "insufficient",
    }
}

impl Default for SynthesisConfidence {
    fn default() -> Self {
        SynthesisConfidence::Insufficient
    }
}

fn strip(list: &mut Vec<PaperId>, paper: &PaperId) -> bool {
    let before = list.len();
    list.retain(|id| id != paper);
    before != list.len()
}

// ============================================================================
// Synthesis themes
// ============================================================================

/// A recurring idea that cuts across papers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisTheme {
    pub id: ThemeId,
    pub thesis_id: ThesisId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub paper_ids: Vec<PaperId>,
    /// Arguments embedded in papers of the same thesis
    #[serde(default)]
    pub related_argument_ids: Vec<ArgumentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SynthesisTheme {
    pub fn from_new(id: ThemeId, payload: NewTheme, now: DateTime<Utc>) -> Self {
        Self {
            id,
            thesis_id: payload.thesis_id,
            name: payload.name.trim().to_string(),
            description: payload.description,
            paper_ids: dedupe_ids(payload.paper_ids),
            related_argument_ids: dedupe_ids(payload.related_argument_ids),
            created_at: now,
            updated_at: now,
        }
    }

    /// Drop arguments that no longer exist
    pub fn strip_arguments(&mut self, removed: &HashSet<ArgumentId>) -> bool {
        let before = self.related_argument_ids.len();
        self.related_argument_ids.retain(|id| !removed.contains(id));
        before != self.related_argument_ids.len()
    }
}

impl ThesisScoped for SynthesisTheme {
    fn thesis_id(&self) -> &ThesisId {
        &self.thesis_id
    }
}

impl PaperRefs for SynthesisTheme {
    fn strip_paper(&mut self, paper: &PaperId) -> bool {
        strip(&mut self.paper_ids, paper)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTheme {
    pub thesis_id: ThesisId,
    pub name: String,
    pub description: String,
    pub paper_ids: Vec<PaperId>,
    pub related_argument_ids: Vec<ArgumentId>,
}

impl NewTheme {
    pub fn new(thesis_id: ThesisId, name: impl Into<String>) -> Self {
        Self {
            thesis_id,
            name: name.into(),
            description: String::new(),
            paper_ids: Vec::new(),
            related_argument_ids: Vec::new(),
        }
    }

    pub fn with_papers(mut self, papers: Vec<PaperId>) -> Self {
        self.paper_ids = papers;
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<ArgumentId>) -> Self {
        self.related_argument_ids = arguments;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub paper_ids: Option<Vec<PaperId>>,
    pub related_argument_ids: Option<Vec<ArgumentId>>,
}

impl ThemePatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        Ok(())
    }

    pub fn apply_to(self, theme: &mut SynthesisTheme) {
        if let Some(name) = self.name {
            theme.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            theme.description = description;
        }
        if let Some(papers) = self.paper_ids {
            theme.paper_ids = dedupe_ids(papers);
        }
        if let Some(arguments) = self.related_argument_ids {
            theme.related_argument_ids = dedupe_ids(arguments);
        }
    }
}

// ============================================================================
// Research gaps
// ============================================================================

/// Something the literature has not yet answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchGap {
    pub id: GapId,
    pub thesis_id: ThesisId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: GapKind,
    #[serde(default)]
    pub priority: GapPriority,
    #[serde(default)]
    pub related_paper_ids: Vec<PaperId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResearchGap {
    pub fn from_new(id: GapId, payload: NewGap, now: DateTime<Utc>) -> Self {
        Self {
            id,
            thesis_id: payload.thesis_id,
            title: payload.title.trim().to_string(),
            description: payload.description,
            kind: payload.kind,
            priority: payload.priority,
            related_paper_ids: dedupe_ids(payload.related_paper_ids),
            created_at: now,
            updated_at: now,
        }
    }
}

impl ThesisScoped for ResearchGap {
    fn thesis_id(&self) -> &ThesisId {
        &self.thesis_id
    }
}

impl PaperRefs for ResearchGap {
    fn strip_paper(&mut self, paper: &PaperId) -> bool {
        strip(&mut self.related_paper_ids, paper)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGap {
    pub thesis_id: ThesisId,
    pub title: String,
    pub description: String,
    pub kind: GapKind,
    pub priority: GapPriority,
    pub related_paper_ids: Vec<PaperId>,
}

impl NewGap {
    pub fn new(thesis_id: ThesisId, title: impl Into<String>, kind: GapKind) -> Self {
        Self {
            thesis_id,
            title: title.into(),
            description: String::new(),
            kind,
            priority: GapPriority::default(),
            related_paper_ids: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: GapPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_papers(mut self, papers: Vec<PaperId>) -> Self {
        self.related_paper_ids = papers;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GapPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<GapKind>,
    pub priority: Option<GapPriority>,
    pub related_paper_ids: Option<Vec<PaperId>>,
}

impl GapPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_non_empty("title", title)?;
        }
        Ok(())
    }

    pub fn apply_to(self, gap: &mut ResearchGap) {
        if let Some(title) = self.title {
            gap.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            gap.description = description;
        }
        if let Some(kind) = self.kind {
            gap.kind = kind;
        }
        if let Some(priority) = self.priority {
            gap.priority = priority;
        }
        if let Some(papers) = self.related_paper_ids {
            gap.related_paper_ids = dedupe_ids(papers);
        }
    }
}

// ============================================================================
// Review sections
// ============================================================================

/// One section of the literature review draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSection {
    pub id: SectionId,
    pub thesis_id: ThesisId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Position within the thesis, dense from 0
    pub order: u32,
    #[serde(default)]
    pub paper_ids: Vec<PaperId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewSection {
    /// `order` is assigned by the store
    pub fn from_new(id: SectionId, payload: NewSection, order: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            thesis_id: payload.thesis_id,
            title: payload.title.trim().to_string(),
            content: payload.content,
            order,
            paper_ids: dedupe_ids(payload.paper_ids),
            created_at: now,
            updated_at: now,
        }
    }
}

impl ThesisScoped for ReviewSection {
    fn thesis_id(&self) -> &ThesisId {
        &self.thesis_id
    }
}

impl PaperRefs for ReviewSection {
    fn strip_paper(&mut self, paper: &PaperId) -> bool {
        strip(&mut self.paper_ids, paper)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSection {
    pub thesis_id: ThesisId,
    pub title: String,
    pub content: String,
    /// Insert position; appended when absent
    pub order: Option<u32>,
    pub paper_ids: Vec<PaperId>,
}

impl NewSection {
    pub fn new(thesis_id: ThesisId, title: impl Into<String>) -> Self {
        Self {
            thesis_id,
            title: title.into(),
            content: String::new(),
            order: None,
            paper_ids: Vec::new(),
        }
    }

    pub fn at(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_papers(mut self, papers: Vec<PaperId>) -> Self {
        self.paper_ids = papers;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)
    }
}

/// Shallow patch for a section. Reordering goes through the store's move operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub paper_ids: Option<Vec<PaperId>>,
}

impl SectionPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_non_empty("title", title)?;
        }
        Ok(())
    }

    pub fn apply_to(self, section: &mut ReviewSection) {
        if let Some(title) = self.title {
            section.title = title.trim().to_string();
        }
        if let Some(content) = self.content {
            section.content = content;
        }
        if let Some(papers) = self.paper_ids {
            section.paper_ids = dedupe_ids(papers);
        }
    }
}

// ============================================================================
// Evidence syntheses
// ============================================================================

/// A claim weighed against the papers for and against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceSynthesis {
    pub id: EvidenceSynthesisId,
    pub thesis_id: ThesisId,
    pub claim: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub confidence: SynthesisConfidence,
    #[serde(default)]
    pub supporting_paper_ids: Vec<PaperId>,
    #[serde(default)]
    pub contradicting_paper_ids: Vec<PaperId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EvidenceSynthesis {
    pub fn from_new(
        id: EvidenceSynthesisId,
        payload: NewEvidenceSynthesis,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            thesis_id: payload.thesis_id,
            claim: payload.claim.trim().to_string(),
            summary: payload.summary,
            confidence: payload.confidence,
            supporting_paper_ids: dedupe_ids(payload.supporting_paper_ids),
            contradicting_paper_ids: dedupe_ids(payload.contradicting_paper_ids),
            created_at: now,
            updated_at: now,
        }
    }
}

impl ThesisScoped for EvidenceSynthesis {
    fn thesis_id(&self) -> &ThesisId {
        &self.thesis_id
    }
}

impl PaperRefs for EvidenceSynthesis {
    fn strip_paper(&mut self, paper: &PaperId) -> bool {
        let supporting = strip(&mut self.supporting_paper_ids, paper);
        let contradicting = strip(&mut self.contradicting_paper_ids, paper);
        supporting || contradicting
    }
}

/// A paper cannot both support and contradict the same claim
fn validate_sides(supporting: &[PaperId], contradicting: &[PaperId]) -> Result<(), ValidationError> {
    if let Some(paper) = supporting.iter().find(|p| contradicting.contains(p)) {
        return Err(ValidationError::new(
            "contradictingPaperIds",
            format!("paper '{}' is listed as both supporting and contradicting", paper),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvidenceSynthesis {
    pub thesis_id: ThesisId,
    pub claim: String,
    pub summary: String,
    pub confidence: SynthesisConfidence,
    pub supporting_paper_ids: Vec<PaperId>,
    pub contradicting_paper_ids: Vec<PaperId>,
}

impl NewEvidenceSynthesis {
    pub fn new(thesis_id: ThesisId, claim: impl Into<String>) -> Self {
        Self {
            thesis_id,
            claim: claim.into(),
            summary: String::new(),
            confidence: SynthesisConfidence::default(),
            supporting_paper_ids: Vec::new(),
            contradicting_paper_ids: Vec::new(),
        }
    }

    pub fn supported_by(mut self, papers: Vec<PaperId>) -> Self {
        self.supporting_paper_ids = papers;
        self
    }

    pub fn contradicted_by(mut self, papers: Vec<PaperId>) -> Self {
        self.contradicting_paper_ids = papers;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("claim", &self.claim)?;
        validate_sides(&self.supporting_paper_ids, &self.contradicting_paper_ids)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceSynthesisPatch {
    pub claim: Option<String>,
    pub summary: Option<String>,
    pub confidence: Option<SynthesisConfidence>,
    pub supporting_paper_ids: Option<Vec<PaperId>>,
    pub contradicting_paper_ids: Option<Vec<PaperId>>,
}

impl EvidenceSynthesisPatch {
    pub fn validate(&self, current: &EvidenceSynthesis) -> Result<(), ValidationError> {
        if let Some(claim) = &self.claim {
            require_non_empty("claim", claim)?;
        }
        let supporting = self
            .supporting_paper_ids
            .as_deref()
            .unwrap_or(&current.supporting_paper_ids);
        let contradicting = self
            .contradicting_paper_ids
            .as_deref()
            .unwrap_or(&current.contradicting_paper_ids);
        validate_sides(supporting, contradicting)
    }

    pub fn apply_to(self, synthesis: &mut EvidenceSynthesis) {
        if let Some(claim) = self.claim {
            synthesis.claim = claim.trim().to_string();
        }
        if let Some(summary) = self.summary {
            synthesis.summary = summary;
        }
        if let Some(confidence) = self.confidence {
            synthesis.confidence = confidence;
        }
        if let Some(papers) = self.supporting_paper_ids {
            synthesis.supporting_paper_ids = dedupe_ids(papers);
        }
        if let Some(papers) = self.contradicting_paper_ids {
            synthesis.contradicting_paper_ids = dedupe_ids(papers);
        }
    }
}

// ============================================================================
// Clusters
// ============================================================================

/// A named grouping of papers, e.g. from a map view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: ClusterId,
    pub thesis_id: ThesisId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub paper_ids: Vec<PaperId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    pub fn from_new(id: ClusterId, payload: NewCluster, now: DateTime<Utc>) -> Self {
        Self {
            id,
            thesis_id: payload.thesis_id,
            name: payload.name.trim().to_string(),
            description: payload.description,
            color: payload.color,
            paper_ids: dedupe_ids(payload.paper_ids),
            created_at: now,
            updated_at: now,
        }
    }
}

impl ThesisScoped for Cluster {
    fn thesis_id(&self) -> &ThesisId {
        &self.thesis_id
    }
}

impl PaperRefs for Cluster {
    fn strip_paper(&mut self, paper: &PaperId) -> bool {
        strip(&mut self.paper_ids, paper)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCluster {
    pub thesis_id: ThesisId,
    pub name: String,
    pub description: String,
    pub color: Option<String>,
    pub paper_ids: Vec<PaperId>,
}

impl NewCluster {
    pub fn new(thesis_id: ThesisId, name: impl Into<String>) -> Self {
        Self {
            thesis_id,
            name: name.into(),
            description: String::new(),
            color: None,
            paper_ids: Vec::new(),
        }
    }

    pub fn with_papers(mut self, papers: Vec<PaperId>) -> Self {
        self.paper_ids = papers;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<Option<String>>,
    pub paper_ids: Option<Vec<PaperId>>,
}

impl ClusterPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        Ok(())
    }

    pub fn apply_to(self, cluster: &mut Cluster) {
        if let Some(name) = self.name {
            cluster.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            cluster.description = description;
        }
        if let Some(color) = self.color {
            cluster.color = color;
        }
        if let Some(papers) = self.paper_ids {
            cluster.paper_ids = dedupe_ids(papers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_dedupes_papers() {
        let p = PaperId::new();
        let theme = SynthesisTheme::from_new(
            ThemeId::new(),
            NewTheme::new(ThesisId::new(), "Replay").with_papers(vec![p.clone(), p.clone()]),
            Utc::now(),
        );
        assert_eq!(theme.paper_ids, vec![p]);
    }

    #[test]
    fn test_strip_paper_from_synthesis_sides() {
        let (a, b) = (PaperId::new(), PaperId::new());
        let mut synthesis = EvidenceSynthesis::from_new(
            EvidenceSynthesisId::new(),
            NewEvidenceSynthesis::new(ThesisId::new(), "REM aids recall")
                .supported_by(vec![a.clone()])
                .contradicted_by(vec![b.clone()]),
            Utc::now(),
        );
        assert!(synthesis.strip_paper(&b));
        assert!(synthesis.contradicting_paper_ids.is_empty());
        assert!(!synthesis.strip_paper(&b));
        assert_eq!(synthesis.supporting_paper_ids, vec![a]);
    }

    #[test]
    fn test_synthesis_sides_must_not_overlap() {
        let p = PaperId::new();
        let payload = NewEvidenceSynthesis::new(ThesisId::new(), "Claim")
            .supported_by(vec![p.clone()])
            .contradicted_by(vec![p]);
        assert_eq!(payload.validate().unwrap_err().field, "contradictingPaperIds");
    }

    #[test]
    fn test_gap_serializes_type_field() {
        let gap = ResearchGap::from_new(
            GapId::from("g1"),
            NewGap::new(ThesisId::from("t1"), "No longitudinal data", GapKind::Empirical),
            Utc::now(),
        );
        let json = serde_json::to_value(&gap).unwrap();
        assert_eq!(json["type"], "empirical");
        assert_eq!(json["priority"], "medium");
    }

    #[test]
    fn test_strip_arguments() {
        let arg = ArgumentId::new();
        let mut theme = SynthesisTheme::from_new(
            ThemeId::new(),
            NewTheme::new(ThesisId::new(), "T").with_arguments(vec![arg.clone()]),
            Utc::now(),
        );
        let removed: HashSet<_> = [arg].into_iter().collect();
        assert!(theme.strip_arguments(&removed));
        assert!(theme.related_argument_ids.is_empty());
    }
}
