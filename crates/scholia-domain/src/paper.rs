//! Paper domain model with embedded arguments and evidence

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{
    normalize_tags, require_non_empty, validate_year, ValidationError,
};
use crate::{ArgumentId, EvidenceId, PaperId, ThesisId, ThesisScoped};

string_enum! {
    /// How a paper bears on the thesis
    pub enum ThesisRole {
        Supports => "supports",
        Contradicts => "contradicts",
        Method => "method",
        Background => "background",
        Other => "other",
    }
}

impl Default for ThesisRole {
    fn default() -> Self {
        ThesisRole::Background
    }
}

string_enum! {
    /// Reading progress of a paper
    pub enum ReadingStatus {
        Unread => "unread",
        Reading => "reading",
        Read => "read",
    }
}

impl Default for ReadingStatus {
    fn default() -> Self {
        ReadingStatus::Unread
    }
}

string_enum! {
    /// Systematic-review triage state
    pub enum ScreeningDecision {
        Pending => "pending",
        Include => "include",
        Exclude => "exclude",
    }
}

impl Default for ScreeningDecision {
    fn default() -> Self {
        ScreeningDecision::Pending
    }
}

string_enum! {
    /// How strongly the paper makes an argument
    pub enum ArgumentStrength {
        Strong => "strong",
        Moderate => "moderate",
        Weak => "weak",
    }
}

impl Default for ArgumentStrength {
    fn default() -> Self {
        ArgumentStrength::Moderate
    }
}

string_enum! {
    /// The researcher's own stance on an argument
    pub enum Assessment {
        Agree => "agree",
        Disagree => "disagree",
        Uncertain => "uncertain",
        Unassessed => "unassessed",
    }
}

impl Default for Assessment {
    fn default() -> Self {
        Assessment::Unassessed
    }
}

string_enum! {
    /// What sort of evidence a paper offers
    pub enum EvidenceKind {
        Empirical => "empirical",
        Statistical => "statistical",
        Theoretical => "theoretical",
        Qualitative => "qualitative",
        CaseStudy => "case-study",
        Other => "other",
    }
}

impl Default for EvidenceKind {
    fn default() -> Self {
        EvidenceKind::Other
    }
}

/// A claim made by a paper. Owned by the paper, no identity outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub id: ArgumentId,
    pub claim: String,
    #[serde(default)]
    pub strength: ArgumentStrength,
    #[serde(default)]
    pub your_assessment: Assessment,
}

impl Argument {
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            id: ArgumentId::new(),
            claim: claim.into(),
            strength: ArgumentStrength::default(),
            your_assessment: Assessment::default(),
        }
    }

    pub fn with_strength(mut self, strength: ArgumentStrength) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_assessment(mut self, assessment: Assessment) -> Self {
        self.your_assessment = assessment;
        self
    }
}

/// Shallow patch for an embedded argument
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentPatch {
    pub claim: Option<String>,
    pub strength: Option<ArgumentStrength>,
    pub your_assessment: Option<Assessment>,
}

impl ArgumentPatch {
    pub fn apply_to(self, argument: &mut Argument) {
        if let Some(claim) = self.claim {
            argument.claim = claim;
        }
        if let Some(strength) = self.strength {
            argument.strength = strength;
        }
        if let Some(assessment) = self.your_assessment {
            argument.your_assessment = assessment;
        }
    }
}

/// A piece of evidence reported by a paper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: EvidenceId,
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: EvidenceKind,
    /// Weak link to an argument of the same paper
    #[serde(default)]
    pub linked_argument_id: Option<ArgumentId>,
}

impl Evidence {
    pub fn new(description: impl Into<String>, kind: EvidenceKind) -> Self {
        Self {
            id: EvidenceId::new(),
            description: description.into(),
            kind,
            linked_argument_id: None,
        }
    }

    pub fn linked_to(mut self, argument: ArgumentId) -> Self {
        self.linked_argument_id = Some(argument);
        self
    }
}

/// Shallow patch for embedded evidence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidencePatch {
    pub description: Option<String>,
    pub kind: Option<EvidenceKind>,
    /// `Some(None)` clears the link
    pub linked_argument_id: Option<Option<ArgumentId>>,
}

impl EvidencePatch {
    pub fn apply_to(self, evidence: &mut Evidence) {
        if let Some(description) = self.description {
            evidence.description = description;
        }
        if let Some(kind) = self.kind {
            evidence.kind = kind;
        }
        if let Some(link) = self.linked_argument_id {
            evidence.linked_argument_id = link;
        }
    }
}

/// A literature item collected for a thesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: PaperId,
    pub thesis_id: ThesisId,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub takeaway: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub thesis_role: ThesisRole,
    #[serde(default)]
    pub reading_status: ReadingStatus,
    #[serde(default)]
    pub screening_decision: ScreeningDecision,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Paper {
    /// Build a paper from a validated payload
    pub fn from_new(id: PaperId, payload: NewPaper, now: DateTime<Utc>) -> Self {
        Self {
            id,
            thesis_id: payload.thesis_id,
            title: payload.title.trim().to_string(),
            authors: payload.authors,
            year: payload.year,
            doi: payload.doi,
            abstract_text: payload.abstract_text,
            takeaway: payload.takeaway,
            arguments: payload.arguments,
            evidence: payload.evidence,
            thesis_role: payload.thesis_role,
            reading_status: payload.reading_status,
            screening_decision: payload.screening_decision,
            tags: normalize_tags(payload.tags),
            notes: payload.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn argument(&self, id: &ArgumentId) -> Option<&Argument> {
        self.arguments.iter().find(|a| &a.id == id)
    }

    pub fn argument_ids(&self) -> impl Iterator<Item = &ArgumentId> {
        self.arguments.iter().map(|a| &a.id)
    }

    pub fn evidence_item(&self, id: &EvidenceId) -> Option<&Evidence> {
        self.evidence.iter().find(|e| &e.id == id)
    }

    /// Null every evidence link pointing at one of `removed`
    pub fn unlink_arguments(&mut self, removed: &HashSet<ArgumentId>) -> usize {
        let mut unlinked = 0;
        for evidence in &mut self.evidence {
            if let Some(link) = &evidence.linked_argument_id {
                if removed.contains(link) {
                    evidence.linked_argument_id = None;
                    unlinked += 1;
                }
            }
        }
        unlinked
    }
}

impl ThesisScoped for Paper {
    fn thesis_id(&self) -> &ThesisId {
        &self.thesis_id
    }
}

/// Check the arguments and evidence a paper carries, independent of the store.
///
/// Argument and evidence ids share one id space, so an id may appear only
/// once across both lists.
pub fn validate_embedded(
    arguments: &[Argument],
    evidence: &[Evidence],
) -> Result<(), ValidationError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut argument_ids = HashSet::new();
    for argument in arguments {
        require_non_empty("arguments.claim", &argument.claim)?;
        require_non_empty("arguments.id", argument.id.as_str())?;
        if !seen.insert(argument.id.as_str()) {
            return Err(ValidationError::new(
                "arguments.id",
                format!("id '{}' is repeated", argument.id),
            ));
        }
        argument_ids.insert(&argument.id);
    }

    for item in evidence {
        require_non_empty("evidence.description", &item.description)?;
        require_non_empty("evidence.id", item.id.as_str())?;
        if !seen.insert(item.id.as_str()) {
            return Err(ValidationError::new(
                "evidence.id",
                format!("id '{}' is repeated", item.id),
            ));
        }
        if let Some(link) = &item.linked_argument_id {
            if !argument_ids.contains(link) {
                return Err(ValidationError::new(
                    "evidence.linkedArgumentId",
                    format!("argument '{}' is not part of this paper", link),
                ));
            }
        }
    }
    Ok(())
}

/// Payload for adding a paper to a thesis
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaper {
    pub thesis_id: ThesisId,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub abstract_text: Option<String>,
    pub takeaway: String,
    pub arguments: Vec<Argument>,
    pub evidence: Vec<Evidence>,
    pub thesis_role: ThesisRole,
    pub reading_status: ReadingStatus,
    pub screening_decision: ScreeningDecision,
    pub tags: Vec<String>,
    pub notes: String,
}

impl NewPaper {
    pub fn new(thesis_id: ThesisId, title: impl Into<String>) -> Self {
        Self {
            thesis_id,
            title: title.into(),
            authors: Vec::new(),
            year: None,
            doi: None,
            abstract_text: None,
            takeaway: String::new(),
            arguments: Vec::new(),
            evidence: Vec::new(),
            thesis_role: ThesisRole::default(),
            reading_status: ReadingStatus::default(),
            screening_decision: ScreeningDecision::default(),
            tags: Vec::new(),
            notes: String::new(),
        }
    }

    pub fn with_role(mut self, role: ThesisRole) -> Self {
        self.thesis_role = role;
        self
    }

    pub fn with_reading_status(mut self, status: ReadingStatus) -> Self {
        self.reading_status = status;
        self
    }

    pub fn with_screening(mut self, decision: ScreeningDecision) -> Self {
        self.screening_decision = decision;
        self
    }

    pub fn with_takeaway(mut self, takeaway: impl Into<String>) -> Self {
        self.takeaway = takeaway.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)?;
        validate_year(self.year)?;
        validate_embedded(&self.arguments, &self.evidence)
    }
}

/// Shallow patch for a paper. `thesis_id` is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaperPatch {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub year: Option<Option<i32>>,
    pub doi: Option<Option<String>>,
    pub abstract_text: Option<Option<String>>,
    pub takeaway: Option<String>,
    pub arguments: Option<Vec<Argument>>,
    pub evidence: Option<Vec<Evidence>>,
    pub thesis_role: Option<ThesisRole>,
    pub reading_status: Option<ReadingStatus>,
    pub screening_decision: Option<ScreeningDecision>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl PaperPatch {
    /// Field checks that need nothing beyond the patch and the current paper
    pub fn validate(&self, current: &Paper) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_non_empty("title", title)?;
        }
        if let Some(year) = self.year {
            validate_year(year)?;
        }
        let arguments = self.arguments.as_deref().unwrap_or(&current.arguments);
        let evidence = self.evidence.as_deref().unwrap_or(&current.evidence);
        if self.arguments.is_some() || self.evidence.is_some() {
            validate_embedded(arguments, evidence)?;
        }
        Ok(())
    }

    pub fn apply_to(self, paper: &mut Paper) {
        if let Some(title) = self.title {
            paper.title = title.trim().to_string();
        }
        if let Some(authors) = self.authors {
            paper.authors = authors;
        }
        if let Some(year) = self.year {
            paper.year = year;
        }
        if let Some(doi) = self.doi {
            paper.doi = doi;
        }
        if let Some(abstract_text) = self.abstract_text {
            paper.abstract_text = abstract_text;
        }
        if let Some(takeaway) = self.takeaway {
            paper.takeaway = takeaway;
        }
        if let Some(arguments) = self.arguments {
            paper.arguments = arguments;
        }
        if let Some(evidence) = self.evidence {
            paper.evidence = evidence;
        }
        if let Some(role) = self.thesis_role {
            paper.thesis_role = role;
        }
        if let Some(status) = self.reading_status {
            paper.reading_status = status;
        }
        if let Some(decision) = self.screening_decision {
            paper.screening_decision = decision;
        }
        if let Some(tags) = self.tags {
            paper.tags = normalize_tags(tags);
        }
        if let Some(notes) = self.notes {
            paper.notes = notes;
        }
    }
}
