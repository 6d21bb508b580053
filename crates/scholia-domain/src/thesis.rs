//! Thesis: the root of every ownership chain

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{require_non_empty, ValidationError};
use crate::{ConnectionId, PaperId, ThesisId};

/// A research question and the paper collection gathered around it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thesis {
    pub id: ThesisId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_archived: bool,
    /// Papers owned by this thesis, in insertion order. Maintained by the store.
    #[serde(default)]
    pub paper_ids: Vec<PaperId>,
    /// Connections owned by this thesis, in insertion order. Maintained by the store.
    #[serde(default)]
    pub connection_ids: Vec<ConnectionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a thesis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewThesis {
    pub title: String,
    pub description: String,
}

impl NewThesis {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)
    }
}

/// Shallow patch for a thesis. Ownership lists are not patchable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThesisPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_archived: Option<bool>,
}

impl ThesisPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            require_non_empty("title", title)?;
        }
        Ok(())
    }

    /// Apply the patch, returning true if any field changed
    pub fn apply_to(self, thesis: &mut Thesis) -> bool {
        let before = (
            thesis.title.clone(),
            thesis.description.clone(),
            thesis.is_archived,
        );
        if let Some(title) = self.title {
            thesis.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            thesis.description = description;
        }
        if let Some(archived) = self.is_archived {
            thesis.is_archived = archived;
        }
        before != (thesis.title.clone(), thesis.description.clone(), thesis.is_archived)
    }
}

impl Thesis {
    /// Build a thesis from a validated payload
    pub fn from_new(id: ThesisId, payload: NewThesis, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: payload.title.trim().to_string(),
            description: payload.description,
            is_archived: false,
            paper_ids: Vec::new(),
            connection_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_thesis_requires_title() {
        assert!(NewThesis::new("  ").validate().is_err());
        assert!(NewThesis::new("Sleep consolidates memory").validate().is_ok());
    }

    #[test]
    fn test_patch_reports_changes() {
        let mut thesis = Thesis::from_new(ThesisId::new(), NewThesis::new("T1"), Utc::now());

        let changed = ThesisPatch {
            is_archived: Some(true),
            ..Default::default()
        }
        .apply_to(&mut thesis);
        assert!(changed);
        assert!(thesis.is_archived);

        let unchanged = ThesisPatch {
            title: Some("T1".to_string()),
            ..Default::default()
        }
        .apply_to(&mut thesis);
        assert!(!unchanged);
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let thesis = Thesis::from_new(ThesisId::from("t1"), NewThesis::new("T1"), Utc::now());
        let json = serde_json::to_value(&thesis).unwrap();
        assert!(json.get("paperIds").is_some());
        assert!(json.get("isArchived").is_some());
    }
}
