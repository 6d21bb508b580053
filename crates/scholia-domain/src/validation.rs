//! Field constraints checked before anything reaches the store

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::EntityKind;

/// A rejected field value or reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// A foreign key that names nothing in the store
    pub fn missing_reference(field: &str, kind: EntityKind, id: &str) -> Self {
        Self::new(field, format!("{} '{}' does not exist", kind, id))
    }

    /// A foreign key that names an entity owned by another thesis
    pub fn cross_thesis(field: &str, kind: EntityKind, id: &str) -> Self {
        Self::new(field, format!("{} '{}' belongs to a different thesis", kind, id))
    }
}

/// Reject empty or whitespace-only text
pub fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// AI confidence scores live in [0, 1]
pub fn validate_confidence(field: &str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ValidationError::new(
            field,
            format!("{} is outside 0.0..=1.0", v),
        )),
        _ => Ok(()),
    }
}

/// Publication years are four-digit
pub fn validate_year(year: Option<i32>) -> Result<(), ValidationError> {
    match year {
        Some(y) if !(1000..=9999).contains(&y) => {
            Err(ValidationError::new("year", format!("{} is not a valid year", y)))
        }
        _ => Ok(()),
    }
}

/// Collapse repeated ids, keeping the first occurrence of each
pub fn dedupe_ids<T: Clone + Eq + Hash>(ids: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Trim tags, drop empties and repeats
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let trimmed = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    dedupe_ids(trimmed)
}
