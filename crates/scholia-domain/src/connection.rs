//! Typed, directed edges between papers of one thesis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{validate_confidence, ValidationError};
use crate::{ConnectionId, PaperId, ThesisId, ThesisScoped};

string_enum! {
    /// The relationship one paper has to another
    pub enum ConnectionType {
        Extends => "extends",
        Critiques => "critiques",
        Contradicts => "contradicts",
        UsesMethod => "uses-method",
        Supports => "supports",
        Replicates => "replicates",
        Reviews => "reviews",
        Related => "related",
    }
}

/// A directed edge `from -> to` inside one thesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub thesis_id: ThesisId,
    pub from_paper_id: PaperId,
    pub to_paper_id: PaperId,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub note: String,
    /// Proposed by the assistant rather than entered by hand
    #[serde(default)]
    pub ai_suggested: bool,
    #[serde(default)]
    pub ai_confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn from_new(id: ConnectionId, payload: NewConnection, now: DateTime<Utc>) -> Self {
        Self {
            id,
            thesis_id: payload.thesis_id,
            from_paper_id: payload.from_paper_id,
            to_paper_id: payload.to_paper_id,
            connection_type: payload.connection_type,
            note: payload.note,
            ai_suggested: payload.ai_suggested,
            ai_confidence: payload.ai_confidence,
            created_at: now,
            updated_at: now,
        }
    }

    /// True if either endpoint is `paper`
    pub fn touches(&self, paper: &PaperId) -> bool {
        &self.from_paper_id == paper || &self.to_paper_id == paper
    }

    /// The endpoint opposite `paper`, if `paper` is an endpoint
    pub fn other_end(&self, paper: &PaperId) -> Option<&PaperId> {
        if &self.from_paper_id == paper {
            Some(&self.to_paper_id)
        } else if &self.to_paper_id == paper {
            Some(&self.from_paper_id)
        } else {
            None
        }
    }
}

impl ThesisScoped for Connection {
    fn thesis_id(&self) -> &ThesisId {
        &self.thesis_id
    }
}

fn validate_endpoints(from: &PaperId, to: &PaperId) -> Result<(), ValidationError> {
    if from == to {
        return Err(ValidationError::new(
            "toPaperId",
            "a paper cannot be connected to itself",
        ));
    }
    Ok(())
}

/// Payload for creating a connection
#[derive(Debug, Clone, PartialEq)]
pub struct NewConnection {
    pub thesis_id: ThesisId,
    pub from_paper_id: PaperId,
    pub to_paper_id: PaperId,
    pub connection_type: ConnectionType,
    pub note: String,
    pub ai_suggested: bool,
    pub ai_confidence: Option<f64>,
}

impl NewConnection {
    pub fn new(
        thesis_id: ThesisId,
        from_paper_id: PaperId,
        to_paper_id: PaperId,
        connection_type: ConnectionType,
    ) -> Self {
        Self {
            thesis_id,
            from_paper_id,
            to_paper_id,
            connection_type,
            note: String::new(),
            ai_suggested: false,
            ai_confidence: None,
        }
    }

    /// Mark the connection as an assistant suggestion
    pub fn suggested(mut self, confidence: f64) -> Self {
        self.ai_suggested = true;
        self.ai_confidence = Some(confidence);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_endpoints(&self.from_paper_id, &self.to_paper_id)?;
        validate_confidence("aiConfidence", self.ai_confidence)
    }
}

/// Shallow patch for a connection. Endpoints may move within the same thesis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionPatch {
    pub from_paper_id: Option<PaperId>,
    pub to_paper_id: Option<PaperId>,
    pub connection_type: Option<ConnectionType>,
    pub note: Option<String>,
    pub ai_suggested: Option<bool>,
    pub ai_confidence: Option<Option<f64>>,
}

impl ConnectionPatch {
    pub fn validate(&self, current: &Connection) -> Result<(), ValidationError> {
        let from = self.from_paper_id.as_ref().unwrap_or(&current.from_paper_id);
        let to = self.to_paper_id.as_ref().unwrap_or(&current.to_paper_id);
        validate_endpoints(from, to)?;
        if let Some(confidence) = self.ai_confidence {
            validate_confidence("aiConfidence", confidence)?;
        }
        Ok(())
    }

    pub fn apply_to(self, connection: &mut Connection) {
        if let Some(from) = self.from_paper_id {
            connection.from_paper_id = from;
        }
        if let Some(to) = self.to_paper_id {
            connection.to_paper_id = to;
        }
        if let Some(kind) = self.connection_type {
            connection.connection_type = kind;
        }
        if let Some(note) = self.note {
            connection.note = note;
        }
        if let Some(suggested) = self.ai_suggested {
            connection.ai_suggested = suggested;
        }
        if let Some(confidence) = self.ai_confidence {
            connection.ai_confidence = confidence;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_type_spelling() {
        let json = serde_json::to_string(&ConnectionType::UsesMethod).unwrap();
        assert_eq!(json, "\"uses-method\"");
        assert_eq!(ConnectionType::ALL.len(), 8);
    }

    #[test]
    fn test_self_loop_rejected() {
        let paper = PaperId::new();
        let payload = NewConnection::new(
            ThesisId::new(),
            paper.clone(),
            paper,
            ConnectionType::Extends,
        );
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_confidence_range() {
        let payload = NewConnection::new(
            ThesisId::new(),
            PaperId::new(),
            PaperId::new(),
            ConnectionType::Supports,
        )
        .suggested(1.2);
        assert_eq!(payload.validate().unwrap_err().field, "aiConfidence");
    }

    #[test]
    fn test_other_end() {
        let (a, b) = (PaperId::new(), PaperId::new());
        let connection = Connection::from_new(
            ConnectionId::new(),
            NewConnection::new(ThesisId::new(), a.clone(), b.clone(), ConnectionType::Critiques),
            Utc::now(),
        );
        assert_eq!(connection.other_end(&a), Some(&b));
        assert_eq!(connection.other_end(&b), Some(&a));
        assert_eq!(connection.other_end(&PaperId::new()), None);
    }
}
