//! Typed identifiers
//!
//! Each entity kind gets its own newtype so a paper id can never be handed to
//! an operation expecting a thesis id. Fresh ids are UUID v4 text; ids read
//! back from older stores may be any non-empty string.

entity_id!(
    /// Unique identifier for a thesis
    ThesisId
);
entity_id!(
    /// Unique identifier for a paper
    PaperId
);
entity_id!(
    /// Unique identifier for an argument embedded in a paper
    ArgumentId
);
entity_id!(
    /// Unique identifier for evidence embedded in a paper
    EvidenceId
);
entity_id!(
    /// Unique identifier for a connection between two papers
    ConnectionId
);
entity_id!(
    /// Unique identifier for a synthesis theme
    ThemeId
);
entity_id!(
    /// Unique identifier for a research gap
    GapId
);
entity_id!(
    /// Unique identifier for a review section
    SectionId
);
entity_id!(
    /// Unique identifier for an evidence synthesis
    EvidenceSynthesisId
);
entity_id!(
    /// Unique identifier for a paper cluster
    ClusterId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_are_distinct() {
        let a = PaperId::new();
        let b = PaperId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = ThesisId::from("thesis-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"thesis-1\"");

        let back: ThesisId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.to_string(), "thesis-1");
    }
}
