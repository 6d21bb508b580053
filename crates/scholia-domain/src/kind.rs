//! Entity kinds, used to label lookups and errors

use serde::{Deserialize, Serialize};

/// Every kind of entity the store holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Thesis,
    Paper,
    Argument,
    Evidence,
    Connection,
    Theme,
    Gap,
    Section,
    EvidenceSynthesis,
    Cluster,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Thesis => "thesis",
            EntityKind::Paper => "paper",
            EntityKind::Argument => "argument",
            EntityKind::Evidence => "evidence",
            EntityKind::Connection => "connection",
            EntityKind::Theme => "theme",
            EntityKind::Gap => "gap",
            EntityKind::Section => "section",
            EntityKind::EvidenceSynthesis => "evidence synthesis",
            EntityKind::Cluster => "cluster",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
