//! Research domain types for the scholia thesis graph
//!
//! This crate provides the canonical models for a researcher's knowledge graph:
//! - Thesis: the root research question owning a paper collection
//! - Paper: a literature item with takeaway, arguments, evidence and triage state
//! - Connection: a typed, directed edge between two papers of one thesis
//! - Analysis artifacts: synthesis themes, research gaps, review sections,
//!   evidence syntheses and clusters
//! - Validation: field constraints checked at the store boundary
//!
//! Every enum-like field is a closed set. Unknown values are rejected when
//! parsed, never carried around as free strings.

#[macro_use]
mod macros;

pub mod analysis;
pub mod connection;
pub mod ids;
pub mod kind;
pub mod paper;
pub mod thesis;
pub mod validation;

pub use analysis::*;
pub use connection::*;
pub use ids::*;
pub use kind::*;
pub use paper::*;
pub use thesis::*;
pub use validation::*;

/// Entities owned by exactly one thesis.
pub trait ThesisScoped {
    /// The owning thesis.
    fn thesis_id(&self) -> &ThesisId;
}

/// Entities that list papers and must drop them when a paper goes away.
pub trait PaperRefs {
    /// Remove `paper` from every list. Returns true if anything changed.
    fn strip_paper(&mut self, paper: &PaperId) -> bool;
}
