//! Foreign-key checks against the staged snapshot

use std::collections::HashSet;

use scholia_domain::{
    Argument, ArgumentId, EntityKind, Evidence, EvidenceId, PaperId, ThesisId, ValidationError,
};

use crate::snapshot::Snapshot;

/// The thesis must exist
pub(crate) fn require_thesis(
    state: &Snapshot,
    field: &str,
    thesis: &ThesisId,
) -> Result<(), ValidationError> {
    if state.thesis(thesis).is_none() {
        return Err(ValidationError::missing_reference(
            field,
            EntityKind::Thesis,
            thesis.as_str(),
        ));
    }
    Ok(())
}

/// The paper must exist and belong to `thesis`
pub(crate) fn require_paper_in(
    state: &Snapshot,
    field: &str,
    paper: &PaperId,
    thesis: &ThesisId,
) -> Result<(), ValidationError> {
    match state.paper(paper) {
        None => Err(ValidationError::missing_reference(
            field,
            EntityKind::Paper,
            paper.as_str(),
        )),
        Some(p) if &p.thesis_id != thesis => Err(ValidationError::cross_thesis(
            field,
            EntityKind::Paper,
            paper.as_str(),
        )),
        Some(_) => Ok(()),
    }
}

pub(crate) fn require_papers_in(
    state: &Snapshot,
    field: &str,
    papers: &[PaperId],
    thesis: &ThesisId,
) -> Result<(), ValidationError> {
    papers
        .iter()
        .try_for_each(|paper| require_paper_in(state, field, paper, thesis))
}

/// Every argument must be embedded in a paper of `thesis`
pub(crate) fn require_arguments_in(
    state: &Snapshot,
    field: &str,
    arguments: &[ArgumentId],
    thesis: &ThesisId,
) -> Result<(), ValidationError> {
    for argument in arguments {
        match state.paper_with_argument(argument) {
            None => {
                return Err(ValidationError::missing_reference(
                    field,
                    EntityKind::Argument,
                    argument.as_str(),
                ))
            }
            Some(p) if &p.thesis_id != thesis => {
                return Err(ValidationError::cross_thesis(
                    field,
                    EntityKind::Argument,
                    argument.as_str(),
                ))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Embedded ids are unique across the whole store, not just their paper
pub(crate) fn require_unused_argument_id(
    state: &Snapshot,
    id: &ArgumentId,
) -> Result<(), ValidationError> {
    if state.contains_id(id.as_str()) {
        return Err(ValidationError::new(
            "arguments.id",
            format!("id '{}' is already in use", id),
        ));
    }
    Ok(())
}

pub(crate) fn require_unused_evidence_id(
    state: &Snapshot,
    id: &EvidenceId,
) -> Result<(), ValidationError> {
    if state.contains_id(id.as_str()) {
        return Err(ValidationError::new(
            "evidence.id",
            format!("id '{}' is already in use", id),
        ));
    }
    Ok(())
}

/// Incoming arguments and evidence must not reuse an id, either among
/// themselves or against the store. Ids in `kept` already belong to the
/// paper being updated and are skipped.
pub(crate) fn require_unused_embedded_ids(
    state: &Snapshot,
    arguments: &[Argument],
    evidence: &[Evidence],
    kept: &HashSet<&str>,
) -> Result<(), ValidationError> {
    let mut incoming: HashSet<&str> = HashSet::new();
    let ids = arguments
        .iter()
        .map(|a| ("arguments.id", a.id.as_str()))
        .chain(evidence.iter().map(|e| ("evidence.id", e.id.as_str())));
    for (field, id) in ids {
        if !incoming.insert(id) {
            return Err(ValidationError::new(field, format!("id '{}' is repeated", id)));
        }
        if !kept.contains(id) && state.contains_id(id) {
            return Err(ValidationError::new(
                field,
                format!("id '{}' is already in use", id),
            ));
        }
    }
    Ok(())
}
