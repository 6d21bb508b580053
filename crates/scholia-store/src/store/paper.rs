//! Papers and the arguments and evidence embedded in them

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use scholia_domain::{
    require_non_empty, Argument, ArgumentId, ArgumentPatch, EntityKind, Evidence, EvidenceId,
    EvidencePatch, NewPaper, Paper, PaperId, PaperPatch, PaperRefs, ThesisId, ValidationError,
};

use super::refs::{
    require_thesis, require_unused_argument_id, require_unused_embedded_ids,
    require_unused_evidence_id,
};
use super::{drain_where, take_where, CascadeSummary, EntityStore};
use crate::error::{Result, StoreError};
use crate::snapshot::{scoped, Snapshot};

/// Strip every reference to `paper` and its arguments from analytical artifacts
fn detach_paper(state: &mut Snapshot, paper: &PaperId, arguments: &HashSet<ArgumentId>) {
    for theme in &mut state.themes {
        theme.strip_paper(paper);
        theme.strip_arguments(arguments);
    }
    for gap in &mut state.gaps {
        gap.strip_paper(paper);
    }
    for section in &mut state.sections {
        section.strip_paper(paper);
    }
    for synthesis in &mut state.evidence_syntheses {
        synthesis.strip_paper(paper);
    }
    for cluster in &mut state.clusters {
        cluster.strip_paper(paper);
    }
}

/// Drop removed arguments from every theme that cites them
fn forget_arguments(state: &mut Snapshot, removed: &HashSet<ArgumentId>, now: DateTime<Utc>) {
    for theme in &mut state.themes {
        if theme.strip_arguments(removed) {
            theme.updated_at = now;
        }
    }
}

fn paper_mut<'a>(state: &'a mut Snapshot, id: &PaperId) -> Result<&'a mut Paper> {
    state
        .paper_mut(id)
        .ok_or_else(|| StoreError::not_found(EntityKind::Paper, id))
}

/// Position of the paper embedding `argument`
fn locate_argument(state: &Snapshot, argument: &ArgumentId) -> Result<usize> {
    state
        .papers
        .iter()
        .position(|p| p.arguments.iter().any(|a| &a.id == argument))
        .ok_or_else(|| StoreError::not_found(EntityKind::Argument, argument))
}

fn locate_evidence(state: &Snapshot, evidence: &EvidenceId) -> Result<usize> {
    state
        .papers
        .iter()
        .position(|p| p.evidence.iter().any(|e| &e.id == evidence))
        .ok_or_else(|| StoreError::not_found(EntityKind::Evidence, evidence))
}

fn require_link_in(paper: &Paper, link: Option<&ArgumentId>) -> std::result::Result<(), ValidationError> {
    match link {
        Some(argument) if paper.argument(argument).is_none() => Err(ValidationError::new(
            "evidence.linkedArgumentId",
            format!("argument '{}' is not part of this paper", argument),
        )),
        _ => Ok(()),
    }
}

impl EntityStore {
    /// Add a paper to a thesis and append it to the thesis's `paperIds`
    pub fn add_paper(&mut self, payload: NewPaper) -> Result<Paper> {
        payload.validate()?;
        self.commit(|state, now| {
            require_thesis(state, "thesisId", &payload.thesis_id)?;
            require_unused_embedded_ids(
                state,
                &payload.arguments,
                &payload.evidence,
                &HashSet::new(),
            )?;

            let paper = Paper::from_new(state.fresh_id(), payload, now);
            if let Some(thesis) = state.thesis_mut(&paper.thesis_id) {
                thesis.paper_ids.push(paper.id.clone());
            }
            state.papers.push(paper.clone());
            Ok(paper)
        })
    }

    /// Shallow update. Replacing `arguments` drops removed ones from themes.
    pub fn update_paper(&mut self, id: &PaperId, patch: PaperPatch) -> Result<Paper> {
        self.commit(|state, now| {
            let current = state
                .paper(id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Paper, id))?;
            patch.validate(current)?;

            let own_arguments: HashSet<ArgumentId> = current.argument_ids().cloned().collect();
            let arguments = patch.arguments.as_deref().unwrap_or(&current.arguments);
            let evidence = patch.evidence.as_deref().unwrap_or(&current.evidence);
            let kept: HashSet<&str> = current
                .argument_ids()
                .map(|a| a.as_str())
                .chain(current.evidence.iter().map(|e| e.id.as_str()))
                .collect();
            require_unused_embedded_ids(state, arguments, evidence, &kept)?;

            let removed: HashSet<ArgumentId> = match &patch.arguments {
                Some(arguments) => {
                    let retained: HashSet<&ArgumentId> = arguments.iter().map(|a| &a.id).collect();
                    own_arguments
                        .into_iter()
                        .filter(|argument| !retained.contains(argument))
                        .collect()
                }
                None => HashSet::new(),
            };

            let paper = paper_mut(state, id)?;
            patch.apply_to(paper);
            paper.updated_at = now;
            let paper = paper.clone();

            if !removed.is_empty() {
                forget_arguments(state, &removed, now);
            }
            Ok(paper)
        })
    }

    /// Delete a paper, every connection touching it, and its attachment.
    /// Analytical artifacts keep existing with the paper stripped from them.
    pub fn delete_paper(&mut self, id: &PaperId) -> Result<CascadeSummary> {
        let summary = self.commit(|state, _| {
            let paper = take_where(&mut state.papers, |p| &p.id == id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Paper, id))?;

            let removed_connections: HashSet<_> = state
                .connections
                .iter()
                .filter(|c| c.touches(id))
                .map(|c| c.id.clone())
                .collect();
            let connections = drain_where(&mut state.connections, |c| c.touches(id));

            if let Some(thesis) = state.thesis_mut(&paper.thesis_id) {
                thesis.paper_ids.retain(|p| p != id);
                thesis
                    .connection_ids
                    .retain(|c| !removed_connections.contains(c));
            }

            let arguments: HashSet<ArgumentId> = paper.argument_ids().cloned().collect();
            detach_paper(state, id, &arguments);

            Ok(CascadeSummary {
                papers: 1,
                connections,
                ..Default::default()
            })
        })?;

        self.discard_attachments(std::slice::from_ref(id));
        Ok(summary)
    }

    pub fn get_paper(&self, id: &PaperId) -> Option<&Paper> {
        self.state.paper(id)
    }

    /// Papers of one thesis, or of every thesis
    pub fn list_papers(&self, thesis: Option<&ThesisId>) -> Vec<&Paper> {
        scoped(&self.state.papers, thesis)
    }

    // ==================== Embedded arguments ====================

    pub fn add_argument(&mut self, paper: &PaperId, argument: Argument) -> Result<Argument> {
        require_non_empty("arguments.claim", &argument.claim)?;
        self.commit(|state, now| {
            require_unused_argument_id(state, &argument.id)?;
            let paper = paper_mut(state, paper)?;
            paper.arguments.push(argument.clone());
            paper.updated_at = now;
            Ok(argument)
        })
    }

    pub fn update_argument(&mut self, id: &ArgumentId, patch: ArgumentPatch) -> Result<Argument> {
        if let Some(claim) = &patch.claim {
            require_non_empty("arguments.claim", claim)?;
        }
        self.commit(|state, now| {
            let index = locate_argument(state, id)?;
            let paper = &mut state.papers[index];
            let argument = paper
                .arguments
                .iter_mut()
                .find(|a| &a.id == id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Argument, id))?;
            patch.apply_to(argument);
            let argument = argument.clone();
            paper.updated_at = now;
            Ok(argument)
        })
    }

    /// Remove an argument, unlinking evidence and themes that cited it
    pub fn remove_argument(&mut self, id: &ArgumentId) -> Result<()> {
        self.commit(|state, now| {
            let index = locate_argument(state, id)?;
            let removed: HashSet<ArgumentId> = [id.clone()].into_iter().collect();

            let paper = &mut state.papers[index];
            paper.arguments.retain(|a| &a.id != id);
            paper.unlink_arguments(&removed);
            paper.updated_at = now;

            forget_arguments(state, &removed, now);
            Ok(())
        })
    }

    // ==================== Embedded evidence ====================

    pub fn add_evidence(&mut self, paper: &PaperId, evidence: Evidence) -> Result<Evidence> {
        require_non_empty("evidence.description", &evidence.description)?;
        self.commit(|state, now| {
            require_unused_evidence_id(state, &evidence.id)?;
            let paper = paper_mut(state, paper)?;
            require_link_in(paper, evidence.linked_argument_id.as_ref())?;
            paper.evidence.push(evidence.clone());
            paper.updated_at = now;
            Ok(evidence)
        })
    }

    pub fn update_evidence(&mut self, id: &EvidenceId, patch: EvidencePatch) -> Result<Evidence> {
        if let Some(description) = &patch.description {
            require_non_empty("evidence.description", description)?;
        }
        self.commit(|state, now| {
            let index = locate_evidence(state, id)?;
            let paper = &mut state.papers[index];
            if let Some(link) = &patch.linked_argument_id {
                require_link_in(paper, link.as_ref())?;
            }
            let evidence = paper
                .evidence
                .iter_mut()
                .find(|e| &e.id == id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Evidence, id))?;
            patch.apply_to(evidence);
            let evidence = evidence.clone();
            paper.updated_at = now;
            Ok(evidence)
        })
    }

    pub fn remove_evidence(&mut self, id: &EvidenceId) -> Result<()> {
        self.commit(|state, now| {
            let index = locate_evidence(state, id)?;
            let paper = &mut state.papers[index];
            paper.evidence.retain(|e| &e.id != id);
            paper.updated_at = now;
            Ok(())
        })
    }

    // ==================== Attachments ====================

    /// Store a file before the paper it belongs to exists
    pub fn attach_pending_file(&self, temp_key: &str, bytes: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.attachments.put(temp_key, bytes)?;
        Ok(())
    }

    /// Add a paper and move the pending file at `temp_key` onto it.
    ///
    /// The paper is committed even if the file cannot be moved.
    pub fn add_paper_with_attachment(&mut self, payload: NewPaper, temp_key: &str) -> Result<Paper> {
        let paper = self.add_paper(payload)?;
        if let Err(e) = self.attachments.reassign(temp_key, paper.id.as_str()) {
            warn!(paper = %paper.id, temp_key, error = %e, "Could not attach pending file");
        }
        Ok(paper)
    }

    /// The attachment stored for `paper`, if any
    pub fn attachment(&self, paper: &PaperId) -> Option<Vec<u8>> {
        match self.attachments.get(paper.as_str()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(paper = %paper, error = %e, "Could not read attachment");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholia_domain::{EvidenceKind, NewThesis, NewTheme};

    fn store_with_paper() -> (EntityStore, Paper) {
        let mut store = EntityStore::in_memory();
        let thesis = store.create_thesis(NewThesis::new("T1")).unwrap();
        let paper = store.add_paper(NewPaper::new(thesis.id, "P1")).unwrap();
        (store, paper)
    }

    #[test]
    fn test_remove_argument_unlinks_evidence_and_themes() {
        let (mut store, paper) = store_with_paper();
        let argument = store
            .add_argument(&paper.id, Argument::new("Spindles predict recall"))
            .unwrap();
        let evidence = store
            .add_evidence(
                &paper.id,
                Evidence::new("EEG, n=40", EvidenceKind::Empirical).linked_to(argument.id.clone()),
            )
            .unwrap();
        let theme = store
            .create_theme(
                NewTheme::new(paper.thesis_id.clone(), "Consolidation")
                    .with_arguments(vec![argument.id.clone()]),
            )
            .unwrap();

        store.remove_argument(&argument.id).unwrap();

        let paper = store.get_paper(&paper.id).unwrap();
        assert!(paper.arguments.is_empty());
        assert!(paper.evidence_item(&evidence.id).unwrap().linked_argument_id.is_none());
        assert!(store.get_theme(&theme.id).unwrap().related_argument_ids.is_empty());
    }

    #[test]
    fn test_argument_ids_unique_across_papers() {
        let (mut store, paper) = store_with_paper();
        let argument = Argument::new("A");
        store.add_argument(&paper.id, argument.clone()).unwrap();

        let other = store
            .add_paper(NewPaper::new(paper.thesis_id.clone(), "P2"))
            .unwrap();
        let err = store.add_argument(&other.id, argument).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_evidence_link_must_stay_in_paper() {
        let (mut store, paper) = store_with_paper();
        let other = store
            .add_paper(NewPaper::new(paper.thesis_id.clone(), "P2"))
            .unwrap();
        let foreign = store.add_argument(&other.id, Argument::new("B")).unwrap();

        let err = store
            .add_evidence(
                &paper.id,
                Evidence::new("E", EvidenceKind::Other).linked_to(foreign.id),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(ref v) if v.field == "evidence.linkedArgumentId"));
    }

    #[test]
    fn test_update_argument_missing() {
        let (mut store, _) = store_with_paper();
        let err = store
            .update_argument(&ArgumentId::new(), ArgumentPatch::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Argument, .. }));
    }

    #[test]
    fn test_attachment_follows_paper() {
        let mut store = EntityStore::in_memory();
        let thesis = store.create_thesis(NewThesis::new("T1")).unwrap();
        store.attach_pending_file("upload-1", b"%PDF").unwrap();

        let paper = store
            .add_paper_with_attachment(NewPaper::new(thesis.id, "P1"), "upload-1")
            .unwrap();
        assert_eq!(store.attachment(&paper.id), Some(b"%PDF".to_vec()));

        store.delete_paper(&paper.id).unwrap();
        assert_eq!(store.attachment(&paper.id), None);
    }
}
