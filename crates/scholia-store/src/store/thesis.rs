//! Theses, archiving and the active-thesis selection

use tracing::info;

use scholia_domain::{EntityKind, NewThesis, Thesis, ThesisId, ThesisPatch, ValidationError};

use super::{drain_where, take_where, CascadeSummary, EntityStore};
use crate::error::{Result, StoreError};

impl EntityStore {
    pub fn create_thesis(&mut self, payload: NewThesis) -> Result<Thesis> {
        payload.validate()?;
        self.commit(|state, now| {
            let thesis = Thesis::from_new(state.fresh_id(), payload, now);
            state.theses.push(thesis.clone());
            Ok(thesis)
        })
    }

    pub fn update_thesis(&mut self, id: &ThesisId, patch: ThesisPatch) -> Result<Thesis> {
        patch.validate()?;
        self.commit(|state, now| {
            let thesis = state
                .thesis_mut(id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Thesis, id))?;
            if patch.apply_to(thesis) {
                thesis.updated_at = now;
            }
            Ok(thesis.clone())
        })
    }

    pub fn archive_thesis(&mut self, id: &ThesisId) -> Result<Thesis> {
        self.update_thesis(
            id,
            ThesisPatch {
                is_archived: Some(true),
                ..Default::default()
            },
        )
    }

    pub fn unarchive_thesis(&mut self, id: &ThesisId) -> Result<Thesis> {
        self.update_thesis(
            id,
            ThesisPatch {
                is_archived: Some(false),
                ..Default::default()
            },
        )
    }

    /// Delete a thesis and everything it owns.
    ///
    /// Children go first (connections, analytical artifacts, papers) so no
    /// intermediate state ever holds a dangling reference.
    pub fn delete_thesis(&mut self, id: &ThesisId) -> Result<CascadeSummary> {
        let mut removed_papers = Vec::new();
        let summary = self.commit(|state, _| {
            if state.thesis(id).is_none() {
                return Err(StoreError::not_found(EntityKind::Thesis, id));
            }

            let owned = |thesis: &ThesisId| thesis == id;
            let mut summary = CascadeSummary {
                connections: drain_where(&mut state.connections, |c| owned(&c.thesis_id)),
                themes: drain_where(&mut state.themes, |t| owned(&t.thesis_id)),
                gaps: drain_where(&mut state.gaps, |g| owned(&g.thesis_id)),
                sections: drain_where(&mut state.sections, |s| owned(&s.thesis_id)),
                evidence_syntheses: drain_where(&mut state.evidence_syntheses, |s| {
                    owned(&s.thesis_id)
                }),
                clusters: drain_where(&mut state.clusters, |c| owned(&c.thesis_id)),
                ..Default::default()
            };

            removed_papers = state
                .papers
                .iter()
                .filter(|p| owned(&p.thesis_id))
                .map(|p| p.id.clone())
                .collect();
            summary.papers = drain_where(&mut state.papers, |p| owned(&p.thesis_id));

            take_where(&mut state.theses, |t| &t.id == id);
            summary.theses = 1;

            if state.active_thesis_id.as_ref() == Some(id) {
                state.active_thesis_id = None;
            }
            Ok(summary)
        })?;

        self.discard_attachments(&removed_papers);
        info!(thesis = %id, removed = summary.total(), "Deleted thesis");
        Ok(summary)
    }

    pub fn get_thesis(&self, id: &ThesisId) -> Option<&Thesis> {
        self.state.thesis(id)
    }

    /// All theses, archived ones included, in creation order
    pub fn list_theses(&self) -> Vec<&Thesis> {
        self.state.theses.iter().collect()
    }

    /// Select the thesis the UI works on, or clear the selection
    pub fn set_active_thesis(&mut self, id: Option<&ThesisId>) -> Result<()> {
        self.commit(|state, _| {
            if let Some(id) = id {
                if state.thesis(id).is_none() {
                    return Err(ValidationError::missing_reference(
                        "activeThesisId",
                        EntityKind::Thesis,
                        id.as_str(),
                    )
                    .into());
                }
            }
            state.active_thesis_id = id.cloned();
            Ok(())
        })
    }

    pub fn active_thesis(&self) -> Option<&Thesis> {
        self.state
            .active_thesis_id
            .as_ref()
            .and_then(|id| self.state.thesis(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholia_domain::NewPaper;

    #[test]
    fn test_update_missing_thesis() {
        let mut store = EntityStore::in_memory();
        let err = store
            .update_thesis(&ThesisId::new(), ThesisPatch::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Thesis, .. }));
    }

    #[test]
    fn test_archive_round_trip() {
        let mut store = EntityStore::in_memory();
        let thesis = store.create_thesis(NewThesis::new("T1")).unwrap();

        assert!(store.archive_thesis(&thesis.id).unwrap().is_archived);
        assert!(!store.unarchive_thesis(&thesis.id).unwrap().is_archived);
    }

    #[test]
    fn test_deleting_active_thesis_clears_selection() {
        let mut store = EntityStore::in_memory();
        let thesis = store.create_thesis(NewThesis::new("T1")).unwrap();
        store.add_paper(NewPaper::new(thesis.id.clone(), "P1")).unwrap();
        store.set_active_thesis(Some(&thesis.id)).unwrap();
        assert_eq!(store.active_thesis().map(|t| &t.id), Some(&thesis.id));

        let summary = store.delete_thesis(&thesis.id).unwrap();
        assert_eq!(summary.papers, 1);
        assert!(store.active_thesis().is_none());
        assert!(store.snapshot().active_thesis_id.is_none());
    }

    #[test]
    fn test_active_thesis_must_exist() {
        let mut store = EntityStore::in_memory();
        let err = store.set_active_thesis(Some(&ThesisId::new())).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
