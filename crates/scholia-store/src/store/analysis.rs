//! Themes, gaps, review sections, evidence syntheses and clusters

use scholia_domain::{
    Cluster, ClusterId, ClusterPatch, EntityKind, EvidenceSynthesis, EvidenceSynthesisId,
    EvidenceSynthesisPatch, GapId, GapPatch, NewCluster, NewEvidenceSynthesis, NewGap,
    NewSection, NewTheme, ResearchGap, ReviewSection, SectionId, SectionPatch, SynthesisTheme,
    ThemeId, ThemePatch, ThesisId,
};

use super::refs::{require_arguments_in, require_papers_in, require_thesis};
use super::{take_where, EntityStore};
use crate::error::{Result, StoreError};
use crate::snapshot::{scoped, Snapshot};

fn find_mut<'a, T>(
    items: &'a mut [T],
    kind: EntityKind,
    id: &str,
    key: impl Fn(&T) -> &str,
) -> Result<&'a mut T> {
    items
        .iter_mut()
        .find(|item| key(&**item) == id)
        .ok_or_else(|| StoreError::not_found(kind, id))
}

/// Renumber one thesis's sections `0..n`, placing `moved` at `position`
pub(crate) fn resequence_sections(
    state: &mut Snapshot,
    thesis: &ThesisId,
    moved: Option<(&SectionId, u32)>,
) {
    let mut ordered: Vec<(u32, usize)> = state
        .sections
        .iter()
        .enumerate()
        .filter(|(_, s)| &s.thesis_id == thesis)
        .filter(|(_, s)| moved.map_or(true, |(id, _)| &s.id != id))
        .map(|(index, s)| (s.order, index))
        .collect();
    ordered.sort();
    let mut sequence: Vec<usize> = ordered.into_iter().map(|(_, index)| index).collect();

    if let Some((id, position)) = moved {
        if let Some(index) = state.sections.iter().position(|s| &s.id == id) {
            let at = (position as usize).min(sequence.len());
            sequence.insert(at, index);
        }
    }

    for (order, index) in sequence.into_iter().enumerate() {
        state.sections[index].order = order as u32;
    }
}

impl EntityStore {
    // ==================== Themes ====================

    pub fn create_theme(&mut self, payload: NewTheme) -> Result<SynthesisTheme> {
        payload.validate()?;
        self.commit(|state, now| {
            require_thesis(state, "thesisId", &payload.thesis_id)?;
            require_papers_in(state, "paperIds", &payload.paper_ids, &payload.thesis_id)?;
            require_arguments_in(
                state,
                "relatedArgumentIds",
                &payload.related_argument_ids,
                &payload.thesis_id,
            )?;
            let theme = SynthesisTheme::from_new(state.fresh_id(), payload, now);
            state.themes.push(theme.clone());
            Ok(theme)
        })
    }

    pub fn update_theme(&mut self, id: &ThemeId, patch: ThemePatch) -> Result<SynthesisTheme> {
        patch.validate()?;
        self.commit(|state, now| {
            let thesis = state
                .theme(id)
                .map(|t| t.thesis_id.clone())
                .ok_or_else(|| StoreError::not_found(EntityKind::Theme, id))?;
            if let Some(papers) = &patch.paper_ids {
                require_papers_in(state, "paperIds", papers, &thesis)?;
            }
            if let Some(arguments) = &patch.related_argument_ids {
                require_arguments_in(state, "relatedArgumentIds", arguments, &thesis)?;
            }
            let theme = find_mut(&mut state.themes, EntityKind::Theme, id.as_str(), |t| {
                t.id.as_str()
            })?;
            patch.apply_to(theme);
            theme.updated_at = now;
            Ok(theme.clone())
        })
    }

    pub fn delete_theme(&mut self, id: &ThemeId) -> Result<()> {
        self.commit(|state, _| {
            take_where(&mut state.themes, |t| &t.id == id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(EntityKind::Theme, id))
        })
    }

    pub fn get_theme(&self, id: &ThemeId) -> Option<&SynthesisTheme> {
        self.state.theme(id)
    }

    pub fn list_themes(&self, thesis: Option<&ThesisId>) -> Vec<&SynthesisTheme> {
        scoped(&self.state.themes, thesis)
    }

    // ==================== Gaps ====================

    pub fn create_gap(&mut self, payload: NewGap) -> Result<ResearchGap> {
        payload.validate()?;
        self.commit(|state, now| {
            require_thesis(state, "thesisId", &payload.thesis_id)?;
            require_papers_in(
                state,
                "relatedPaperIds",
                &payload.related_paper_ids,
                &payload.thesis_id,
            )?;
            let gap = ResearchGap::from_new(state.fresh_id(), payload, now);
            state.gaps.push(gap.clone());
            Ok(gap)
        })
    }

    pub fn update_gap(&mut self, id: &GapId, patch: GapPatch) -> Result<ResearchGap> {
        patch.validate()?;
        self.commit(|state, now| {
            let thesis = state
                .gap(id)
                .map(|g| g.thesis_id.clone())
                .ok_or_else(|| StoreError::not_found(EntityKind::Gap, id))?;
            if let Some(papers) = &patch.related_paper_ids {
                require_papers_in(state, "relatedPaperIds", papers, &thesis)?;
            }
            let gap = find_mut(&mut state.gaps, EntityKind::Gap, id.as_str(), |g| g.id.as_str())?;
            patch.apply_to(gap);
            gap.updated_at = now;
            Ok(gap.clone())
        })
    }

    pub fn delete_gap(&mut self, id: &GapId) -> Result<()> {
        self.commit(|state, _| {
            take_where(&mut state.gaps, |g| &g.id == id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(EntityKind::Gap, id))
        })
    }

    pub fn get_gap(&self, id: &GapId) -> Option<&ResearchGap> {
        self.state.gap(id)
    }

    pub fn list_gaps(&self, thesis: Option<&ThesisId>) -> Vec<&ResearchGap> {
        scoped(&self.state.gaps, thesis)
    }

    // ==================== Review sections ====================

    /// Insert a section at `payload.order`, or last. Later sections shift down.
    pub fn create_section(&mut self, payload: NewSection) -> Result<ReviewSection> {
        payload.validate()?;
        self.commit(|state, now| {
            require_thesis(state, "thesisId", &payload.thesis_id)?;
            require_papers_in(state, "paperIds", &payload.paper_ids, &payload.thesis_id)?;

            let count = state
                .sections
                .iter()
                .filter(|s| s.thesis_id == payload.thesis_id)
                .count() as u32;
            let position = payload.order.unwrap_or(count).min(count);
            let section = ReviewSection::from_new(state.fresh_id(), payload, position, now);
            let (id, thesis) = (section.id.clone(), section.thesis_id.clone());
            state.sections.push(section);

            resequence_sections(state, &thesis, Some((&id, position)));
            state
                .section(&id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(EntityKind::Section, &id))
        })
    }

    pub fn update_section(&mut self, id: &SectionId, patch: SectionPatch) -> Result<ReviewSection> {
        patch.validate()?;
        self.commit(|state, now| {
            let thesis = state
                .section(id)
                .map(|s| s.thesis_id.clone())
                .ok_or_else(|| StoreError::not_found(EntityKind::Section, id))?;
            if let Some(papers) = &patch.paper_ids {
                require_papers_in(state, "paperIds", papers, &thesis)?;
            }
            let section = find_mut(&mut state.sections, EntityKind::Section, id.as_str(), |s| {
                s.id.as_str()
            })?;
            patch.apply_to(section);
            section.updated_at = now;
            Ok(section.clone())
        })
    }

    /// Move a section to `order` within its thesis; orders stay dense
    pub fn move_section(&mut self, id: &SectionId, order: u32) -> Result<Vec<ReviewSection>> {
        self.commit(|state, now| {
            let thesis = state
                .section(id)
                .map(|s| s.thesis_id.clone())
                .ok_or_else(|| StoreError::not_found(EntityKind::Section, id))?;
            resequence_sections(state, &thesis, Some((id, order)));
            if let Some(section) = state.sections.iter_mut().find(|s| &s.id == id) {
                section.updated_at = now;
            }
            let mut ordered: Vec<ReviewSection> = scoped(&state.sections, Some(&thesis))
                .into_iter()
                .cloned()
                .collect();
            ordered.sort_by_key(|s| s.order);
            Ok(ordered)
        })
    }

    pub fn delete_section(&mut self, id: &SectionId) -> Result<()> {
        self.commit(|state, _| {
            let section = take_where(&mut state.sections, |s| &s.id == id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Section, id))?;
            resequence_sections(state, &section.thesis_id, None);
            Ok(())
        })
    }

    pub fn get_section(&self, id: &SectionId) -> Option<&ReviewSection> {
        self.state.section(id)
    }

    /// Sections in document order
    pub fn list_sections(&self, thesis: Option<&ThesisId>) -> Vec<&ReviewSection> {
        let mut sections = scoped(&self.state.sections, thesis);
        sections.sort_by(|a, b| (&a.thesis_id, a.order).cmp(&(&b.thesis_id, b.order)));
        sections
    }

    // ==================== Evidence syntheses ====================

    pub fn create_evidence_synthesis(
        &mut self,
        payload: NewEvidenceSynthesis,
    ) -> Result<EvidenceSynthesis> {
        payload.validate()?;
        self.commit(|state, now| {
            require_thesis(state, "thesisId", &payload.thesis_id)?;
            require_papers_in(
                state,
                "supportingPaperIds",
                &payload.supporting_paper_ids,
                &payload.thesis_id,
            )?;
            require_papers_in(
                state,
                "contradictingPaperIds",
                &payload.contradicting_paper_ids,
                &payload.thesis_id,
            )?;
            let synthesis = EvidenceSynthesis::from_new(state.fresh_id(), payload, now);
            state.evidence_syntheses.push(synthesis.clone());
            Ok(synthesis)
        })
    }

    pub fn update_evidence_synthesis(
        &mut self,
        id: &EvidenceSynthesisId,
        patch: EvidenceSynthesisPatch,
    ) -> Result<EvidenceSynthesis> {
        self.commit(|state, now| {
            let current = state
                .evidence_synthesis(id)
                .ok_or_else(|| StoreError::not_found(EntityKind::EvidenceSynthesis, id))?;
            patch.validate(current)?;
            let thesis = current.thesis_id.clone();
            if let Some(papers) = &patch.supporting_paper_ids {
                require_papers_in(state, "supportingPaperIds", papers, &thesis)?;
            }
            if let Some(papers) = &patch.contradicting_paper_ids {
                require_papers_in(state, "contradictingPaperIds", papers, &thesis)?;
            }
            let synthesis = find_mut(
                &mut state.evidence_syntheses,
                EntityKind::EvidenceSynthesis,
                id.as_str(),
                |s| s.id.as_str(),
            )?;
            patch.apply_to(synthesis);
            synthesis.updated_at = now;
            Ok(synthesis.clone())
        })
    }

    pub fn delete_evidence_synthesis(&mut self, id: &EvidenceSynthesisId) -> Result<()> {
        self.commit(|state, _| {
            take_where(&mut state.evidence_syntheses, |s| &s.id == id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(EntityKind::EvidenceSynthesis, id))
        })
    }

    pub fn get_evidence_synthesis(&self, id: &EvidenceSynthesisId) -> Option<&EvidenceSynthesis> {
        self.state.evidence_synthesis(id)
    }

    pub fn list_evidence_syntheses(&self, thesis: Option<&ThesisId>) -> Vec<&EvidenceSynthesis> {
        scoped(&self.state.evidence_syntheses, thesis)
    }

    // ==================== Clusters ====================

    pub fn create_cluster(&mut self, payload: NewCluster) -> Result<Cluster> {
        payload.validate()?;
        self.commit(|state, now| {
            require_thesis(state, "thesisId", &payload.thesis_id)?;
            require_papers_in(state, "paperIds", &payload.paper_ids, &payload.thesis_id)?;
            let cluster = Cluster::from_new(state.fresh_id(), payload, now);
            state.clusters.push(cluster.clone());
            Ok(cluster)
        })
    }

    pub fn update_cluster(&mut self, id: &ClusterId, patch: ClusterPatch) -> Result<Cluster> {
        patch.validate()?;
        self.commit(|state, now| {
            let thesis = state
                .cluster(id)
                .map(|c| c.thesis_id.clone())
                .ok_or_else(|| StoreError::not_found(EntityKind::Cluster, id))?;
            if let Some(papers) = &patch.paper_ids {
                require_papers_in(state, "paperIds", papers, &thesis)?;
            }
            let cluster = find_mut(&mut state.clusters, EntityKind::Cluster, id.as_str(), |c| {
                c.id.as_str()
            })?;
            patch.apply_to(cluster);
            cluster.updated_at = now;
            Ok(cluster.clone())
        })
    }

    pub fn delete_cluster(&mut self, id: &ClusterId) -> Result<()> {
        self.commit(|state, _| {
            take_where(&mut state.clusters, |c| &c.id == id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(EntityKind::Cluster, id))
        })
    }

    pub fn get_cluster(&self, id: &ClusterId) -> Option<&Cluster> {
        self.state.cluster(id)
    }

    pub fn list_clusters(&self, thesis: Option<&ThesisId>) -> Vec<&Cluster> {
        scoped(&self.state.clusters, thesis)
    }
}
