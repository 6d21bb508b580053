//! Derived views over a snapshot
//!
//! Everything here is recomputed from the snapshot on each call and never
//! stored. A thesis id that does not exist yields empty lists and zero counts.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use scholia_domain::{
    Connection, Paper, PaperId, ReadingStatus, ScreeningDecision, ThesisId, ThesisRole,
};

use crate::snapshot::{scoped, Snapshot};

/// Screening triage counts for one thesis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScreeningStats {
    pub pending: usize,
    pub include: usize,
    pub exclude: usize,
}

impl ScreeningStats {
    pub fn total(&self) -> usize {
        self.pending + self.include + self.exclude
    }
}

/// Reading status counts for one thesis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadingBreakdown {
    pub unread: usize,
    pub reading: usize,
    pub read: usize,
}

impl ReadingBreakdown {
    pub fn total(&self) -> usize {
        self.unread + self.reading + self.read
    }

    /// Fraction of papers read, 0 when there are none
    pub fn progress(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.read as f64 / total as f64,
        }
    }
}

/// One-call summary of a thesis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThesisOverview {
    pub thesis_id: ThesisId,
    pub title: Option<String>,
    pub is_archived: bool,
    pub papers: usize,
    pub connections: usize,
    pub themes: usize,
    pub gaps: usize,
    pub sections: usize,
    pub evidence_syntheses: usize,
    pub clusters: usize,
    pub screening: ScreeningStats,
    pub reading: ReadingBreakdown,
    pub reading_progress: f64,
}

/// Read-only queries across the relationships in a snapshot
#[derive(Debug, Clone, Copy)]
pub struct RelationshipIndex<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> RelationshipIndex<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot }
    }

    /// Papers owned by `thesis`, in insertion order
    pub fn papers_for_thesis(&self, thesis: &ThesisId) -> Vec<&'a Paper> {
        scoped(&self.snapshot.papers, Some(thesis))
    }

    pub fn screening_stats(&self, thesis: &ThesisId) -> ScreeningStats {
        self.papers_for_thesis(thesis)
            .into_iter()
            .fold(ScreeningStats::default(), |mut stats, paper| {
                match paper.screening_decision {
                    ScreeningDecision::Pending => stats.pending += 1,
                    ScreeningDecision::Include => stats.include += 1,
                    ScreeningDecision::Exclude => stats.exclude += 1,
                }
                stats
            })
    }

    pub fn reading_breakdown(&self, thesis: &ThesisId) -> ReadingBreakdown {
        self.papers_for_thesis(thesis)
            .into_iter()
            .fold(ReadingBreakdown::default(), |mut counts, paper| {
                match paper.reading_status {
                    ReadingStatus::Unread => counts.unread += 1,
                    ReadingStatus::Reading => counts.reading += 1,
                    ReadingStatus::Read => counts.read += 1,
                }
                counts
            })
    }

    /// Read papers over all papers; 0 for an empty thesis
    pub fn reading_progress(&self, thesis: &ThesisId) -> f64 {
        self.reading_breakdown(thesis).progress()
    }

    /// Paper counts per role, every role present
    pub fn role_distribution(&self, thesis: &ThesisId) -> BTreeMap<ThesisRole, usize> {
        let mut counts: BTreeMap<ThesisRole, usize> =
            ThesisRole::ALL.iter().map(|role| (*role, 0)).collect();
        for paper in self.papers_for_thesis(thesis) {
            *counts.entry(paper.thesis_role).or_default() += 1;
        }
        counts
    }

    /// Tag usage, most used first, ties by tag
    pub fn tag_counts(&self, thesis: &ThesisId) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for paper in self.papers_for_thesis(thesis) {
            for tag in &paper.tags {
                *counts.entry(tag.as_str()).or_default() += 1;
            }
        }
        let mut counts: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(tag, n)| (tag.to_string(), n))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    pub fn connections_for_thesis(&self, thesis: &ThesisId) -> Vec<&'a Connection> {
        scoped(&self.snapshot.connections, Some(thesis))
    }

    /// Connections with `paper` at either end
    pub fn connections_for_paper(&self, paper: &PaperId) -> Vec<&'a Connection> {
        self.snapshot
            .connections
            .iter()
            .filter(|c| c.touches(paper))
            .collect()
    }

    /// Papers one connection away from `paper`, in either direction
    pub fn neighbors(&self, paper: &PaperId) -> Vec<&'a Paper> {
        let mut seen = HashSet::new();
        self.connections_for_paper(paper)
            .into_iter()
            .filter_map(|c| c.other_end(paper))
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.snapshot.paper(id))
            .collect()
    }

    pub fn thesis_overview(&self, thesis: &ThesisId) -> ThesisOverview {
        let found = self.snapshot.thesis(thesis);
        let reading = self.reading_breakdown(thesis);
        let owned = Some(thesis);
        ThesisOverview {
            thesis_id: thesis.clone(),
            title: found.map(|t| t.title.clone()),
            is_archived: found.map_or(false, |t| t.is_archived),
            papers: self.papers_for_thesis(thesis).len(),
            connections: self.connections_for_thesis(thesis).len(),
            themes: scoped(&self.snapshot.themes, owned).len(),
            gaps: scoped(&self.snapshot.gaps, owned).len(),
            sections: scoped(&self.snapshot.sections, owned).len(),
            evidence_syntheses: scoped(&self.snapshot.evidence_syntheses, owned).len(),
            clusters: scoped(&self.snapshot.clusters, owned).len(),
            screening: self.screening_stats(thesis),
            reading,
            reading_progress: reading.progress(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scholia_domain::{
        ConnectionType, NewConnection, NewPaper, NewThesis, Thesis,
    };

    fn snapshot() -> (Snapshot, ThesisId, Vec<PaperId>) {
        let now = Utc::now();
        let thesis = Thesis::from_new(ThesisId::new(), NewThesis::new("T1"), now);
        let mut state = Snapshot::empty();
        let payloads = [
            NewPaper::new(thesis.id.clone(), "P1")
                .with_reading_status(ReadingStatus::Read)
                .with_screening(ScreeningDecision::Include)
                .with_tags(["eeg", "sleep"]),
            NewPaper::new(thesis.id.clone(), "P2")
                .with_role(ThesisRole::Supports)
                .with_tags(["sleep"]),
            NewPaper::new(thesis.id.clone(), "P3")
                .with_screening(ScreeningDecision::Exclude)
                .with_reading_status(ReadingStatus::Reading),
        ];
        let mut ids = Vec::new();
        for payload in payloads {
            let paper = Paper::from_new(PaperId::new(), payload, now);
            ids.push(paper.id.clone());
            state.papers.push(paper);
        }
        state.connections.push(Connection::from_new(
            "c1".into(),
            NewConnection::new(thesis.id.clone(), ids[0].clone(), ids[1].clone(), ConnectionType::Extends),
            now,
        ));
        let id = thesis.id.clone();
        state.theses.push(thesis);
        (state, id, ids)
    }

    #[test]
    fn test_screening_and_reading() {
        let (state, thesis, _) = snapshot();
        let index = RelationshipIndex::new(&state);

        assert_eq!(
            index.screening_stats(&thesis),
            ScreeningStats { pending: 1, include: 1, exclude: 1 }
        );
        assert_eq!(index.reading_breakdown(&thesis).reading, 1);
        assert!((index.reading_progress(&thesis) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_thesis_is_empty() {
        let (state, _, _) = snapshot();
        let index = RelationshipIndex::new(&state);
        let missing = ThesisId::new();

        assert!(index.papers_for_thesis(&missing).is_empty());
        assert_eq!(index.screening_stats(&missing).total(), 0);
        assert_eq!(index.reading_progress(&missing), 0.0);
        assert_eq!(index.thesis_overview(&missing).title, None);
    }

    #[test]
    fn test_neighbors_both_directions() {
        let (state, _, ids) = snapshot();
        let index = RelationshipIndex::new(&state);

        assert_eq!(index.neighbors(&ids[1])[0].id, ids[0]);
        assert_eq!(index.neighbors(&ids[0])[0].id, ids[1]);
        assert!(index.neighbors(&ids[2]).is_empty());
    }

    #[test]
    fn test_tags_and_roles() {
        let (state, thesis, _) = snapshot();
        let index = RelationshipIndex::new(&state);

        assert_eq!(
            index.tag_counts(&thesis),
            vec![("sleep".to_string(), 2), ("eeg".to_string(), 1)]
        );
        let roles = index.role_distribution(&thesis);
        assert_eq!(roles[&ThesisRole::Background], 2);
        assert_eq!(roles[&ThesisRole::Contradicts], 0);
    }

    #[test]
    fn test_overview() {
        let (state, thesis, _) = snapshot();
        let overview = RelationshipIndex::new(&state).thesis_overview(&thesis);
        assert_eq!(overview.title.as_deref(), Some("T1"));
        assert_eq!(overview.papers, 3);
        assert_eq!(overview.connections, 1);
    }
}
