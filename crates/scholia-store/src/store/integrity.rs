//! Cross-entity invariants: checked on demand, repaired on load

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use scholia_domain::{dedupe_ids, ArgumentId, EntityKind, PaperId, ThesisId};

use super::analysis::resequence_sections;
use crate::snapshot::Snapshot;

/// A broken invariant, and what reconciling it does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityViolation {
    pub kind: EntityKind,
    pub id: String,
    pub problem: String,
}

impl IntegrityViolation {
    fn new(kind: EntityKind, id: impl ToString, problem: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.to_string(),
            problem: problem.into(),
        }
    }
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.id, self.problem)
    }
}

/// Keep the first entity for every id
fn dedupe_by_id<T, F>(items: &mut Vec<T>, kind: EntityKind, id: F, found: &mut Vec<IntegrityViolation>)
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    items.retain(|item| {
        let fresh = seen.insert(id(item).to_string());
        if !fresh {
            found.push(IntegrityViolation::new(kind, id(item), "duplicate id dropped"));
        }
        fresh
    });
}

/// Drop entities whose thesis no longer exists
fn drop_orphans<T, F>(
    items: &mut Vec<T>,
    kind: EntityKind,
    theses: &HashSet<ThesisId>,
    key: F,
    found: &mut Vec<IntegrityViolation>,
) where
    F: Fn(&T) -> (&str, &ThesisId),
{
    items.retain(|item| {
        let (id, thesis) = key(item);
        let owned = theses.contains(thesis);
        if !owned {
            found.push(IntegrityViolation::new(
                kind,
                id,
                format!("owner thesis '{}' missing, removed", thesis),
            ));
        }
        owned
    });
}

/// Dedupe `list` and drop ids `keep` rejects. True if anything changed.
fn clean_ids<T, F>(list: &mut Vec<T>, keep: F) -> bool
where
    T: Clone + Eq + std::hash::Hash,
    F: Fn(&T) -> bool,
{
    let before = list.len();
    let cleaned: Vec<T> = dedupe_ids(std::mem::take(list))
        .into_iter()
        .filter(|id| keep(id))
        .collect();
    *list = cleaned;
    before != list.len()
}

/// Rebuild a derived id list from ownership: stored order first, then the rest
fn rebuild_ids<T: Clone + Eq + std::hash::Hash>(list: &mut Vec<T>, owned: &[T]) -> bool {
    let owned_set: HashSet<&T> = owned.iter().collect();
    let mut rebuilt: Vec<T> = dedupe_ids(list.clone())
        .into_iter()
        .filter(|id| owned_set.contains(id))
        .collect();
    let present: HashSet<T> = rebuilt.iter().cloned().collect();
    rebuilt.extend(owned.iter().filter(|id| !present.contains(*id)).cloned());

    let changed = *list != rebuilt;
    *list = rebuilt;
    changed
}

/// Every id in the snapshot, and the ones handed out so far
struct IdClaims {
    existing: HashSet<String>,
    taken: HashSet<String>,
}

impl IdClaims {
    fn new(state: &Snapshot) -> Self {
        let mut existing = HashSet::new();
        existing.extend(state.theses.iter().map(|t| t.id.to_string()));
        for paper in &state.papers {
            existing.insert(paper.id.to_string());
            existing.extend(paper.arguments.iter().map(|a| a.id.to_string()));
            existing.extend(paper.evidence.iter().map(|e| e.id.to_string()));
        }
        existing.extend(state.connections.iter().map(|c| c.id.to_string()));
        existing.extend(state.themes.iter().map(|t| t.id.to_string()));
        existing.extend(state.gaps.iter().map(|g| g.id.to_string()));
        existing.extend(state.sections.iter().map(|s| s.id.to_string()));
        existing.extend(state.evidence_syntheses.iter().map(|s| s.id.to_string()));
        existing.extend(state.clusters.iter().map(|c| c.id.to_string()));
        Self {
            existing,
            taken: HashSet::new(),
        }
    }

    /// Claim `id`, or hand back a replacement when something already holds it
    fn claim(&mut self, id: &str) -> Option<String> {
        if self.taken.insert(id.to_string()) {
            return None;
        }
        loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if !self.existing.contains(&candidate) && self.taken.insert(candidate.clone()) {
                return Some(candidate);
            }
        }
    }
}

/// Re-mint ids of `items` that an earlier entity already holds.
/// Returns old id to new id for rewriting references.
fn reassign_ids<T, G, S>(
    items: &mut [T],
    kind: EntityKind,
    claims: &mut IdClaims,
    get: G,
    set: S,
    found: &mut Vec<IntegrityViolation>,
) -> HashMap<String, String>
where
    G: Fn(&T) -> &str,
    S: Fn(&mut T, String),
{
    let mut renamed = HashMap::new();
    for item in items {
        let old = get(item).to_string();
        if let Some(new) = claims.claim(&old) {
            found.push(IntegrityViolation::new(
                kind,
                &old,
                format!("id already used by another entity, reassigned to '{}'", new),
            ));
            set(item, new.clone());
            renamed.insert(old, new);
        }
    }
    renamed
}

/// Make every id unique across the whole snapshot.
///
/// Papers keep their ids, since attachments are stored under them. A thesis
/// or connection that loses a collision is re-minted and its references
/// follow it. A repeated argument or evidence id is re-minted on every copy
/// after the first, and evidence links inside that copy's paper follow it.
fn enforce_unique_ids(state: &mut Snapshot, found: &mut Vec<IntegrityViolation>) {
    let mut claims = IdClaims::new(state);
    for paper in &state.papers {
        claims.claim(paper.id.as_str());
    }

    let theses = reassign_ids(
        &mut state.theses,
        EntityKind::Thesis,
        &mut claims,
        |t| t.id.as_str(),
        |t, id| t.id = id.into(),
        found,
    );
    if !theses.is_empty() {
        let follow = |thesis: &mut ThesisId| {
            if let Some(new) = theses.get(thesis.as_str()) {
                *thesis = new.as_str().into();
            }
        };
        state.papers.iter_mut().for_each(|p| follow(&mut p.thesis_id));
        state.connections.iter_mut().for_each(|c| follow(&mut c.thesis_id));
        state.themes.iter_mut().for_each(|t| follow(&mut t.thesis_id));
        state.gaps.iter_mut().for_each(|g| follow(&mut g.thesis_id));
        state.sections.iter_mut().for_each(|s| follow(&mut s.thesis_id));
        state.evidence_syntheses.iter_mut().for_each(|s| follow(&mut s.thesis_id));
        state.clusters.iter_mut().for_each(|c| follow(&mut c.thesis_id));
        if let Some(active) = state.active_thesis_id.as_mut() {
            follow(active);
        }
    }

    let connections = reassign_ids(
        &mut state.connections,
        EntityKind::Connection,
        &mut claims,
        |c| c.id.as_str(),
        |c, id| c.id = id.into(),
        found,
    );
    if !connections.is_empty() {
        for thesis in &mut state.theses {
            for connection in &mut thesis.connection_ids {
                if let Some(new) = connections.get(connection.as_str()) {
                    *connection = new.as_str().into();
                }
            }
        }
    }

    reassign_ids(&mut state.themes, EntityKind::Theme, &mut claims, |t| t.id.as_str(), |t, id| t.id = id.into(), found);
    reassign_ids(&mut state.gaps, EntityKind::Gap, &mut claims, |g| g.id.as_str(), |g, id| g.id = id.into(), found);
    reassign_ids(&mut state.sections, EntityKind::Section, &mut claims, |s| s.id.as_str(), |s, id| s.id = id.into(), found);
    reassign_ids(
        &mut state.evidence_syntheses,
        EntityKind::EvidenceSynthesis,
        &mut claims,
        |s| s.id.as_str(),
        |s, id| s.id = id.into(),
        found,
    );
    reassign_ids(&mut state.clusters, EntityKind::Cluster, &mut claims, |c| c.id.as_str(), |c, id| c.id = id.into(), found);

    for paper in &mut state.papers {
        let arguments = reassign_ids(
            &mut paper.arguments,
            EntityKind::Argument,
            &mut claims,
            |a| a.id.as_str(),
            |a, id| a.id = id.into(),
            found,
        );
        reassign_ids(
            &mut paper.evidence,
            EntityKind::Evidence,
            &mut claims,
            |e| e.id.as_str(),
            |e, id| e.id = id.into(),
            found,
        );
        if arguments.is_empty() {
            continue;
        }
        let own: HashSet<ArgumentId> = paper.argument_ids().cloned().collect();
        for evidence in &mut paper.evidence {
            let Some(link) = evidence.linked_argument_id.as_mut() else {
                continue;
            };
            if own.contains(&*link) {
                continue;
            }
            if let Some(new) = arguments.get(link.as_str()) {
                *link = new.as_str().into();
            }
        }
    }
}

/// Repair every invariant violation in place and report each one.
///
/// Running it over a clone and discarding the result is the integrity check.
pub(crate) fn reconcile(state: &mut Snapshot) -> Vec<IntegrityViolation> {
    let mut found = Vec::new();

    dedupe_by_id(&mut state.theses, EntityKind::Thesis, |t| t.id.as_str(), &mut found);
    dedupe_by_id(&mut state.papers, EntityKind::Paper, |p| p.id.as_str(), &mut found);
    dedupe_by_id(&mut state.connections, EntityKind::Connection, |c| c.id.as_str(), &mut found);
    dedupe_by_id(&mut state.themes, EntityKind::Theme, |t| t.id.as_str(), &mut found);
    dedupe_by_id(&mut state.gaps, EntityKind::Gap, |g| g.id.as_str(), &mut found);
    dedupe_by_id(&mut state.sections, EntityKind::Section, |s| s.id.as_str(), &mut found);
    dedupe_by_id(
        &mut state.evidence_syntheses,
        EntityKind::EvidenceSynthesis,
        |s| s.id.as_str(),
        &mut found,
    );
    dedupe_by_id(&mut state.clusters, EntityKind::Cluster, |c| c.id.as_str(), &mut found);
    enforce_unique_ids(state, &mut found);

    let theses: HashSet<ThesisId> = state.theses.iter().map(|t| t.id.clone()).collect();
    drop_orphans(&mut state.papers, EntityKind::Paper, &theses, |p| (p.id.as_str(), &p.thesis_id), &mut found);
    drop_orphans(&mut state.connections, EntityKind::Connection, &theses, |c| (c.id.as_str(), &c.thesis_id), &mut found);
    drop_orphans(&mut state.themes, EntityKind::Theme, &theses, |t| (t.id.as_str(), &t.thesis_id), &mut found);
    drop_orphans(&mut state.gaps, EntityKind::Gap, &theses, |g| (g.id.as_str(), &g.thesis_id), &mut found);
    drop_orphans(&mut state.sections, EntityKind::Section, &theses, |s| (s.id.as_str(), &s.thesis_id), &mut found);
    drop_orphans(
        &mut state.evidence_syntheses,
        EntityKind::EvidenceSynthesis,
        &theses,
        |s| (s.id.as_str(), &s.thesis_id),
        &mut found,
    );
    drop_orphans(&mut state.clusters, EntityKind::Cluster, &theses, |c| (c.id.as_str(), &c.thesis_id), &mut found);

    let paper_owner: HashMap<PaperId, ThesisId> = state
        .papers
        .iter()
        .map(|p| (p.id.clone(), p.thesis_id.clone()))
        .collect();
    let in_thesis = |paper: &PaperId, thesis: &ThesisId| paper_owner.get(paper) == Some(thesis);

    state.connections.retain(|c| {
        let problem = if c.from_paper_id == c.to_paper_id {
            Some("connects a paper to itself")
        } else if !in_thesis(&c.from_paper_id, &c.thesis_id) {
            Some("source paper missing or in another thesis")
        } else if !in_thesis(&c.to_paper_id, &c.thesis_id) {
            Some("target paper missing or in another thesis")
        } else {
            None
        };
        if let Some(problem) = problem {
            found.push(IntegrityViolation::new(
                EntityKind::Connection,
                &c.id,
                format!("{}, removed", problem),
            ));
        }
        problem.is_none()
    });

    // Back-references follow ownership
    for thesis in &mut state.theses {
        let papers: Vec<PaperId> = state
            .papers
            .iter()
            .filter(|p| p.thesis_id == thesis.id)
            .map(|p| p.id.clone())
            .collect();
        if rebuild_ids(&mut thesis.paper_ids, &papers) {
            found.push(IntegrityViolation::new(EntityKind::Thesis, &thesis.id, "paperIds rebuilt"));
        }
        let connections: Vec<_> = state
            .connections
            .iter()
            .filter(|c| c.thesis_id == thesis.id)
            .map(|c| c.id.clone())
            .collect();
        if rebuild_ids(&mut thesis.connection_ids, &connections) {
            found.push(IntegrityViolation::new(
                EntityKind::Thesis,
                &thesis.id,
                "connectionIds rebuilt",
            ));
        }
    }

    let mut argument_owner: HashMap<ArgumentId, ThesisId> = HashMap::new();
    for paper in &mut state.papers {
        let own: HashSet<ArgumentId> = paper.argument_ids().cloned().collect();
        for evidence in &mut paper.evidence {
            let dangling = matches!(&evidence.linked_argument_id, Some(link) if !own.contains(link));
            if dangling {
                evidence.linked_argument_id = None;
                found.push(IntegrityViolation::new(
                    EntityKind::Evidence,
                    &evidence.id,
                    "linkedArgumentId named no argument of its paper, cleared",
                ));
            }
        }
        argument_owner.extend(own.into_iter().map(|a| (a, paper.thesis_id.clone())));
    }

    let paper_problem = "paper references dropped or collapsed";
    for theme in &mut state.themes {
        let thesis = theme.thesis_id.clone();
        if clean_ids(&mut theme.paper_ids, |p| in_thesis(p, &thesis)) {
            found.push(IntegrityViolation::new(EntityKind::Theme, &theme.id, paper_problem));
        }
        if clean_ids(&mut theme.related_argument_ids, |a| argument_owner.get(a) == Some(&thesis)) {
            found.push(IntegrityViolation::new(
                EntityKind::Theme,
                &theme.id,
                "argument references dropped or collapsed",
            ));
        }
    }
    for gap in &mut state.gaps {
        let thesis = gap.thesis_id.clone();
        if clean_ids(&mut gap.related_paper_ids, |p| in_thesis(p, &thesis)) {
            found.push(IntegrityViolation::new(EntityKind::Gap, &gap.id, paper_problem));
        }
    }
    for section in &mut state.sections {
        let thesis = section.thesis_id.clone();
        if clean_ids(&mut section.paper_ids, |p| in_thesis(p, &thesis)) {
            found.push(IntegrityViolation::new(EntityKind::Section, &section.id, paper_problem));
        }
    }
    for synthesis in &mut state.evidence_syntheses {
        let thesis = synthesis.thesis_id.clone();
        let supporting = clean_ids(&mut synthesis.supporting_paper_ids, |p| in_thesis(p, &thesis));
        let both: HashSet<PaperId> = synthesis.supporting_paper_ids.iter().cloned().collect();
        let contradicting = clean_ids(&mut synthesis.contradicting_paper_ids, |p| {
            in_thesis(p, &thesis) && !both.contains(p)
        });
        if supporting || contradicting {
            found.push(IntegrityViolation::new(
                EntityKind::EvidenceSynthesis,
                &synthesis.id,
                paper_problem,
            ));
        }
    }
    for cluster in &mut state.clusters {
        let thesis = cluster.thesis_id.clone();
        if clean_ids(&mut cluster.paper_ids, |p| in_thesis(p, &thesis)) {
            found.push(IntegrityViolation::new(EntityKind::Cluster, &cluster.id, paper_problem));
        }
    }

    for thesis in &theses {
        let mut orders: Vec<u32> = state
            .sections
            .iter()
            .filter(|s| &s.thesis_id == thesis)
            .map(|s| s.order)
            .collect();
        orders.sort_unstable();
        if orders.iter().enumerate().any(|(i, order)| *order as usize != i) {
            resequence_sections(state, thesis, None);
            found.push(IntegrityViolation::new(
                EntityKind::Thesis,
                thesis,
                "section orders renumbered",
            ));
        }
    }

    if let Some(active) = &state.active_thesis_id {
        if !theses.contains(active) {
            found.push(IntegrityViolation::new(
                EntityKind::Thesis,
                active,
                "active thesis missing, selection cleared",
            ));
            state.active_thesis_id = None;
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scholia_domain::{
        Argument, Connection, ConnectionType, Evidence, EvidenceKind, NewConnection, NewPaper,
        NewThesis, Paper, Thesis,
    };

    fn thesis_with_papers() -> (Snapshot, Thesis, Paper, Paper) {
        let now = Utc::now();
        let thesis = Thesis::from_new(ThesisId::new(), NewThesis::new("T1"), now);
        let p1 = Paper::from_new(PaperId::new(), NewPaper::new(thesis.id.clone(), "P1"), now);
        let p2 = Paper::from_new(PaperId::new(), NewPaper::new(thesis.id.clone(), "P2"), now);
        let mut state = Snapshot::empty();
        state.theses.push(thesis.clone());
        state.papers.push(p1.clone());
        state.papers.push(p2.clone());
        (state, thesis, p1, p2)
    }

    #[test]
    fn test_rebuilds_paper_ids() {
        let (mut state, thesis, p1, p2) = thesis_with_papers();
        let found = reconcile(&mut state);

        assert_eq!(found.len(), 1);
        assert_eq!(state.thesis(&thesis.id).unwrap().paper_ids, vec![p1.id, p2.id]);
        assert!(reconcile(&mut state).is_empty());
    }

    #[test]
    fn test_removes_dangling_connection() {
        let (mut state, thesis, p1, _) = thesis_with_papers();
        state.connections.push(Connection::from_new(
            "c1".into(),
            NewConnection::new(thesis.id.clone(), p1.id.clone(), PaperId::new(), ConnectionType::Extends),
            Utc::now(),
        ));

        let found = reconcile(&mut state);
        assert!(state.connections.is_empty());
        assert!(found.iter().any(|v| v.kind == EntityKind::Connection && v.id == "c1"));
    }

    #[test]
    fn test_drops_orphan_papers_and_active_selection() {
        let (mut state, thesis, _, _) = thesis_with_papers();
        state.active_thesis_id = Some(thesis.id.clone());
        state.theses.clear();

        reconcile(&mut state);
        assert!(state.papers.is_empty());
        assert!(state.active_thesis_id.is_none());
    }

    #[test]
    fn test_reassigns_ids_shared_across_entities() {
        let now = Utc::now();
        let thesis = Thesis::from_new("t1".into(), NewThesis::new("T1"), now);
        let a1 = Argument {
            id: "a1".into(),
            ..Argument::new("A")
        };
        let p1 = Paper::from_new(
            "t1".into(),
            NewPaper::new(thesis.id.clone(), "P1").with_argument(a1.clone()),
            now,
        );
        let p2 = Paper::from_new(
            "p2".into(),
            NewPaper::new(thesis.id.clone(), "P2")
                .with_argument(a1.clone())
                .with_evidence(Evidence::new("E", EvidenceKind::Other).linked_to(a1.id.clone())),
            now,
        );
        let mut state = Snapshot::empty();
        state.theses.push(thesis);
        state.papers.push(p1);
        state.papers.push(p2);
        state.active_thesis_id = Some("t1".into());

        let found = reconcile(&mut state);

        assert!(found.iter().any(|v| v.kind == EntityKind::Thesis && v.id == "t1"));
        assert!(found.iter().any(|v| v.kind == EntityKind::Argument && v.id == "a1"));

        let thesis = state.theses[0].id.clone();
        assert_ne!(thesis.as_str(), "t1");
        assert_eq!(state.active_thesis_id.as_ref(), Some(&thesis));
        assert!(state.papers.iter().all(|p| p.thesis_id == thesis));
        assert_eq!(state.papers[0].id.as_str(), "t1");
        assert_eq!(state.papers[0].arguments[0].id, a1.id);

        let p2 = &state.papers[1];
        assert_ne!(p2.arguments[0].id, a1.id);
        assert_eq!(p2.evidence[0].linked_argument_id.as_ref(), Some(&p2.arguments[0].id));

        assert!(reconcile(&mut state).is_empty());
    }

    #[test]
    fn test_repeated_embedded_id_in_one_paper_keeps_first_link() {
        let (mut state, _, p1, _) = thesis_with_papers();
        reconcile(&mut state);
        let a1 = Argument::new("A");
        let paper = state.paper_mut(&p1.id).unwrap();
        paper.arguments = vec![a1.clone(), a1.clone()];
        paper.evidence = vec![Evidence {
            id: a1.id.as_str().into(),
            ..Evidence::new("E", EvidenceKind::Other).linked_to(a1.id.clone())
        }];

        let found = reconcile(&mut state);
        assert_eq!(found.len(), 2);

        let paper = state.paper(&p1.id).unwrap();
        assert_eq!(paper.arguments[0].id, a1.id);
        assert_ne!(paper.arguments[1].id, a1.id);
        assert_ne!(paper.evidence[0].id.as_str(), a1.id.as_str());
        assert_eq!(paper.evidence[0].linked_argument_id.as_ref(), Some(&a1.id));
    }

    #[test]
    fn test_display() {
        let violation = IntegrityViolation::new(EntityKind::Paper, "p1", "owner thesis missing");
        assert_eq!(violation.to_string(), "paper p1: owner thesis missing");
    }
}
