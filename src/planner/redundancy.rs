// Speed tuning graph simplification.
//
// Vertices are the slots of one team, edges are `SpeedTune`s stored under the
// slot that has to be faster (its incoming "slower than by" set). The passes
// only ever remove edges and report the ids of what they removed.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::model::{SpeedTune, TuneKind};
use super::PlannerError;

/// A constraint toward `slower_than` as seen from the monster being analyzed:
/// either one of its own surviving edges, or one implied by composing an edge
/// with an already analyzed constraint further up the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpliedTune {
    pub slower_than: i64,
    pub kind: TuneKind,
    pub amount: Option<f64>,
    /// Edge this constraint was derived through; `None` for literal edges.
    pub depends_on: Option<i64>,
}

impl ImpliedTune {
    fn literal(tune: &SpeedTune) -> Self {
        Self {
            slower_than: tune.slower_than,
            kind: tune.kind,
            amount: tune.amount,
            depends_on: None,
        }
    }

    /// Compose `parent` (monster -> P) with `grand` (P -> G) into monster -> G.
    pub fn compose(parent: &SpeedTune, grand: &ImpliedTune) -> Self {
        let (kind, amount) = match (parent.kind, grand.kind) {
            (TuneKind::AsLittleAsPossible, TuneKind::AsLittleAsPossible) => {
                (TuneKind::AsLittleAsPossible, None)
            }
            (TuneKind::WithinFlat, TuneKind::WithinFlat) => (
                TuneKind::WithinFlat,
                parent.amount.zip(grand.amount).map(|(a, b)| a + b),
            ),
            (TuneKind::WithinPercent, TuneKind::WithinPercent) => (
                TuneKind::WithinPercent,
                parent
                    .amount
                    .zip(grand.amount)
                    .map(|(a, b)| 1.0 - (1.0 - a) * (1.0 - b)),
            ),
            _ => (TuneKind::AnyAmount, None),
        };
        Self {
            slower_than: grand.slower_than,
            kind,
            amount,
            depends_on: Some(parent.id),
        }
    }
}

impl SpeedTune {
    /// Whether `implied` already guarantees everything this edge asks for.
    fn is_implied_by(&self, implied: &ImpliedTune) -> bool {
        if self.slower_than != implied.slower_than {
            return false;
        }
        if self.kind == TuneKind::AnyAmount {
            return true;
        }
        self.kind == implied.kind && self.kind.not_stricter(self.amount, implied.amount)
    }
}

/// The speed tuning graph of one team.
#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    /// faster-than slot id -> its incoming edges
    incoming: BTreeMap<i64, Vec<SpeedTune>>,
}

impl ConstraintGraph {
    /// Build the graph for the given team slots. Every edge has to connect two
    /// of those slots.
    pub fn new(
        monsters: impl IntoIterator<Item = i64>,
        tunes: impl IntoIterator<Item = SpeedTune>,
    ) -> Result<Self, PlannerError> {
        let mut incoming: BTreeMap<i64, Vec<SpeedTune>> =
            monsters.into_iter().map(|id| (id, Vec::new())).collect();

        for tune in tunes {
            if !incoming.contains_key(&tune.slower_than) {
                return Err(PlannerError::CrossTeamEdge {
                    edge: tune.id,
                    monster: tune.slower_than,
                });
            }
            match incoming.get_mut(&tune.faster_than) {
                Some(edges) => edges.push(tune),
                None => {
                    return Err(PlannerError::CrossTeamEdge {
                        edge: tune.id,
                        monster: tune.faster_than,
                    })
                }
            }
        }
        Ok(Self { incoming })
    }

    pub fn monster_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.incoming.keys().copied()
    }

    pub fn incoming(&self, monster_id: i64) -> &[SpeedTune] {
        self.incoming
            .get(&monster_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tunes(&self) -> impl Iterator<Item = &SpeedTune> {
        self.incoming.values().flatten()
    }

    pub fn tune_count(&self) -> usize {
        self.incoming.values().map(Vec::len).sum()
    }

    /// Collapse parallel edges into one monster.
    ///
    /// Per `slower_than` peer: an `AnyAmount` edge loses to any other edge,
    /// and of two edges of the same kind the weaker one goes (one of two
    /// equal edges). Edges of different specific kinds are all kept.
    pub fn eliminate_monster(&mut self, monster_id: i64) -> Vec<i64> {
        let Some(edges) = self.incoming.get_mut(&monster_id) else {
            return Vec::new();
        };

        let mut kept: Vec<SpeedTune> = Vec::with_capacity(edges.len());
        let mut removed = Vec::new();

        'edges: for tune in std::mem::take(edges) {
            let mut i = 0;
            while i < kept.len() {
                let other = &kept[i];
                if other.slower_than != tune.slower_than {
                    i += 1;
                    continue;
                }
                if tune.kind == TuneKind::AnyAmount {
                    removed.push(tune.id);
                    continue 'edges;
                }
                if other.kind == TuneKind::AnyAmount {
                    removed.push(kept.remove(i).id);
                    continue;
                }
                if other.kind != tune.kind {
                    i += 1;
                    continue;
                }
                if tune.not_stricter_than(other) {
                    removed.push(tune.id);
                    continue 'edges;
                }
                removed.push(kept.remove(i).id);
            }
            kept.push(tune);
        }

        *edges = kept;
        removed
    }

    /// Remove every edge that is duplicated, or implied by a chain of other
    /// edges, across the whole team.
    ///
    /// Monsters are analyzed once all of their `slower_than` peers are; a
    /// round without progress means the graph has a cycle, in which case the
    /// graph is left untouched.
    pub fn eliminate(&mut self) -> Result<Vec<i64>, PlannerError> {
        let mut work = self.clone();
        let ids: Vec<i64> = work.monster_ids().collect();

        let mut removed = Vec::new();
        for &id in &ids {
            removed.extend(work.eliminate_monster(id));
        }

        let mut analyzed: HashMap<i64, Vec<ImpliedTune>> = HashMap::new();
        let mut remaining: BTreeSet<i64> = ids.into_iter().collect();

        while !remaining.is_empty() {
            let before = remaining.len();
            let pending: Vec<i64> = remaining.iter().copied().collect();

            for id in pending {
                let parents = work.incoming(id);
                if !parents
                    .iter()
                    .all(|parent| analyzed.contains_key(&parent.slower_than))
                {
                    continue;
                }

                let mut current: Vec<ImpliedTune> = Vec::new();
                for parent in parents {
                    for grand in &analyzed[&parent.slower_than] {
                        current.push(ImpliedTune::compose(parent, grand));
                    }
                }

                let redundant: Vec<i64> = parents
                    .iter()
                    .filter(|parent| current.iter().any(|implied| parent.is_implied_by(implied)))
                    .map(|parent| parent.id)
                    .collect();

                current.extend(
                    parents
                        .iter()
                        .filter(|parent| !redundant.contains(&parent.id))
                        .map(ImpliedTune::literal),
                );

                if let Some(edges) = work.incoming.get_mut(&id) {
                    edges.retain(|tune| !redundant.contains(&tune.id));
                }
                removed.extend(redundant);
                analyzed.insert(id, current);
                remaining.remove(&id);
            }

            if remaining.len() == before {
                return Err(PlannerError::CyclicConstraint {
                    remaining: remaining.into_iter().collect(),
                });
            }
        }

        *self = work;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEGAN: i64 = 1;
    const BELLADEON: i64 = 2;
    const VEROMOS: i64 = 3;
    const SIGMARUS: i64 = 4;

    fn tune(id: i64, slower_than: i64, faster_than: i64, kind: TuneKind, amount: Option<f64>) -> SpeedTune {
        SpeedTune {
            id,
            slower_than,
            faster_than,
            kind,
            amount,
        }
    }

    fn any(id: i64, slower_than: i64, faster_than: i64) -> SpeedTune {
        tune(id, slower_than, faster_than, TuneKind::AnyAmount, None)
    }

    fn graph(monsters: &[i64], tunes: Vec<SpeedTune>) -> ConstraintGraph {
        ConstraintGraph::new(monsters.iter().copied(), tunes).unwrap()
    }

    fn surviving(graph: &ConstraintGraph) -> Vec<i64> {
        let mut ids: Vec<i64> = graph.tunes().map(|t| t.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_transitive_remove() {
        let mut g = graph(
            &[MEGAN, BELLADEON, VEROMOS],
            vec![
                any(1, MEGAN, BELLADEON),
                any(2, BELLADEON, VEROMOS),
                any(3, MEGAN, VEROMOS),
            ],
        );
        let removed = g.eliminate().unwrap();
        assert_eq!(removed, vec![3]);
        assert_eq!(surviving(&g), vec![1, 2]);
    }

    #[test]
    fn test_double_transitive_remove() {
        let mut g = graph(
            &[MEGAN, BELLADEON, VEROMOS, SIGMARUS],
            vec![
                any(1, MEGAN, BELLADEON),
                any(2, BELLADEON, VEROMOS),
                any(3, VEROMOS, SIGMARUS),
                any(4, MEGAN, SIGMARUS),
            ],
        );
        g.eliminate().unwrap();
        assert_eq!(surviving(&g), vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_remove() {
        let mut g = graph(
            &[MEGAN, BELLADEON],
            vec![any(1, MEGAN, BELLADEON), any(2, MEGAN, BELLADEON)],
        );
        g.eliminate().unwrap();
        assert_eq!(g.tune_count(), 1);
    }

    #[test]
    fn test_priority_remove() {
        let mut g = graph(
            &[MEGAN, BELLADEON],
            vec![
                tune(1, MEGAN, BELLADEON, TuneKind::AsLittleAsPossible, None),
                any(2, MEGAN, BELLADEON),
            ],
        );
        g.eliminate().unwrap();
        let left: Vec<&SpeedTune> = g.tunes().collect();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kind, TuneKind::AsLittleAsPossible);
    }

    #[test]
    fn test_monster_pass_duplicate_and_priority() {
        let mut g = graph(
            &[MEGAN, BELLADEON],
            vec![any(1, MEGAN, BELLADEON), any(2, MEGAN, BELLADEON)],
        );
        assert_eq!(g.eliminate_monster(BELLADEON).len(), 1);
        assert_eq!(g.tune_count(), 1);

        // ANY listed first still loses to the more specific edge
        let mut g = graph(
            &[MEGAN, BELLADEON],
            vec![
                any(1, MEGAN, BELLADEON),
                tune(2, MEGAN, BELLADEON, TuneKind::AsLittleAsPossible, None),
            ],
        );
        assert_eq!(g.eliminate_monster(BELLADEON), vec![1]);
        assert_eq!(g.incoming(BELLADEON)[0].id, 2);
    }

    #[test]
    fn test_monster_pass_keeps_stricter_amount() {
        let mut g = graph(
            &[MEGAN, BELLADEON],
            vec![
                tune(1, MEGAN, BELLADEON, TuneKind::WithinFlat, Some(10.0)),
                tune(2, MEGAN, BELLADEON, TuneKind::WithinFlat, Some(4.0)),
                tune(3, MEGAN, BELLADEON, TuneKind::WithinFlat, Some(4.0)),
                tune(4, MEGAN, BELLADEON, TuneKind::WithinPercent, Some(0.2)),
            ],
        );
        let removed = g.eliminate_monster(BELLADEON);
        assert_eq!(removed, vec![1, 3]);
        // Different specific kinds cannot be ranked against each other
        assert_eq!(surviving(&g), vec![2, 4]);
    }

    #[test]
    fn test_monster_pass_ignores_other_peers() {
        let mut g = graph(
            &[MEGAN, BELLADEON, VEROMOS],
            vec![any(1, MEGAN, VEROMOS), any(2, BELLADEON, VEROMOS)],
        );
        assert!(g.eliminate_monster(VEROMOS).is_empty());
        assert_eq!(g.tune_count(), 2);
    }

    #[test]
    fn test_flat_composition_removes_looser_direct_tune() {
        let mut g = graph(
            &[MEGAN, BELLADEON, VEROMOS],
            vec![
                tune(1, MEGAN, BELLADEON, TuneKind::WithinFlat, Some(5.0)),
                tune(2, BELLADEON, VEROMOS, TuneKind::WithinFlat, Some(3.0)),
                tune(3, MEGAN, VEROMOS, TuneKind::WithinFlat, Some(10.0)),
            ],
        );
        assert_eq!(g.eliminate().unwrap(), vec![3]);
    }

    #[test]
    fn test_flat_composition_removes_equal_direct_tune() {
        let mut g = graph(
            &[MEGAN, BELLADEON, VEROMOS],
            vec![
                tune(1, MEGAN, BELLADEON, TuneKind::WithinFlat, Some(5.0)),
                tune(2, BELLADEON, VEROMOS, TuneKind::WithinFlat, Some(3.0)),
                tune(3, MEGAN, VEROMOS, TuneKind::WithinFlat, Some(8.0)),
            ],
        );
        assert_eq!(g.eliminate().unwrap(), vec![3]);
        assert_eq!(surviving(&g), vec![1, 2]);
    }

    #[test]
    fn test_flat_composition_keeps_tighter_direct_tune() {
        let mut g = graph(
            &[MEGAN, BELLADEON, VEROMOS],
            vec![
                tune(1, MEGAN, BELLADEON, TuneKind::WithinFlat, Some(5.0)),
                tune(2, BELLADEON, VEROMOS, TuneKind::WithinFlat, Some(3.0)),
                tune(3, MEGAN, VEROMOS, TuneKind::WithinFlat, Some(6.0)),
            ],
        );
        assert!(g.eliminate().unwrap().is_empty());
        assert_eq!(g.tune_count(), 3);
    }

    #[test]
    fn test_percent_composition() {
        let parent = tune(1, BELLADEON, VEROMOS, TuneKind::WithinPercent, Some(0.1));
        let grand = ImpliedTune {
            slower_than: MEGAN,
            kind: TuneKind::WithinPercent,
            amount: Some(0.2),
            depends_on: None,
        };
        let implied = ImpliedTune::compose(&parent, &grand);
        assert_eq!(implied.slower_than, MEGAN);
        assert_eq!(implied.kind, TuneKind::WithinPercent);
        assert!((implied.amount.unwrap() - 0.28).abs() < 1e-9);
        assert_eq!(implied.depends_on, Some(1));
    }

    #[test]
    fn test_mixed_composition_is_any_amount() {
        let parent = tune(1, BELLADEON, VEROMOS, TuneKind::WithinFlat, Some(5.0));
        let grand = ImpliedTune {
            slower_than: MEGAN,
            kind: TuneKind::AsLittleAsPossible,
            amount: None,
            depends_on: None,
        };
        let implied = ImpliedTune::compose(&parent, &grand);
        assert_eq!(implied.kind, TuneKind::AnyAmount);
        assert_eq!(implied.amount, None);

        // A specific direct tune survives an ANY implication
        let mut g = graph(
            &[MEGAN, BELLADEON, VEROMOS],
            vec![
                tune(1, MEGAN, BELLADEON, TuneKind::AsLittleAsPossible, None),
                tune(2, BELLADEON, VEROMOS, TuneKind::WithinFlat, Some(5.0)),
                tune(3, MEGAN, VEROMOS, TuneKind::WithinPercent, Some(0.1)),
            ],
        );
        assert!(g.eliminate().unwrap().is_empty());
    }

    #[test]
    fn test_idempotent() {
        let mut g = graph(
            &[MEGAN, BELLADEON, VEROMOS, SIGMARUS],
            vec![
                any(1, MEGAN, BELLADEON),
                any(2, BELLADEON, VEROMOS),
                any(3, VEROMOS, SIGMARUS),
                any(4, MEGAN, SIGMARUS),
                any(5, MEGAN, VEROMOS),
                any(6, MEGAN, BELLADEON),
            ],
        );
        g.eliminate().unwrap();
        let once = surviving(&g);
        assert!(g.eliminate().unwrap().is_empty());
        assert_eq!(surviving(&g), once);
    }

    #[test]
    fn test_cycle_detected_and_graph_untouched() {
        let mut g = graph(
            &[MEGAN, BELLADEON],
            vec![
                any(1, MEGAN, BELLADEON),
                any(2, BELLADEON, MEGAN),
                any(3, BELLADEON, MEGAN),
            ],
        );
        let err = g.eliminate().unwrap_err();
        assert_eq!(
            err,
            PlannerError::CyclicConstraint {
                remaining: vec![MEGAN, BELLADEON]
            }
        );
        // Nothing is dropped, not even the duplicate
        assert_eq!(g.tune_count(), 3);
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut g = graph(&[MEGAN], vec![any(1, MEGAN, MEGAN)]);
        assert!(matches!(
            g.eliminate(),
            Err(PlannerError::CyclicConstraint { .. })
        ));
    }

    #[test]
    fn test_rejects_cross_team_edge() {
        let err = ConstraintGraph::new([MEGAN, BELLADEON], vec![any(9, 42, BELLADEON)]).unwrap_err();
        assert_eq!(err, PlannerError::CrossTeamEdge { edge: 9, monster: 42 });
    }
}
