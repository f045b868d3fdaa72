use crate::datastructures::BitSet;
use crate::elimination::{
    min_degree_elimination, ordered_elimination, Bag, Elimination, EliminationConfig,
    EliminationOrder,
};
use crate::error::{Result, TdError};
use crate::graph::{BaseGraph, Weight, WeightedGraph};
use fxhash::FxHashMap;
use log::{info, warn};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeDecompositionValidationError {
    #[error("Has Cycle: ({0}, {1})")]
    HasCycle(usize, usize),
    #[error("Not Connected: {0}")]
    NotConnected(usize),
    #[error("Missing Vertex: {0}")]
    MissingVertex(usize),
    #[error("Missing Edge: ({0}, {1})")]
    MissingEdge(usize, usize),
    #[error("Not Inducing Subtree: {0}")]
    NotInducingSubtree(usize),
}

/// Bag vertices sorted by decreasing elimination rank, so the bag's own
/// vertex comes last, with the weight from the bag's vertex to each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightLabel {
    pub vertex: usize,
    pub vertices: Vec<usize>,
    pub weights: Vec<Weight>,
}

impl WeightLabel {
    fn from_bag(bag: &Bag, order: &EliminationOrder) -> Result<Self> {
        let mut ranked: Vec<(usize, usize, Weight)> = Vec::with_capacity(bag.len());
        ranked.push((rank_of(order, bag.vertex())?, bag.vertex(), 0));
        for e in bag.neighbors() {
            ranked.push((rank_of(order, e.to)?, e.to, e.weight));
        }
        ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        Ok(Self {
            vertex: bag.vertex(),
            vertices: ranked.iter().map(|(_, v, _)| *v).collect(),
            weights: ranked.iter().map(|(_, _, w)| *w).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Weight)> + '_ {
        self.vertices.iter().copied().zip(self.weights.iter().copied())
    }
}

fn rank_of(order: &EliminationOrder, v: usize) -> Result<usize> {
    order.rank(v).ok_or_else(|| {
        TdError::InvariantViolation(format!("bag vertex {} was never eliminated", v))
    })
}

/// Elimination tree: one bag per vertex, linked to the bag of its neighbor
/// that was eliminated first. Everything is stored by elimination rank.
#[derive(Debug, Clone, Default)]
pub struct TreeDecomposition {
    bags: Vec<Bag>,
    order: EliminationOrder,
    parents: Vec<Option<usize>>,
    adjacency: Vec<Vec<usize>>,
    labels: Vec<WeightLabel>,
    roots: Vec<usize>,
}

impl TreeDecomposition {
    pub fn from_elimination(elimination: Elimination) -> Result<Self> {
        let Elimination { bags, order } = elimination;
        if bags.len() != order.len() {
            return Err(TdError::InvariantViolation(format!(
                "{} bags for {} eliminated vertices",
                bags.len(),
                order.len()
            )));
        }

        let mut parents = Vec::with_capacity(bags.len());
        let mut adjacency = vec![vec![]; bags.len()];
        let mut roots = vec![];
        for (rank, bag) in bags.iter().enumerate() {
            if order.rank(bag.vertex()) != Some(rank) {
                return Err(TdError::InvariantViolation(format!(
                    "bag of vertex {} is stored out of elimination order",
                    bag.vertex()
                )));
            }
            let mut parent: Option<(usize, usize)> = None;
            for e in bag.neighbors() {
                let r = rank_of(&order, e.to)?;
                if r <= rank {
                    return Err(TdError::InvariantViolation(format!(
                        "bag of vertex {} holds {} which was eliminated before it",
                        bag.vertex(),
                        e.to
                    )));
                }
                if parent.map_or(true, |(best, _)| r < best) {
                    parent = Some((r, e.to));
                }
            }
            match parent {
                Some((parent_rank, u)) => {
                    adjacency[rank].push(u);
                    adjacency[parent_rank].push(bag.vertex());
                    parents.push(Some(u));
                }
                None => {
                    roots.push(bag.vertex());
                    parents.push(None);
                }
            }
        }

        let labels = bags
            .iter()
            .map(|bag| WeightLabel::from_bag(bag, &order))
            .collect::<Result<Vec<_>>>()?;

        if roots.len() > 1 {
            warn!(
                "input is disconnected, decomposition is a forest of {} trees",
                roots.len()
            );
        }
        Ok(Self {
            bags,
            order,
            parents,
            adjacency,
            labels,
            roots,
        })
    }

    pub fn len(&self) -> usize {
        self.bags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    /// Bags in elimination order.
    pub fn bags(&self) -> &[Bag] {
        &self.bags
    }

    pub fn bag(&self, v: usize) -> Option<&Bag> {
        self.order.rank(v).map(|r| &self.bags[r])
    }

    pub fn labels(&self) -> &[WeightLabel] {
        &self.labels
    }

    pub fn label(&self, v: usize) -> Option<&WeightLabel> {
        self.order.rank(v).map(|r| &self.labels[r])
    }

    pub fn order(&self) -> &EliminationOrder {
        &self.order
    }

    pub fn parent(&self, v: usize) -> Option<usize> {
        self.order.rank(v).and_then(|r| self.parents[r])
    }

    /// Tree neighbors of the bag of `v`, empty for unknown vertices.
    pub fn neighbors(&self, v: usize) -> &[usize] {
        match self.order.rank(v) {
            Some(r) => &self.adjacency[r],
            None => &[],
        }
    }

    /// `(vertex, tree neighbors)` for every bag, in elimination order.
    pub fn adjacency(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.order
            .sequence()
            .iter()
            .copied()
            .zip(self.adjacency.iter().map(|n| n.as_slice()))
    }

    /// Number of tree links.
    pub fn edge_count(&self) -> usize {
        self.parents.iter().filter(|p| p.is_some()).count()
    }

    /// One root per connected component, in elimination order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// The root, if the decomposition is a single tree.
    pub fn root(&self) -> Option<usize> {
        match self.roots.as_slice() {
            [root] => Some(*root),
            _ => None,
        }
    }

    pub fn is_forest(&self) -> bool {
        self.roots.len() > 1
    }

    pub fn treewidth(&self) -> usize {
        treewidth(&self.bags)
    }

    /// Depth-first walk over all trees, starting with the first root.
    pub fn dfs(&self) -> TreeDecompositionIterator {
        let mut visited = BitSet::new(self.bags.len());
        let mut stack = Vec::with_capacity(self.bags.len());
        for root in self.roots.iter().rev().copied() {
            if let Some(r) = self.order.rank(root) {
                visited.set_bit(r);
                stack.push(root);
            }
        }
        TreeDecompositionIterator {
            td: self,
            stack,
            visited,
        }
    }

    pub fn verify<G: BaseGraph>(
        &self,
        graph: &G,
    ) -> std::result::Result<(), TreeDecompositionValidationError> {
        self.check_forest()?;

        if let Some(v) = self.get_missing_vertex(graph) {
            return Err(TreeDecompositionValidationError::MissingVertex(v));
        }

        let occurrences = self.occurrences();

        if let Some((u, v)) = self.get_missing_edge(graph, &occurrences) {
            return Err(TreeDecompositionValidationError::MissingEdge(u, v));
        }

        if let Some(v) = self.get_vertex_not_inducing_subtree(&occurrences) {
            return Err(TreeDecompositionValidationError::NotInducingSubtree(v));
        }

        Ok(())
    }

    /// Every bag is reached from exactly one root, without closing a cycle.
    fn check_forest(&self) -> std::result::Result<(), TreeDecompositionValidationError> {
        let mut visited = BitSet::new(self.bags.len());
        let mut stack: Vec<(Option<usize>, usize)> = Vec::with_capacity(self.bags.len());
        for root in self.roots.iter().copied() {
            let r = self
                .order
                .rank(root)
                .ok_or(TreeDecompositionValidationError::NotConnected(root))?;
            if visited.set_bit(r) {
                return Err(TreeDecompositionValidationError::NotConnected(root));
            }
            stack.push((None, r));
            while let Some((from, r)) = stack.pop() {
                let v = self.bags[r].vertex();
                for u in self.adjacency[r].iter().copied() {
                    let ur = match self.order.rank(u) {
                        Some(ur) => ur,
                        None => return Err(TreeDecompositionValidationError::NotConnected(u)),
                    };
                    if Some(ur) == from {
                        continue;
                    }
                    if visited.set_bit(ur) {
                        return Err(TreeDecompositionValidationError::HasCycle(v, u));
                    }
                    stack.push((Some(r), ur));
                }
            }
        }
        match (0..self.bags.len()).find(|r| !visited[*r]) {
            Some(r) => Err(TreeDecompositionValidationError::NotConnected(
                self.bags[r].vertex(),
            )),
            None => Ok(()),
        }
    }

    /// Ranks of the bags each vertex occurs in.
    fn occurrences(&self) -> FxHashMap<usize, Vec<usize>> {
        let mut occurrences: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for (r, bag) in self.bags.iter().enumerate() {
            for v in bag.vertices() {
                occurrences.entry(v).or_insert_with(Vec::new).push(r);
            }
        }
        occurrences
    }

    fn get_missing_vertex<G: BaseGraph>(&self, graph: &G) -> Option<usize> {
        let mut missing: Vec<usize> = graph
            .vertices()
            .filter(|v| self.order.rank(*v).is_none())
            .collect();
        missing.sort_unstable();
        missing.first().copied()
    }

    fn get_missing_edge<G: BaseGraph>(
        &self,
        graph: &G,
        occurrences: &FxHashMap<usize, Vec<usize>>,
    ) -> Option<(usize, usize)> {
        let mut vertices: Vec<usize> = graph.vertices().collect();
        vertices.sort_unstable();
        for u in vertices {
            let bags = match occurrences.get(&u) {
                Some(bags) => bags,
                None => continue,
            };
            for v in graph.neighborhood(u) {
                if u != v && !bags.iter().any(|r| self.bags[*r].contains(v)) {
                    return Some((u, v));
                }
            }
        }
        None
    }

    fn get_vertex_not_inducing_subtree(
        &self,
        occurrences: &FxHashMap<usize, Vec<usize>>,
    ) -> Option<usize> {
        let mut vertices: Vec<usize> = occurrences.keys().copied().collect();
        vertices.sort_unstable();
        for v in vertices {
            let bags = &occurrences[&v];
            let mut visited = BitSet::new(self.bags.len());
            visited.set_bit(bags[0]);
            let mut stack = vec![bags[0]];
            let mut reached = 1;
            while let Some(r) = stack.pop() {
                for u in self.adjacency[r].iter() {
                    if let Some(ur) = self.order.rank(*u) {
                        if self.bags[ur].contains(v) && !visited.set_bit(ur) {
                            reached += 1;
                            stack.push(ur);
                        }
                    }
                }
            }
            if reached != bags.len() {
                return Some(v);
            }
        }
        None
    }
}

pub struct TreeDecompositionIterator<'a> {
    td: &'a TreeDecomposition,
    stack: Vec<usize>,
    visited: BitSet,
}

impl<'a> Iterator for TreeDecompositionIterator<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        for c in self.td.neighbors(current).iter().copied() {
            if let Some(r) = self.td.order.rank(c) {
                if !self.visited.set_bit(r) {
                    self.stack.push(c);
                }
            }
        }
        Some(current)
    }
}

/// Largest bag size minus one, 0 without bags.
pub fn treewidth(bags: &[Bag]) -> usize {
    bags.iter().map(|b| b.len() - 1).max().unwrap_or(0)
}

impl WeightedGraph {
    /// Minimum-degree elimination tree with default settings.
    pub fn compute_tree_decomposition(&self) -> Result<TreeDecomposition> {
        self.compute_tree_decomposition_with(&EliminationConfig::default(), |_, _| {})
    }

    pub fn compute_tree_decomposition_with<F: FnMut(usize, usize)>(
        &self,
        config: &EliminationConfig,
        progress: F,
    ) -> Result<TreeDecomposition> {
        info!(
            "computing tree decomposition of {} vertices using {:?}",
            self.order(),
            config.strategy
        );
        let elimination = min_degree_elimination(self, config, progress)?;
        let td = TreeDecomposition::from_elimination(elimination)?;
        info!(
            "treewidth {} with {} bags and {} roots",
            td.treewidth(),
            td.len(),
            td.roots().len()
        );
        Ok(td)
    }

    /// Elimination tree for a caller-chosen order over all vertices.
    pub fn tree_decomposition_from_order(&self, order: &[usize]) -> Result<TreeDecomposition> {
        TreeDecomposition::from_elimination(ordered_elimination(self, order)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::elimination::{Bag, Elimination, EliminationConfig, EliminationOrder, QueueStrategy};
    use crate::error::TdError;
    use crate::graph::{Edge, Weight, WeightedGraph};
    use crate::tree_decomposition::{treewidth, TreeDecompositionValidationError};
    use rand::prelude::*;

    /// Star on `0` with leaves `1..=4`, plus `1 - 2`, unit weights.
    fn star() -> WeightedGraph {
        let mut graph = WeightedGraph::new(false);
        for (u, v) in [(0, 1), (0, 2), (0, 3), (0, 4), (1, 2)].iter() {
            graph.add_edge(*u, *v, 1).unwrap();
        }
        graph
    }

    fn random_graph(rng: &mut StdRng, n: usize, p: f64) -> WeightedGraph {
        let mut graph = WeightedGraph::new(false);
        for u in 0..n {
            graph.add_vertex(u).unwrap();
            for v in 0..u {
                if rng.gen_bool(p) {
                    let w: Weight = rng.gen_range(1..100);
                    graph.add_edge(u, v, w).unwrap();
                }
            }
        }
        graph
    }

    #[test]
    fn min_degree_tree() {
        let graph = star();
        let td = graph.compute_tree_decomposition().unwrap();

        assert_eq!(td.order().sequence(), &[4, 3, 0, 2, 1]);
        assert_eq!(td.treewidth(), 2);
        assert_eq!(td.len(), 5);
        assert_eq!(td.edge_count(), 4);
        assert_eq!(td.root(), Some(1));
        assert!(!td.is_forest());

        assert_eq!(td.parent(4), Some(0));
        assert_eq!(td.parent(3), Some(0));
        assert_eq!(td.parent(0), Some(2));
        assert_eq!(td.parent(2), Some(1));
        assert_eq!(td.parent(1), None);
        assert_eq!(td.neighbors(0), &[4, 3, 2]);
        assert!(td.neighbors(42).is_empty());
        assert!(td.verify(&graph).is_ok());
    }

    #[test]
    fn center_first_tree() {
        let graph = star();
        let td = graph.tree_decomposition_from_order(&[4, 0, 3, 2, 1]).unwrap();

        assert_eq!(td.treewidth(), 3);
        assert_eq!(td.bag(0).unwrap().len(), 4);
        assert_eq!(td.edge_count(), 4);
        assert_eq!(td.root(), Some(1));
        assert_eq!(td.parent(0), Some(3));
        assert!(td.verify(&graph).is_ok());

        let label = td.label(0).unwrap();
        assert_eq!(label.vertices, vec![1, 2, 3, 0]);
        assert_eq!(label.weights, vec![1, 1, 1, 0]);

        // 3 was joined to 1 and 2 through the center
        let label = td.label(3).unwrap();
        assert_eq!(label.vertices, vec![1, 2, 3]);
        assert_eq!(label.weights, vec![2, 2, 0]);
    }

    #[test]
    fn labels_use_weights_at_elimination() {
        let mut graph = WeightedGraph::new(false);
        graph.add_edge(0, 1, 1).unwrap();
        graph.add_edge(0, 2, 2).unwrap();
        graph.add_edge(1, 2, 10).unwrap();

        let td = graph.compute_tree_decomposition().unwrap();
        assert_eq!(td.order().sequence(), &[2, 1, 0]);

        let label = td.label(2).unwrap();
        assert_eq!(label.vertices, vec![0, 1, 2]);
        assert_eq!(label.weights, vec![2, 10, 0]);
        assert_eq!(
            td.label(1).unwrap().iter().collect::<Vec<_>>(),
            vec![(0, 1), (1, 0)]
        );
        assert_eq!(td.label(0).unwrap().len(), 1);
        assert_eq!(td.labels().len(), 3);
    }

    #[test]
    fn disconnected_input_is_a_forest() {
        let mut graph = WeightedGraph::new(false);
        graph.add_edge(0, 1, 1).unwrap();
        graph.add_edge(1, 2, 1).unwrap();
        graph.add_edge(10, 11, 3).unwrap();
        graph.add_vertex(7).unwrap();

        let td = graph.compute_tree_decomposition().unwrap();
        assert!(td.is_forest());
        assert_eq!(td.root(), None);
        assert_eq!(td.roots().len(), 3);
        assert_eq!(td.edge_count(), graph.order() - 3);
        for component in graph.connected_components() {
            let roots = td.roots().iter().filter(|r| component.contains(r)).count();
            assert_eq!(roots, 1);
        }
        assert!(td.verify(&graph).is_ok());

        let mut visited: Vec<_> = td.dfs().collect();
        assert_eq!(visited[0], td.roots()[0]);
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1, 2, 7, 10, 11]);
    }

    #[test]
    fn directed_input_is_symmetrized() {
        let mut graph = WeightedGraph::new(true);
        graph.add_edge(0, 1, 4).unwrap();
        graph.add_edge(1, 2, 1).unwrap();
        graph.add_edge(2, 0, 2).unwrap();

        let td = graph.compute_tree_decomposition().unwrap();
        assert_eq!(td.treewidth(), 2);
        assert_eq!(td.root().map(|r| td.parent(r)), Some(None));
        assert!(td.verify(&graph).is_ok());
        assert!(td.verify(&graph.to_undirected()).is_ok());
    }

    #[test]
    fn sparse_ids_decompose() {
        let far = u32::MAX as usize;
        let mut graph = WeightedGraph::new(false);
        graph.add_edge(0, far, 3).unwrap();
        graph.add_edge(far, 40_000_000, 1).unwrap();
        graph.add_edge(40_000_000, 0, 1).unwrap();

        let td = graph.compute_tree_decomposition().unwrap();
        assert_eq!(td.treewidth(), 2);
        assert!(td.verify(&graph).is_ok());
        let mut visited: Vec<_> = td.dfs().collect();
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 40_000_000, far]);
    }

    #[test]
    fn empty_graph() {
        let graph = WeightedGraph::new(false);
        let td = graph.compute_tree_decomposition().unwrap();
        assert!(td.is_empty());
        assert_eq!(td.treewidth(), 0);
        assert_eq!(td.root(), None);
        assert!(td.roots().is_empty());
        assert_eq!(td.dfs().count(), 0);
        assert!(td.verify(&graph).is_ok());
        assert_eq!(treewidth(&[]), 0);
    }

    #[test]
    fn verify_reports_uncovered_graph() {
        let td = star().compute_tree_decomposition().unwrap();

        let mut graph = star();
        graph.add_vertex(9).unwrap();
        assert_eq!(
            td.verify(&graph),
            Err(TreeDecompositionValidationError::MissingVertex(9))
        );

        let mut graph = star();
        graph.add_edge(3, 4, 1).unwrap();
        assert_eq!(
            td.verify(&graph),
            Err(TreeDecompositionValidationError::MissingEdge(3, 4))
        );
    }

    #[test]
    fn bags_must_follow_elimination_order() {
        let mut order = EliminationOrder::default();
        order.push(0, 2);
        order.push(1, 2);
        let elimination = Elimination {
            bags: vec![
                Bag::new(0, vec![Edge::new(1, 1)]),
                Bag::new(1, vec![Edge::new(0, 1)]),
            ],
            order,
        };
        match crate::tree_decomposition::TreeDecomposition::from_elimination(elimination) {
            Err(TdError::InvariantViolation(_)) => {}
            other => panic!("unexpected {:?}", other.map(|td| td.len())),
        }
    }

    #[test]
    fn random_graphs_yield_valid_decompositions() {
        let mut rng = StdRng::seed_from_u64(2021);
        for i in 0..30 {
            let graph = random_graph(&mut rng, 30 + i, 0.06);
            let strategy = if i % 2 == 0 {
                QueueStrategy::Buckets
            } else {
                QueueStrategy::BinaryHeap
            };
            let config = EliminationConfig::default().strategy(strategy);
            let td = graph
                .compute_tree_decomposition_with(&config, |_, _| {})
                .unwrap();

            assert!(td.verify(&graph).is_ok());
            assert_eq!(td.treewidth(), td.order().width());
            assert_eq!(td.treewidth(), treewidth(td.bags()));
            assert_eq!(td.edge_count(), graph.order() - td.roots().len());
            assert_eq!(td.roots().len(), graph.connected_components().len());
            assert_eq!(td.dfs().count(), graph.order());

            for label in td.labels() {
                assert_eq!(label.vertices.last(), Some(&label.vertex));
                assert_eq!(label.weights.last(), Some(&0));
                let ranks: Vec<_> = label
                    .vertices
                    .iter()
                    .map(|v| td.order().rank(*v).unwrap())
                    .collect();
                assert!(ranks.windows(2).all(|w| w[0] > w[1]));
                // fill-in only ever shortens edges
                for (v, w) in label.iter().filter(|(v, _)| *v != label.vertex) {
                    if let Some(original) = graph.edge_weight(label.vertex, v).unwrap() {
                        assert!(w <= original);
                    }
                }
            }
        }
    }
}
