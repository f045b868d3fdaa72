use crate::datastructures::{BinaryQueue, BucketQueue, DegreeQueue};
use crate::error::{checked_path_weight, Result, TdError};
use crate::graph::{Edge, FillIn, Weight, WeightedGraph};
use fxhash::FxHashMap;
use log::{debug, info, trace};
use std::cmp::max;

/// Closed neighborhood of a vertex at the moment it was eliminated, together
/// with the weights of the edges to its neighbors at that moment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bag {
    vertex: usize,
    neighbors: Vec<Edge>,
}

impl Bag {
    pub(crate) fn new(vertex: usize, neighbors: Vec<Edge>) -> Self {
        Self { vertex, neighbors }
    }

    /// The eliminated vertex this bag is rooted at.
    pub fn vertex(&self) -> usize {
        self.vertex
    }

    pub fn neighbors(&self) -> &[Edge] {
        &self.neighbors
    }

    /// Number of vertices including the bag's own vertex.
    pub fn len(&self) -> usize {
        self.neighbors.len() + 1
    }

    /// Always false, a bag holds at least its own vertex.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn vertices(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.vertex).chain(self.neighbors.iter().map(|e| e.to))
    }

    pub fn contains(&self, v: usize) -> bool {
        v == self.vertex || self.neighbors.iter().any(|e| e.to == v)
    }

    /// Weight from the bag's vertex to `v`; the vertex itself is at distance 0.
    pub fn weight_to(&self, v: usize) -> Option<Weight> {
        if v == self.vertex {
            return Some(0);
        }
        self.neighbors.iter().find(|e| e.to == v).map(|e| e.weight)
    }
}

/// The order in which vertices were eliminated and the width it induces.
#[derive(Clone, Debug, Default)]
pub struct EliminationOrder {
    sequence: Vec<usize>,
    rank: FxHashMap<usize, usize>,
    width: usize,
}

impl EliminationOrder {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            sequence: Vec::with_capacity(capacity),
            rank: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            width: 0,
        }
    }

    pub(crate) fn push(&mut self, v: usize, bag_size: usize) {
        self.rank.insert(v, self.sequence.len());
        self.sequence.push(v);
        self.width = max(self.width, bag_size - 1);
    }

    /// 0-based step at which `v` was eliminated.
    pub fn rank(&self, v: usize) -> Option<usize> {
        self.rank.get(&v).copied()
    }

    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Largest bag size minus one over all eliminations so far.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn last(&self) -> Option<usize> {
        self.sequence.last().copied()
    }
}

/// Bags in elimination order plus the order itself.
#[derive(Clone, Debug, Default)]
pub struct Elimination {
    pub bags: Vec<Bag>,
    pub order: EliminationOrder,
}

impl Elimination {
    pub fn bag(&self, v: usize) -> Option<&Bag> {
        self.order.rank(v).map(|rank| &self.bags[rank])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueStrategy {
    Buckets,
    BinaryHeap,
}

impl Default for QueueStrategy {
    fn default() -> Self {
        Self::Buckets
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EliminationConfig {
    /// Eliminations between two progress reports, 0 disables them.
    pub progress_interval: usize,
    /// Largest degree the buckets can hold. `None` sizes them to the number
    /// of vertices, which no degree can reach.
    pub bucket_capacity: Option<usize>,
    pub strategy: QueueStrategy,
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            progress_interval: 1000,
            bucket_capacity: None,
            strategy: QueueStrategy::default(),
        }
    }
}

impl EliminationConfig {
    impl_setter!(self, progress_interval, usize);
    impl_setter!(self, bucket_capacity, Option<usize>);
    impl_setter!(self, strategy, QueueStrategy);
}

/// Elimination game over an exclusively owned undirected graph.
///
/// Each step snapshots the star of the eliminated vertex before touching the
/// graph, fills in or relaxes the edges between every pair of its neighbors
/// with the length of the path through it, detaches it and repositions its
/// former neighbors in the degree queue.
pub struct MinDegreeEliminator<Q: DegreeQueue> {
    graph: WeightedGraph,
    queue: Q,
    order: EliminationOrder,
    bags: Vec<Bag>,
    total: usize,
}

impl MinDegreeEliminator<BucketQueue> {
    pub fn with_buckets(graph: WeightedGraph, bucket_capacity: Option<usize>) -> Result<Self> {
        let max_degree = bucket_capacity.unwrap_or_else(|| graph.order().saturating_sub(1));
        let queue = BucketQueue::with_capacity(graph.order(), max_degree);
        Self::new(graph, queue)
    }
}

impl MinDegreeEliminator<BinaryQueue> {
    pub fn with_heap(graph: WeightedGraph) -> Result<Self> {
        Self::new(graph, BinaryQueue::new())
    }
}

impl<Q: DegreeQueue> MinDegreeEliminator<Q> {
    /// Queues every vertex of `graph` in ascending id order.
    pub fn new(graph: WeightedGraph, mut queue: Q) -> Result<Self> {
        if graph.is_directed() {
            return Err(TdError::DirectedInput);
        }
        for v in graph.sorted_vertices() {
            queue.insert(v, graph.degree(v)?)?;
        }
        let total = graph.order();
        Ok(Self {
            graph,
            queue,
            order: EliminationOrder::with_capacity(total),
            bags: Vec::with_capacity(total),
            total,
        })
    }

    pub fn graph(&self) -> &WeightedGraph {
        &self.graph
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn order(&self) -> &EliminationOrder {
        &self.order
    }

    pub fn bags(&self) -> &[Bag] {
        &self.bags
    }

    /// Vertices left to eliminate.
    pub fn remaining(&self) -> usize {
        self.total - self.order.len()
    }

    pub fn pop_min_degree_vertex(&mut self) -> Option<usize> {
        self.queue.pop_min()
    }

    /// Eliminates `v`, records its bag and returns it. `v` does not have to
    /// come out of the queue, which allows replaying a fixed order.
    pub fn eliminate_vertex(&mut self, v: usize) -> Result<&Bag> {
        let star: Vec<Edge> = self.graph.edges(v)?.to_vec();

        for (i, a) in star.iter().enumerate() {
            for b in &star[i + 1..] {
                let candidate = checked_path_weight(a.to, v, b.to, a.weight, b.weight)?;
                match self.graph.relax_or_insert(a.to, b.to, candidate)? {
                    FillIn::Inserted => {
                        trace!("fill-in {} - {} with weight {}", a.to, b.to, candidate)
                    }
                    FillIn::Relaxed => {
                        trace!("relaxed {} - {} to weight {}", a.to, b.to, candidate)
                    }
                    FillIn::Unchanged => {}
                }
            }
        }

        self.graph.remove_vertex(v)?;
        self.queue.remove(v);
        for e in star.iter() {
            let degree = self.graph.degree(e.to)?;
            self.queue.reposition(e.to, degree)?;
        }

        let bag = Bag::new(v, star);
        self.order.push(v, bag.len());
        self.bags.push(bag);
        Ok(&self.bags[self.bags.len() - 1])
    }

    /// Runs the elimination to completion. `progress(done, total)` is called
    /// after every `interval` eliminations; an interval of 0 never calls it.
    pub fn run<F: FnMut(usize, usize)>(mut self, interval: usize, mut progress: F) -> Result<Elimination> {
        info!("eliminating {} vertices", self.remaining());
        while self.remaining() > 0 {
            let v = self.queue.pop_min().ok_or_else(|| {
                TdError::InvariantViolation(format!(
                    "degree queue exhausted after {} of {} eliminations",
                    self.order.len(),
                    self.total
                ))
            })?;
            if !self.graph.has_vertex(v) {
                return Err(TdError::InvariantViolation(format!(
                    "degree queue returned eliminated vertex {}",
                    v
                )));
            }
            self.eliminate_vertex(v)?;

            let done = self.order.len();
            if interval > 0 && done % interval == 0 {
                info!("finished bag {} of {}", done, self.total);
                progress(done, self.total);
            }
        }
        self.finish()
    }

    /// Checks that the run consumed every vertex and hands out its results.
    pub fn finish(mut self) -> Result<Elimination> {
        if let Some(v) = self.queue.pop_min() {
            return Err(TdError::InvariantViolation(format!(
                "vertex {} still queued after {} eliminations",
                v, self.total
            )));
        }
        if self.graph.order() != 0 || self.graph.edge_count() != 0 {
            return Err(TdError::InvariantViolation(format!(
                "{} vertices and {} cached edges survived elimination",
                self.graph.order(),
                self.graph.edge_count()
            )));
        }
        debug!(
            "eliminated {} vertices with width {}",
            self.order.len(),
            self.order.width()
        );
        Ok(Elimination {
            bags: self.bags,
            order: self.order,
        })
    }
}

/// Minimum-degree elimination of the symmetric closure of `graph`.
pub fn min_degree_elimination<F: FnMut(usize, usize)>(
    graph: &WeightedGraph,
    config: &EliminationConfig,
    progress: F,
) -> Result<Elimination> {
    let graph = graph.to_undirected();
    match config.strategy {
        QueueStrategy::Buckets => MinDegreeEliminator::with_buckets(graph, config.bucket_capacity)?
            .run(config.progress_interval, progress),
        QueueStrategy::BinaryHeap => {
            MinDegreeEliminator::with_heap(graph)?.run(config.progress_interval, progress)
        }
    }
}

/// Eliminates the symmetric closure of `graph` in the given order, which
/// must name every vertex exactly once.
pub fn ordered_elimination(graph: &WeightedGraph, order: &[usize]) -> Result<Elimination> {
    let graph = graph.to_undirected();
    if order.len() != graph.order() {
        return Err(TdError::InvariantViolation(format!(
            "order names {} vertices, graph has {}",
            order.len(),
            graph.order()
        )));
    }
    let mut eliminator = MinDegreeEliminator::with_buckets(graph, None)?;
    for v in order.iter().copied() {
        if eliminator.order().rank(v).is_some() {
            return Err(TdError::InvariantViolation(format!(
                "vertex {} appears twice in the order",
                v
            )));
        }
        eliminator.eliminate_vertex(v)?;
    }
    eliminator.finish()
}
