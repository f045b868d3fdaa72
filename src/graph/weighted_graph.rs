use crate::error::{Result, TdError};
use crate::graph::base_graph::BaseGraph;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub type Weight = u64;

/// Vertex ids share a packed 64-bit edge key, 32 bits per endpoint.
const MAX_VERTEX: usize = u32::MAX as usize;

/// Upper bound on capacity hints, which may come from untrusted headers.
const MAX_PREALLOCATED: usize = 1 << 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub to: usize,
    pub weight: Weight,
}

impl Edge {
    pub fn new(to: usize, weight: Weight) -> Self {
        Self { to, weight }
    }
}

/// `u` in the high 32 bits, `v` in the low 32 bits.
#[inline]
pub fn edge_key(u: usize, v: usize) -> u64 {
    ((u as u64) << 32) | (v as u64 & 0xFFFF_FFFF)
}

/// Outcome of offering a path weight to the edge between two neighbors of an
/// eliminated vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillIn {
    Inserted,
    Relaxed,
    Unchanged,
}

/// Weighted adjacency lists plus a packed-key cache of every stored entry.
///
/// Undirected graphs store each edge twice, once per direction, with equal
/// weights. Self-loops have weight 0 by convention and are never stored.
/// Every edge target is itself a vertex of the graph.
#[derive(Clone, Debug, Default)]
pub struct WeightedGraph {
    data: FxHashMap<usize, Vec<Edge>>,
    edges: FxHashSet<u64>,
    directed: bool,
}

impl WeightedGraph {
    pub fn new(directed: bool) -> Self {
        Self {
            data: FxHashMap::default(),
            edges: FxHashSet::default(),
            directed,
        }
    }

    /// `capacity` is a hint, capped before anything is reserved.
    pub fn with_capacity(capacity: usize, directed: bool) -> Self {
        let capacity = capacity.min(MAX_PREALLOCATED);
        Self {
            data: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            edges: FxHashSet::with_capacity_and_hasher(
                capacity.saturating_mul(2),
                Default::default(),
            ),
            directed,
        }
    }

    /// Builds a graph from per-vertex edge lists. Sources are processed in
    /// ascending id order so the resulting lists do not depend on the
    /// iteration order of the input. In undirected mode missing reverse
    /// entries are added, and duplicate entries keep the smallest weight.
    pub fn from_adjacency<I, E>(adjacency: I, directed: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, E)>,
        E: IntoIterator<Item = Edge>,
    {
        let mut lists: Vec<(usize, Vec<Edge>)> = adjacency
            .into_iter()
            .map(|(u, edges)| (u, edges.into_iter().collect()))
            .collect();
        lists.sort_unstable_by_key(|(u, _)| *u);

        let mut graph = Self::with_capacity(lists.len(), directed);
        for (u, edges) in lists {
            graph.add_vertex(u)?;
            for edge in edges {
                graph.add_edge(u, edge.to, edge.weight)?;
            }
        }
        Ok(graph)
    }

    pub fn add_vertex(&mut self, u: usize) -> Result<()> {
        check_vertex(u)?;
        self.insert_vertex(u);
        Ok(())
    }

    /// Adds `u -> v` (and `v -> u` when undirected). An existing entry keeps
    /// the smaller of the two weights. Self-loops only materialize `u`.
    pub fn add_edge(&mut self, u: usize, v: usize, weight: Weight) -> Result<()> {
        check_vertex(u)?;
        check_vertex(v)?;
        self.insert_edge(u, v, weight);
        Ok(())
    }

    fn insert_vertex(&mut self, u: usize) {
        self.data.entry(u).or_insert_with(Vec::new);
    }

    fn insert_edge(&mut self, u: usize, v: usize, weight: Weight) {
        self.insert_vertex(u);
        self.insert_vertex(v);
        if u == v {
            return;
        }
        self.upsert(u, v, weight);
        if !self.directed {
            self.upsert(v, u, weight);
        }
    }

    fn upsert(&mut self, u: usize, v: usize, weight: Weight) {
        let list = self.data.entry(u).or_insert_with(Vec::new);
        if self.edges.insert(edge_key(u, v)) {
            list.push(Edge::new(v, weight));
        } else if let Some(edge) = list.iter_mut().find(|e| e.to == v) {
            if weight < edge.weight {
                edge.weight = weight;
            }
        }
    }

    fn entry_mut(&mut self, u: usize, v: usize) -> Result<&mut Edge> {
        self.data
            .get_mut(&u)
            .ok_or(TdError::MissingVertex(u))?
            .iter_mut()
            .find(|e| e.to == v)
            .ok_or_else(|| {
                TdError::InvariantViolation(format!(
                    "edge ({}, {}) is cached but not stored",
                    u, v
                ))
            })
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn has_vertex(&self, u: usize) -> bool {
        self.data.contains_key(&u)
    }

    /// Number of live vertices.
    pub fn order(&self) -> usize {
        self.data.len()
    }

    /// Number of stored directed entries; an undirected edge counts twice.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn sorted_vertices(&self) -> Vec<usize> {
        let mut vertices: Vec<usize> = self.data.keys().copied().collect();
        vertices.sort_unstable();
        vertices
    }

    /// All stored entries as `(from, to, weight)`, sorted.
    pub fn edge_list(&self) -> Vec<(usize, usize, Weight)> {
        let mut list: Vec<_> = self
            .data
            .iter()
            .flat_map(|(u, edges)| edges.iter().map(move |e| (*u, e.to, e.weight)))
            .collect();
        list.sort_unstable();
        list
    }

    pub fn edges(&self, v: usize) -> Result<&[Edge]> {
        self.data
            .get(&v)
            .map(|edges| edges.as_slice())
            .ok_or(TdError::MissingVertex(v))
    }

    pub fn neighbors(&self, v: usize) -> Result<Vec<usize>> {
        Ok(self.edges(v)?.iter().map(|e| e.to).collect())
    }

    pub fn degree(&self, v: usize) -> Result<usize> {
        Ok(self.edges(v)?.len())
    }

    #[inline]
    pub fn edge_exists(&self, u: usize, v: usize) -> bool {
        u <= MAX_VERTEX && v <= MAX_VERTEX && self.edges.contains(&edge_key(u, v))
    }

    /// `Some(0)` for `u == v`, `None` if the two vertices are not adjacent.
    /// Querying a vertex that is not part of the graph is an error.
    pub fn edge_weight(&self, u: usize, v: usize) -> Result<Option<Weight>> {
        let edges = self.edges(u)?;
        if u == v {
            return Ok(Some(0));
        }
        if !self.has_vertex(v) {
            return Err(TdError::MissingVertex(v));
        }
        if !self.edge_exists(u, v) {
            return Ok(None);
        }
        edges
            .iter()
            .find(|e| e.to == v)
            .map(|e| Some(e.weight))
            .ok_or_else(|| {
                TdError::InvariantViolation(format!(
                    "edge ({}, {}) is cached but not stored",
                    u, v
                ))
            })
    }

    /// Detaches `v` from every list that references it and drops its cache
    /// keys. Returns the removed out-edges of `v`.
    ///
    /// Undirected graphs only visit the neighbors of `v`. Directed graphs do
    /// not index incoming edges, so all lists are checked.
    pub fn remove_vertex(&mut self, v: usize) -> Result<Vec<Edge>> {
        let out = self.data.remove(&v).ok_or(TdError::MissingVertex(v))?;
        if self.directed {
            for (x, list) in self.data.iter_mut() {
                if self.edges.remove(&edge_key(*x, v)) {
                    list.retain(|e| e.to != v);
                }
            }
        } else {
            for edge in out.iter() {
                if let Some(list) = self.data.get_mut(&edge.to) {
                    list.retain(|e| e.to != v);
                }
                self.edges.remove(&edge_key(edge.to, v));
            }
        }
        for edge in out.iter() {
            self.edges.remove(&edge_key(v, edge.to));
        }
        Ok(out)
    }

    /// Offers `weight` as the length of `u - w` in both directions: inserts
    /// the edge when absent, lowers it when heavier, keeps it otherwise.
    pub(crate) fn relax_or_insert(&mut self, u: usize, w: usize, weight: Weight) -> Result<FillIn> {
        for x in [u, w].iter() {
            if !self.has_vertex(*x) {
                return Err(TdError::MissingVertex(*x));
            }
        }
        if self.edges.contains(&edge_key(u, w)) {
            let forward = self.entry_mut(u, w)?;
            if weight >= forward.weight {
                return Ok(FillIn::Unchanged);
            }
            forward.weight = weight;
            self.entry_mut(w, u)?.weight = weight;
            Ok(FillIn::Relaxed)
        } else {
            self.upsert(u, w, weight);
            self.upsert(w, u, weight);
            Ok(FillIn::Inserted)
        }
    }

    pub fn bfs(&self, start: usize) -> Result<WeightedGraphBfs> {
        if !self.has_vertex(start) {
            return Err(TdError::MissingVertex(start));
        }
        let mut visited: FxHashSet<usize> =
            FxHashSet::with_capacity_and_hasher(self.data.len(), Default::default());
        visited.insert(start);
        let mut queue = VecDeque::with_capacity(self.data.len());
        queue.push_back(start);
        Ok(WeightedGraphBfs {
            graph: self,
            queue,
            visited,
        })
    }

    /// Breadth-first order from `start`, neighbors visited in list order.
    pub fn bfs_traversal(&self, start: usize) -> Result<Vec<usize>> {
        Ok(self.bfs(start)?.collect())
    }

    /// Weakly connected components, each sorted, ordered by smallest member.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        if self.directed {
            return self.to_undirected().connected_components();
        }
        let mut visited: FxHashSet<usize> =
            FxHashSet::with_capacity_and_hasher(self.data.len(), Default::default());
        let mut components = vec![];
        let mut stack = Vec::with_capacity(self.data.len());
        for u in self.sorted_vertices() {
            if !visited.insert(u) {
                continue;
            }
            stack.push(u);
            let mut component = vec![u];
            while let Some(v) = stack.pop() {
                if let Some(edges) = self.data.get(&v) {
                    for e in edges {
                        if visited.insert(e.to) {
                            stack.push(e.to);
                            component.push(e.to);
                        }
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Keeps the given vertices and every entry between two of them. Ids
    /// that are not part of the graph are ignored.
    pub fn induced_subgraph(&self, vertices: &[usize]) -> Self {
        let keep: FxHashSet<usize> = vertices
            .iter()
            .copied()
            .filter(|v| self.has_vertex(*v))
            .collect();
        let mut sorted: Vec<usize> = keep.iter().copied().collect();
        sorted.sort_unstable();

        let mut subgraph = Self::with_capacity(sorted.len(), self.directed);
        for u in sorted {
            subgraph.insert_vertex(u);
            for e in self.data[&u].iter().filter(|e| keep.contains(&e.to)) {
                subgraph.insert_vertex(e.to);
                subgraph.upsert(u, e.to, e.weight);
            }
        }
        subgraph
    }

    /// Symmetric closure; opposite entries collapse to their smaller weight.
    pub fn to_undirected(&self) -> Self {
        if !self.directed {
            return self.clone();
        }
        let mut graph = Self::with_capacity(self.data.len(), false);
        for u in self.sorted_vertices() {
            graph.insert_vertex(u);
            for e in self.data[&u].iter() {
                graph.insert_edge(u, e.to, e.weight);
            }
        }
        graph
    }

    /// Checks that the cache and the lists describe the same entry set, that
    /// no entry dangles or repeats, and, when undirected, that every entry has
    /// a reverse twin of equal weight.
    pub fn check_consistency(&self) -> Result<()> {
        let mut stored: FxHashSet<u64> =
            FxHashSet::with_capacity_and_hasher(self.edges.len(), Default::default());
        for (u, edges) in self.data.iter() {
            for e in edges {
                if e.to == *u {
                    return Err(TdError::InvariantViolation(format!(
                        "self-loop stored at {}",
                        u
                    )));
                }
                if !self.has_vertex(e.to) {
                    return Err(TdError::InvariantViolation(format!(
                        "edge ({}, {}) points to a removed vertex",
                        u, e.to
                    )));
                }
                if !stored.insert(edge_key(*u, e.to)) {
                    return Err(TdError::InvariantViolation(format!(
                        "edge ({}, {}) is stored twice",
                        u, e.to
                    )));
                }
                if !self.directed && self.edge_weight(e.to, *u)? != Some(e.weight) {
                    return Err(TdError::InvariantViolation(format!(
                        "edge ({}, {}) has no reverse twin of weight {}",
                        u, e.to, e.weight
                    )));
                }
            }
        }
        if stored != self.edges {
            return Err(TdError::InvariantViolation(format!(
                "edge cache holds {} keys for {} stored entries",
                self.edges.len(),
                stored.len()
            )));
        }
        Ok(())
    }
}

fn check_vertex(u: usize) -> Result<()> {
    if u > MAX_VERTEX {
        return Err(TdError::VertexOutOfRange(u));
    }
    Ok(())
}

pub struct WeightedGraphBfs<'a> {
    graph: &'a WeightedGraph,
    queue: VecDeque<usize>,
    visited: FxHashSet<usize>,
}

impl<'a> Iterator for WeightedGraphBfs<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.queue.pop_front()?;
        if let Some(edges) = self.graph.data.get(&current) {
            for e in edges {
                if self.visited.insert(e.to) {
                    self.queue.push_back(e.to);
                }
            }
        }
        Some(current)
    }
}

impl BaseGraph for WeightedGraph {
    fn order(&self) -> usize {
        self.data.len()
    }

    fn has_vertex(&self, u: usize) -> bool {
        self.data.contains_key(&u)
    }

    fn has_edge(&self, u: usize, v: usize) -> bool {
        self.edge_exists(u, v)
    }

    fn vertices(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(self.data.keys().copied())
    }

    fn neighborhood(&self, u: usize) -> Box<dyn Iterator<Item = usize> + '_> {
        match self.data.get(&u) {
            Some(edges) => Box::new(edges.iter().map(|e| e.to)),
            None => Box::new(std::iter::empty()),
        }
    }
}
