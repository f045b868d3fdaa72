/// Read-only view of a graph's vertex and edge sets.
pub trait BaseGraph {
    fn order(&self) -> usize;
    fn has_vertex(&self, u: usize) -> bool;
    fn has_edge(&self, u: usize, v: usize) -> bool;
    fn vertices(&self) -> Box<dyn Iterator<Item = usize> + '_>;
    /// Empty for vertices that are not part of the graph.
    fn neighborhood(&self, u: usize) -> Box<dyn Iterator<Item = usize> + '_>;
}
