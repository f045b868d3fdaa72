pub use base_graph::BaseGraph;
pub use weighted_graph::{edge_key, Edge, FillIn, Weight, WeightedGraph, WeightedGraphBfs};

mod base_graph;
mod weighted_graph;
