macro_rules! impl_setter {
    ($self:ident, $field:ident, $type:ty) => {
        pub fn $field(mut $self, $field: $type) -> Self {
            $self.$field = $field;
            $self
        }
    };
}

pub(crate) mod datastructures;
pub use datastructures::{BinaryQueue, BitSet, BucketQueue, DegreeQueue};

pub mod elimination;
pub mod error;
pub mod graph;
pub mod io;
#[cfg(feature = "cli")]
pub mod logger;
pub mod tree_decomposition;

pub use elimination::{
    min_degree_elimination, ordered_elimination, Bag, Elimination, EliminationConfig,
    EliminationOrder, MinDegreeEliminator, QueueStrategy,
};
pub use error::{Result, TdError};
pub use graph::{BaseGraph, Edge, Weight, WeightedGraph};
pub use io::{MtxOptions, MtxReader};
pub use tree_decomposition::{
    treewidth, TreeDecomposition, TreeDecompositionValidationError, WeightLabel,
};
