use crate::graph::Weight;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TdError>;

#[derive(Debug, Error)]
pub enum TdError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("no matrix header found in {path}")]
    MissingHeader { path: String },

    #[error("line {line}: invalid matrix header `{content}`")]
    MalformedHeader { line: usize, content: String },

    #[error("line {line}: invalid edge `{content}`")]
    MalformedEdge { line: usize, content: String },

    #[error("line {line}: vertex indices are 1-based, found 0")]
    ZeroIndex { line: usize },

    #[error("vertex {0} does not fit into a packed edge key")]
    VertexOutOfRange(usize),

    #[error("vertex {0} does not exist in graph")]
    MissingVertex(usize),

    #[error("elimination requires an undirected graph")]
    DirectedInput,

    #[error("degree {degree} exceeds bucket capacity {capacity}")]
    BucketOverflow { degree: usize, capacity: usize },

    #[error("weight overflow on fill-in path {u} - {v} - {w}")]
    WeightOverflow { u: usize, v: usize, w: usize },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl TdError {
    /// Input errors can be fixed by the caller; everything else means the
    /// run cannot produce a trustworthy decomposition.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TdError::Io { .. }
                | TdError::MissingHeader { .. }
                | TdError::MalformedHeader { .. }
                | TdError::MalformedEdge { .. }
                | TdError::ZeroIndex { .. }
                | TdError::VertexOutOfRange(_)
        )
    }
}

/// Length of the path `u - v - w` through an eliminated vertex `v`.
pub(crate) fn checked_path_weight(
    u: usize,
    v: usize,
    w: usize,
    first: Weight,
    second: Weight,
) -> Result<Weight> {
    first
        .checked_add(second)
        .ok_or(TdError::WeightOverflow { u, v, w })
}
