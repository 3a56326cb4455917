//! Error types for the index.
//!
//! Only caller-correctable conditions are represented here. Broken graph
//! invariants are bugs and panic instead of surfacing as an [`HnswError`].

use thiserror::Error;

/// Errors returned by [`HnswIndex`](crate::hnsw::HnswIndex) operations.
#[derive(Debug, Error)]
pub enum HnswError {
    /// Vector length differs from the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The configured index dimension.
        expected: usize,
        /// The length of the supplied vector.
        actual: usize,
    },

    /// Search was issued against an index with no nodes.
    #[error("index is empty")]
    EmptyIndex,

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A vector component is NaN or infinite.
    #[error("invalid value at index {index}: {value}")]
    InvalidVector {
        /// Position of the offending component.
        index: usize,
        /// The offending value.
        value: f32,
    },

    /// A zero vector was supplied while the index uses cosine distance.
    #[error("zero-norm vector has no cosine distance")]
    ZeroNorm,

    /// A call parameter is out of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A node id does not exist in the index.
    #[error("node not found: {0}")]
    NodeNotFound(usize),

    /// The external vector store failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HnswError>;
