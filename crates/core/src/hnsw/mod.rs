//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! This module implements the HNSW algorithm for fast approximate nearest neighbor search
//! over full-precision `f32` vectors held in memory.
//!
//! Nodes are owned by an append-only arena and reference each other by `u32`
//! id. Each node carries its own reader-writer lock over its neighbor lists,
//! and a separate narrow lock guards the entry point and max level, so
//! [`HnswIndex::add`] and [`HnswIndex::search`] can run concurrently from many
//! threads on a shared `&HnswIndex`.

/// Distance metrics: squared euclidean, inner product, and cosine.
pub mod distance;
/// HNSW graph structure, configuration, and validation.
pub mod graph;
/// Min-heap candidate frontier and bounded max-heap result set.
pub mod heap;
/// HNSW insertion algorithm with bidirectional connections and neighbor pruning.
pub mod insert;
/// Graph vertex: vector, level, and lock-protected neighbor lists.
pub mod node;
/// HNSW search: single-layer greedy search and multi-layer KNN.
pub mod search;
/// Generation-based visited set for efficient graph traversal.
pub mod visited;

pub use distance::{
    cosine_distance, inner_product_distance, l2_distance, try_cosine_distance, DistanceMetric,
};
pub use graph::{HnswConfig, HnswIndex, IndexStats, NeighborSelection};
pub use heap::{BoundedMaxHeap, Candidate, CandidateQueue};
pub use insert::select_neighbors;
pub use node::Node;
pub use search::SearchResult;
