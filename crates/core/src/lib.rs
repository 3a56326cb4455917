//! # hnswdb-core
//!
//! Embeddable in-memory vector index with HNSW approximate nearest neighbor
//! search and thread-safe concurrent insertion.
//!
//! ```
//! use hnswdb_core::hnsw::{HnswConfig, HnswIndex};
//!
//! let index = HnswIndex::new(HnswConfig::new(3).with_seed(42)).unwrap();
//! index.add(&[1.0, 0.0, 0.0]).unwrap();
//! index.add(&[0.0, 1.0, 0.0]).unwrap();
//! let hits = index.search(&[0.9, 0.1, 0.0], 1, 16).unwrap();
//! assert_eq!(hits[0].id, 0);
//! ```

/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Error type and result alias.
pub mod error;
/// HNSW approximate nearest neighbor index: graph structure, search, insertion, and distance metrics.
pub mod hnsw;
/// External vector storage interface and reference stores.
pub mod storage;

pub use error::{HnswError, Result};
pub use hnsw::{DistanceMetric, HnswConfig, HnswIndex, SearchResult};
