//! Global configuration constants for hnswdb.
//!
//! All tuning defaults and input validation limits are defined here.
//! These are compile-time constants; per-index runtime configuration is
//! carried by [`HnswConfig`](crate::hnsw::HnswConfig).

/// Default number of bidirectional links per HNSW node on layers ≥ 1.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8 to 64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Used by [`HnswIndex::search_default`](crate::hnsw::HnswIndex::search_default).
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Upper bound on the level a node can be assigned.
///
/// The exponential level distribution makes levels above this practically
/// unreachable for realistic index sizes; the cap only guards against
/// pathological RNG draws.
pub const HNSW_DEFAULT_MAX_LEVEL: usize = 16;

/// Smallest accepted `M`. With `M = 1` the level multiplier `1/ln(M)` is undefined.
pub const HNSW_MIN_M: usize = 2;

/// Largest accepted `M`. Layer 0 may then hold up to `2 * HNSW_MAX_M` links.
pub const HNSW_MAX_M: usize = 256;

/// Largest accepted `ef_construction`.
pub const HNSW_MAX_EF_CONSTRUCTION: usize = 4096;

/// Maximum allowed vector dimension.
pub const MAX_DIMENSION: usize = 65_536;
