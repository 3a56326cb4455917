//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, ef_search, distance metric).
//! [`HnswIndex`] owns the node arena and the entry-point state, and is shared
//! across threads by reference: every operation takes `&self`.
//!
//! Locking is split three ways:
//! - `entry` guards the entry point and max level only;
//! - `nodes` guards the arena vector itself (append and lookup, never held across work);
//! - each [`Node`] guards its own neighbor lists.
//!
//! Acquisition order is entry → node → arena. Re-pruning holds a node's
//! write lock while reading the arena; nothing takes a node lock while
//! holding the arena lock, and no code path takes the entry lock while
//! holding an arena or node lock.

use crate::config;
use crate::error::{HnswError, Result};
use crate::hnsw::distance::DistanceMetric;
use crate::hnsw::node::Node;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Neighbor selection policy applied when connecting and re-pruning nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborSelection {
    /// Keep the `m` closest candidates.
    Simple,
    /// Diversity-aware selection (Algorithm 4 of the HNSW paper): skip a
    /// candidate that is closer to an already selected neighbor than to the
    /// base vector, then back-fill with the closest skipped candidates.
    #[default]
    Heuristic,
}

/// Configuration parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, recall, and memory usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Length of every vector stored in the index.
    pub dimension: usize,
    /// Maximum links per node on layers ≥ 1 (`Mmax`).
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Candidate list size used by [`HnswIndex::search_default`].
    pub ef_search: usize,
    /// Level multiplier `mL`; levels are drawn as `floor(-ln(U) * mL)`.
    pub level_multiplier: f64,
    /// Highest level a node may be assigned.
    pub max_level_cap: usize,
    /// Distance function for similarity computation.
    pub distance_metric: DistanceMetric,
    /// Neighbor selection policy.
    pub neighbor_selection: NeighborSelection,
    /// RNG seed for level assignment. `None` derives one from the clock.
    pub seed: Option<u64>,
}

impl HnswConfig {
    /// Default configuration for vectors of length `dimension`
    /// (squared L2, M=16, ef_construction=200).
    pub fn new(dimension: usize) -> Self {
        let m = config::HNSW_DEFAULT_M;
        Self {
            dimension,
            m,
            m_max0: m * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            level_multiplier: level_multiplier_for(m),
            max_level_cap: config::HNSW_DEFAULT_MAX_LEVEL,
            distance_metric: DistanceMetric::Euclidean,
            neighbor_selection: NeighborSelection::Heuristic,
            seed: None,
        }
    }

    /// Set `M`, resetting `m_max0` to `2 * m` and the level multiplier to `1/ln(m)`.
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self.m_max0 = m.saturating_mul(2);
        self.level_multiplier = level_multiplier_for(m);
        self
    }

    pub fn with_m_max0(mut self, m_max0: usize) -> Self {
        self.m_max0 = m_max0;
        self
    }

    pub fn with_ef_construction(mut self, ef_construction: usize) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search;
        self
    }

    pub fn with_distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    pub fn with_neighbor_selection(mut self, selection: NeighborSelection) -> Self {
        self.neighbor_selection = selection;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// `Mmax`, the degree bound on layers ≥ 1.
    #[inline]
    pub fn m_max(&self) -> usize {
        self.m
    }

    /// Degree bound for a node's neighbor list at `layer`.
    #[inline]
    pub fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(HnswError::InvalidConfig("dimension must be > 0".into()));
        }
        if self.dimension > config::MAX_DIMENSION {
            return Err(HnswError::InvalidConfig(format!(
                "dimension {} exceeds maximum {}",
                self.dimension,
                config::MAX_DIMENSION
            )));
        }
        if self.m < config::HNSW_MIN_M {
            return Err(HnswError::InvalidConfig(format!(
                "m must be >= {}, got {}",
                config::HNSW_MIN_M,
                self.m
            )));
        }
        if self.m > config::HNSW_MAX_M {
            return Err(HnswError::InvalidConfig(format!(
                "m must be <= {}, got {}",
                config::HNSW_MAX_M,
                self.m
            )));
        }
        if self.m_max0 > 2 * config::HNSW_MAX_M {
            return Err(HnswError::InvalidConfig(format!(
                "m_max0 must be <= {}, got {}",
                2 * config::HNSW_MAX_M,
                self.m_max0
            )));
        }
        if self.m_max0 < self.m {
            return Err(HnswError::InvalidConfig(format!(
                "m_max0 ({}) must be >= m ({})",
                self.m_max0, self.m
            )));
        }
        if self.ef_construction == 0 {
            return Err(HnswError::InvalidConfig("ef_construction must be > 0".into()));
        }
        if self.ef_construction > config::HNSW_MAX_EF_CONSTRUCTION {
            return Err(HnswError::InvalidConfig(format!(
                "ef_construction must be <= {}, got {}",
                config::HNSW_MAX_EF_CONSTRUCTION,
                self.ef_construction
            )));
        }
        if self.ef_search == 0 {
            return Err(HnswError::InvalidConfig("ef_search must be > 0".into()));
        }
        if !self.level_multiplier.is_finite() || self.level_multiplier <= 0.0 {
            return Err(HnswError::InvalidConfig(format!(
                "level_multiplier must be finite and > 0, got {}",
                self.level_multiplier
            )));
        }
        Ok(())
    }
}

fn level_multiplier_for(m: usize) -> f64 {
    1.0 / (m as f64).ln()
}

/// Entry point and top level, updated together.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EntryState {
    pub entry_point: Option<u32>,
    pub max_level: usize,
}

/// Summary of the graph shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub node_count: usize,
    pub max_level: usize,
    /// `nodes_per_layer[l]` = number of nodes present in layer `l`.
    pub nodes_per_layer: Vec<usize>,
    /// Mean outgoing degree at layer 0.
    pub avg_degree_layer0: f64,
}

/// Concurrent HNSW index over fixed-dimension `f32` vectors.
///
/// Nodes live in an append-only arena and refer to each other by `u32` id.
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) nodes: RwLock<Vec<Arc<Node>>>,
    pub(crate) entry: RwLock<EntryState>,
    rng: Mutex<StdRng>,
}

impl HnswIndex {
    /// Creates a new empty index after validating `config`.
    pub fn new(config: HnswConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(clock_seed);
        tracing::debug!(
            dimension = config.dimension,
            m = config.m,
            ef_construction = config.ef_construction,
            metric = ?config.distance_metric,
            seed,
            "HNSW index created"
        );
        Ok(Self {
            config,
            nodes: RwLock::new(Vec::new()),
            entry: RwLock::new(EntryState::default()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    /// Creates a new empty index with default configuration (squared L2, M=16, ef_c=200).
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        Self::new(HnswConfig::new(dimension))
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Returns the number of nodes in the index.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns `true` if the index contains no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current entry point id, `None` while empty.
    pub fn entry_point(&self) -> Option<usize> {
        self.entry.read().entry_point.map(|id| id as usize)
    }

    /// Highest level among inserted nodes (0 while empty).
    pub fn max_level(&self) -> usize {
        self.entry.read().max_level
    }

    /// Copy of the stored vector for `id`.
    pub fn vector(&self, id: usize) -> Option<Vec<f32>> {
        self.try_node(id).map(|n| n.vector().to_vec())
    }

    /// Level assigned to node `id`.
    pub fn level(&self, id: usize) -> Option<usize> {
        self.try_node(id).map(|n| n.level())
    }

    /// Snapshot of node `id`'s neighbors at `layer`. `None` if the node does
    /// not exist or does not reach `layer`.
    pub fn neighbors(&self, id: usize, layer: usize) -> Option<Vec<u32>> {
        let node = self.try_node(id)?;
        (layer <= node.level()).then(|| node.neighbors(layer))
    }

    /// Generate a random layer for a new node using exponential distribution.
    pub fn random_level(&self) -> usize {
        // 1 - [0, 1) keeps the argument of ln() strictly positive
        let r: f64 = 1.0 - self.rng.lock().gen::<f64>();
        let level = (-r.ln() * self.config.level_multiplier).floor() as usize;
        level.min(self.config.max_level_cap)
    }

    #[inline]
    pub(crate) fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.config.distance_metric.distance(a, b)
    }

    pub(crate) fn try_node(&self, id: usize) -> Option<Arc<Node>> {
        self.nodes.read().get(id).cloned()
    }

    /// Node lookup for ids taken from the graph itself.
    pub(crate) fn node(&self, id: u32) -> Arc<Node> {
        self.try_node(id as usize)
            .unwrap_or_else(|| panic!("graph references missing node {id}"))
    }

    /// Resolve several ids under a single arena read lock.
    pub(crate) fn nodes_by_id(&self, ids: &[u32]) -> Vec<Arc<Node>> {
        let nodes = self.nodes.read();
        ids.iter()
            .map(|&id| {
                nodes
                    .get(id as usize)
                    .cloned()
                    .unwrap_or_else(|| panic!("graph references missing node {id}"))
            })
            .collect()
    }

    /// Append a fully built node to the arena. The id is the arena position.
    pub(crate) fn publish(&self, build: impl FnOnce(u32) -> Node) -> u32 {
        let mut nodes = self.nodes.write();
        let id = u32::try_from(nodes.len()).unwrap_or_else(|_| panic!("node arena exceeds u32 ids"));
        nodes.push(Arc::new(build(id)));
        id
    }

    /// Reject vectors the index cannot store or query.
    pub(crate) fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(HnswError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        if let Some((index, &value)) = vector.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(HnswError::InvalidVector { index, value });
        }
        if self.config.distance_metric.requires_nonzero_norm() && vector.iter().all(|&v| v == 0.0)
        {
            return Err(HnswError::ZeroNorm);
        }
        Ok(())
    }

    /// Validate graph invariants.
    ///
    /// Checks entry point consistency, per-node layer membership, degree
    /// bounds, neighbor id ranges and levels, duplicates, self loops, and
    /// layer-0 reachability of every node once two or more exist. Intended for
    /// a quiescent index; concurrent inserts can make it report transient states.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let entry = *self.entry.read();
        let nodes: Vec<Arc<Node>> = self.nodes.read().clone();
        let n = nodes.len();

        match entry.entry_point {
            None if n == 0 => return Ok(()),
            None => return Err(format!("{n} nodes but no entry point")),
            Some(ep) if ep as usize >= n => {
                return Err(format!("entry point {ep} out of bounds (len {n})"))
            }
            Some(ep) => {
                let ep_level = nodes[ep as usize].level();
                if ep_level != entry.max_level {
                    return Err(format!(
                        "entry point level {ep_level} != max_level {}",
                        entry.max_level
                    ));
                }
            }
        }

        let top = nodes.iter().map(|n| n.level()).max().unwrap_or(0);
        if top != entry.max_level {
            return Err(format!(
                "highest node level {top} != max_level {}",
                entry.max_level
            ));
        }

        let mut has_layer0_edge = vec![false; n];
        for (idx, node) in nodes.iter().enumerate() {
            if node.id() as usize != idx {
                return Err(format!("node at position {idx} has id {}", node.id()));
            }
            let connections = node.connections_snapshot();
            if connections.len() != node.level() + 1 {
                return Err(format!(
                    "node {idx} at level {} has {} neighbor lists",
                    node.level(),
                    connections.len()
                ));
            }
            for (layer, list) in connections.iter().enumerate() {
                let bound = self.config.max_connections(layer);
                if list.len() > bound {
                    return Err(format!(
                        "node {idx} has {} neighbors at layer {layer} (bound {bound})",
                        list.len()
                    ));
                }
                let mut seen = HashSet::with_capacity(list.len());
                for &nb in list {
                    let nbu = nb as usize;
                    if nbu == idx {
                        return Err(format!("node {idx} links to itself at layer {layer}"));
                    }
                    if nbu >= n {
                        return Err(format!(
                            "node {idx} references missing node {nb} at layer {layer}"
                        ));
                    }
                    if !seen.insert(nb) {
                        return Err(format!("node {idx} lists {nb} twice at layer {layer}"));
                    }
                    if nodes[nbu].level() < layer {
                        return Err(format!(
                            "node {idx} links to {nb} at layer {layer} above its level {}",
                            nodes[nbu].level()
                        ));
                    }
                    if layer == 0 {
                        has_layer0_edge[idx] = true;
                        has_layer0_edge[nbu] = true;
                    }
                }
            }
        }

        if n >= 2 {
            if let Some(isolated) = has_layer0_edge.iter().position(|&e| !e) {
                return Err(format!("node {isolated} has no layer-0 connection"));
            }
        }
        Ok(())
    }

    /// Summary statistics of the current graph.
    pub fn stats(&self) -> IndexStats {
        let max_level = self.max_level();
        let nodes: Vec<Arc<Node>> = self.nodes.read().clone();
        let mut nodes_per_layer = vec![0usize; if nodes.is_empty() { 0 } else { max_level + 1 }];
        let mut layer0_edges = 0usize;
        for node in &nodes {
            for count in nodes_per_layer.iter_mut().take(node.level() + 1) {
                *count += 1;
            }
            layer0_edges += node.degree(0);
        }
        let avg_degree_layer0 = if nodes.is_empty() {
            0.0
        } else {
            layer0_edges as f64 / nodes.len() as f64
        };
        IndexStats {
            node_count: nodes.len(),
            max_level,
            nodes_per_layer,
            avg_degree_layer0,
        }
    }
}

impl fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = *self.entry.read();
        f.debug_struct("HnswIndex")
            .field("len", &self.len())
            .field("dimension", &self.config.dimension)
            .field("metric", &self.config.distance_metric)
            .field("entry_point", &entry.entry_point)
            .field("max_level", &entry.max_level)
            .finish()
    }
}

#[allow(clippy::cast_possible_truncation)] // nanos truncation is fine for seeding
fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}
