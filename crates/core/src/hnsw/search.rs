//! HNSW search algorithms: single-layer greedy search and multi-layer KNN.
//!
//! Neighbor lists are copied out under each node's read lock before any
//! distance is computed, so traversal never holds a lock while working and
//! runs alongside concurrent insertions.

use crate::error::{HnswError, Result};
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::heap::{BoundedMaxHeap, Candidate, CandidateQueue};
use crate::hnsw::visited::VisitedSet;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

thread_local! {
    /// Thread-local VisitedSet pool for search and insert traversals.
    /// Avoids a per-query allocation by reusing the set on the same thread.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// Run `f` with this thread's reusable visited set.
///
/// `f` must not re-enter `with_visited`.
pub(crate) fn with_visited<R>(capacity: usize, f: impl FnOnce(&mut VisitedSet) -> R) -> R {
    SEARCH_VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.ensure_capacity(capacity);
        f(&mut visited)
    })
}

/// A search hit: node id and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: usize,
    pub distance: f32,
}

impl From<Candidate> for SearchResult {
    fn from(c: Candidate) -> Self {
        Self {
            id: c.id as usize,
            distance: c.distance(),
        }
    }
}

/// Greedy best-first search of a single layer.
///
/// Returns up to `ef` nodes closest to `query` reachable from `entry_id` at
/// `layer`, nearest first. `visited` is cleared at the start of each call.
pub(crate) fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry_id: u32,
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<Candidate> {
    visited.clear();
    // A pool larger than the graph only costs memory
    let ef = ef.clamp(1, index.len().max(1));
    let mut candidates = CandidateQueue::with_capacity(ef.saturating_mul(2));
    let mut results = BoundedMaxHeap::new(ef);

    let entry = index.node(entry_id);
    visited.insert(entry_id);
    let start = Candidate::new(index.distance(query, entry.vector()), entry_id);
    candidates.push(start);
    results.push(start);

    while let Some(current) = candidates.pop() {
        // Closest remaining candidate is worse than everything kept: stop
        if results.is_full() && current.distance() > results.worst_distance() {
            break;
        }

        let unvisited: Vec<u32> = index
            .node(current.id)
            .neighbors(layer)
            .into_iter()
            .filter(|&id| visited.insert(id))
            .collect();
        if unvisited.is_empty() {
            continue;
        }

        for neighbor in index.nodes_by_id(&unvisited) {
            let dist = index.distance(query, neighbor.vector());
            if results.accepts(dist) {
                let candidate = Candidate::new(dist, neighbor.id());
                candidates.push(candidate);
                results.push(candidate);
            }
        }
    }

    results.into_sorted_vec()
}

/// Descend from `max_level` to layer 1 with `ef = 1`, returning the closest
/// node found on layer 1 (or `entry_id` when the graph has a single layer).
pub(crate) fn greedy_descend(
    index: &HnswIndex,
    query: &[f32],
    entry_id: u32,
    from_level: usize,
    to_level: usize,
    visited: &mut VisitedSet,
) -> u32 {
    let mut current = entry_id;
    for layer in (to_level..=from_level).rev() {
        if let Some(nearest) = search_layer(index, query, current, 1, layer, visited).first() {
            current = nearest.id;
        }
    }
    current
}

impl HnswIndex {
    /// Find the `k` approximate nearest neighbors of `query`.
    ///
    /// `ef` is the layer-0 candidate pool size; when `ef < k` it is widened to
    /// `k`, so a caller never receives fewer results than available because of
    /// an undersized pool. The pool never exceeds `len()`, so any `k` or `ef`
    /// is accepted. Returns `min(k, len())` results, nearest first.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<SearchResult>> {
        let entry = *self.entry.read();
        let Some(entry_point) = entry.entry_point else {
            return Err(HnswError::EmptyIndex);
        };
        self.check_vector(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = if ef < k {
            tracing::trace!(ef, k, "widening ef to k");
            k
        } else {
            ef
        }
        .min(self.len());

        let mut results = with_visited(self.len(), |visited| {
            let nearest = greedy_descend(self, query, entry_point, entry.max_level, 1, visited);
            search_layer(self, query, nearest, ef, 0, visited)
        });
        results.truncate(k);
        Ok(results.into_iter().map(SearchResult::from).collect())
    }

    /// [`search`](Self::search) with the configured `ef_search`.
    pub fn search_default(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.search(query, k, self.config.ef_search)
    }

    /// Search a single layer starting from `entry_id`.
    ///
    /// Exposes the greedy layer traversal used internally, for diagnostics and
    /// for callers building their own descent strategy.
    pub fn search_layer(
        &self,
        query: &[f32],
        entry_id: usize,
        ef: usize,
        layer: usize,
    ) -> Result<Vec<SearchResult>> {
        if self.is_empty() {
            return Err(HnswError::EmptyIndex);
        }
        self.check_vector(query)?;
        if ef == 0 {
            return Err(HnswError::InvalidParameter("ef must be > 0".into()));
        }
        let entry = self
            .try_node(entry_id)
            .ok_or(HnswError::NodeNotFound(entry_id))?;
        if layer > entry.level() {
            return Err(HnswError::InvalidParameter(format!(
                "layer {layer} is above entry node level {}",
                entry.level()
            )));
        }
        let results = with_visited(self.len(), |visited| {
            search_layer(self, query, entry.id(), ef, layer, visited)
        });
        Ok(results.into_iter().map(SearchResult::from).collect())
    }
}
