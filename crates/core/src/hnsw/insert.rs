//! HNSW insertion algorithm.
//!
//! Inserts a vector into the HNSW graph with bidirectional connections and
//! neighbor pruning (Algorithms 1 and 4 from the HNSW paper).
//!
//! The new node's own neighbor lists are computed before it is published, so
//! concurrent readers never observe it half-built. Reciprocal edges are then
//! added one neighbor at a time under that neighbor's write lock; no global
//! write lock is held while searching for candidates.

use crate::error::{HnswError, Result};
use crate::hnsw::graph::{HnswIndex, NeighborSelection};
use crate::hnsw::heap::Candidate;
use crate::hnsw::node::Node;
use crate::hnsw::search::{greedy_descend, search_layer, with_visited};
use crate::storage::VectorStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

impl HnswIndex {
    /// Insert a vector, returning its id.
    ///
    /// Ids are assigned sequentially from 0 in publication order. Fails with
    /// [`HnswError::DimensionMismatch`] (or another validation error) before
    /// touching the graph.
    pub fn add(&self, vector: &[f32]) -> Result<usize> {
        self.check_vector(vector)?;
        Ok(self.insert(vector) as usize)
    }

    /// Insert several vectors in order.
    ///
    /// Every vector is validated before the first insertion, so a bad entry
    /// leaves the index unchanged.
    pub fn add_batch<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<Vec<usize>> {
        for v in vectors {
            self.check_vector(v.as_ref())?;
        }
        Ok(vectors
            .iter()
            .map(|v| self.insert(v.as_ref()) as usize)
            .collect())
    }

    /// Insert a vector and hand it to an external vector store.
    ///
    /// Returns `(id, offset)`. The node stays indexed if the store write
    /// fails; the error is returned as [`HnswError::Storage`].
    pub fn add_with_store<S: VectorStore + ?Sized>(
        &self,
        vector: &[f32],
        store: &S,
    ) -> Result<(usize, u64)> {
        let id = self.add(vector)?;
        let offset = store.write(id, vector)?;
        Ok((id, offset))
    }

    /// Insert a validated vector.
    fn insert(&self, vector: &[f32]) -> u32 {
        let level = self.random_level();
        let vector: Box<[f32]> = vector.into();

        let snapshot = *self.entry.read();
        let (entry_point, max_level) = match snapshot.entry_point {
            Some(ep) => (ep, snapshot.max_level),
            None => {
                let mut entry = self.entry.write();
                match entry.entry_point {
                    Some(ep) => (ep, entry.max_level),
                    None => {
                        // First node becomes the entry point with no edges
                        let id = self.publish(|id| Node::isolated(id, vector, level));
                        entry.entry_point = Some(id);
                        entry.max_level = level;
                        tracing::debug!(id, level, "first node inserted as entry point");
                        return id;
                    }
                }
            }
        };

        let top = level.min(max_level);
        let mut layers: Vec<Vec<u32>> = vec![Vec::new(); level + 1];

        with_visited(self.len(), |visited| {
            // Phase 1: greedily traverse from top layer down to node's level + 1
            let mut current =
                greedy_descend(self, &vector, entry_point, max_level, level + 1, visited);

            // Phase 2: search each remaining layer and choose the new node's neighbors
            for layer in (0..=top).rev() {
                let candidates = search_layer(
                    self,
                    &vector,
                    current,
                    self.config.ef_construction,
                    layer,
                    visited,
                );
                let selected = self.select_neighbors(&candidates, self.config.max_connections(layer));
                if let Some(nearest) = selected.first() {
                    current = nearest.id;
                }
                layers[layer] = selected.iter().map(|c| c.id).collect();
            }
        });

        let forward = layers.clone();
        let id = self.publish(|id| Node::new(id, vector, level, layers));

        // Phase 3: add reciprocal connections and prune over-capacity neighbors
        for (layer, neighbor_ids) in forward.iter().enumerate() {
            for neighbor in self.nodes_by_id(neighbor_ids) {
                self.link_back(&neighbor, id, layer);
            }
        }

        if level > max_level {
            let mut entry = self.entry.write();
            if level > entry.max_level {
                tracing::debug!(
                    id,
                    level,
                    previous_level = entry.max_level,
                    "entry point promoted"
                );
                entry.entry_point = Some(id);
                entry.max_level = level;
            }
        }

        id
    }

    /// Add `new_id` to `neighbor`'s list at `layer`, re-pruning if the list overflows.
    ///
    /// Pruning works on the list read under the same write lock, never on an
    /// earlier snapshot, so edges added concurrently by other inserts are kept
    /// in the selection.
    fn link_back(&self, neighbor: &Node, new_id: u32, layer: usize) {
        let bound = self.config.max_connections(layer);
        neighbor.with_neighbors_mut(layer, |list| {
            if list.contains(&new_id) {
                return;
            }
            list.push(new_id);
            if list.len() <= bound {
                return;
            }

            let base = neighbor.vector();
            let candidates: Vec<Candidate> = self
                .nodes_by_id(list)
                .iter()
                .map(|n| Candidate::new(self.distance(base, n.vector()), n.id()))
                .collect();
            let kept = self.select_neighbors(&candidates, bound);
            tracing::trace!(
                node = neighbor.id(),
                layer,
                before = list.len(),
                after = kept.len(),
                "pruned neighbor list"
            );
            *list = kept.iter().map(|c| c.id).collect();
        });
    }

    /// Apply the configured selection policy to `candidates`.
    pub(crate) fn select_neighbors(&self, candidates: &[Candidate], m: usize) -> Vec<Candidate> {
        let selection = self.config.neighbor_selection;
        if selection == NeighborSelection::Simple || candidates.len() <= m {
            return select_neighbors(candidates, m, selection, |_, _| 0.0);
        }

        let ids: Vec<u32> = candidates.iter().map(|c| c.id).collect();
        let nodes: HashMap<u32, Arc<Node>> = self
            .nodes_by_id(&ids)
            .into_iter()
            .map(|n| (n.id(), n))
            .collect();
        select_neighbors(candidates, m, selection, |a, b| {
            self.distance(nodes[&a].vector(), nodes[&b].vector())
        })
    }
}

/// Choose up to `m` neighbors from `candidates` (distances relative to the base vector).
///
/// If there are at most `m` candidates they are returned unchanged.
/// Otherwise the result is ordered nearest first:
/// - [`NeighborSelection::Simple`] keeps the `m` closest;
/// - [`NeighborSelection::Heuristic`] keeps a candidate only if it is at least
///   as close to the base as to every neighbor already kept, then fills any
///   remaining slots with the closest skipped candidates.
///
/// `pair_distance(a, b)` returns the distance between candidates `a` and `b`
/// and is only called by the heuristic.
pub fn select_neighbors<F>(
    candidates: &[Candidate],
    m: usize,
    selection: NeighborSelection,
    mut pair_distance: F,
) -> Vec<Candidate>
where
    F: FnMut(u32, u32) -> f32,
{
    if candidates.len() <= m {
        return candidates.to_vec();
    }

    let mut sorted = candidates.to_vec();
    sorted.sort_unstable();

    if selection == NeighborSelection::Simple {
        sorted.truncate(m);
        return sorted;
    }

    let mut selected: Vec<Candidate> = Vec::with_capacity(m);
    for &candidate in &sorted {
        if selected.len() >= m {
            break;
        }
        let is_diverse = selected
            .iter()
            .all(|s| candidate.distance() <= pair_distance(candidate.id, s.id));
        if is_diverse {
            selected.push(candidate);
        }
    }

    // If heuristic didn't fill M slots, fill remaining with closest unused candidates
    if selected.len() < m {
        let selected_ids: HashSet<u32> = selected.iter().map(|c| c.id).collect();
        for &candidate in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected_ids.contains(&candidate.id) {
                selected.push(candidate);
            }
        }
        selected.sort_unstable();
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::graph::HnswConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
            .collect()
    }

    #[test]
    fn test_select_returns_all_when_few() {
        let c = vec![Candidate::new(3.0, 1), Candidate::new(1.0, 2)];
        let out = select_neighbors(&c, 2, NeighborSelection::Heuristic, |_, _| {
            panic!("no pair distances needed")
        });
        assert_eq!(out, c, "order must be unchanged");
    }

    #[test]
    fn test_select_simple_keeps_closest() {
        let c = vec![
            Candidate::new(3.0, 1),
            Candidate::new(1.0, 2),
            Candidate::new(2.0, 3),
            Candidate::new(0.5, 4),
        ];
        let out = select_neighbors(&c, 2, NeighborSelection::Simple, |_, _| 0.0);
        let ids: Vec<u32> = out.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![4, 2]);
    }

    #[test]
    fn test_select_heuristic_prefers_diverse() {
        // Base at 0 on a line. Points: 1 at 1.0, 2 at 1.1, 3 at -1.5.
        // Point 2 is closer to point 1 (0.1) than to the base (1.1): skipped
        // in favor of point 3 on the other side.
        let pos: HashMap<u32, f32> = [(1, 1.0), (2, 1.1), (3, -1.5)].into_iter().collect();
        let c: Vec<Candidate> = pos
            .iter()
            .map(|(&id, &x)| Candidate::new(x.abs(), id))
            .collect();
        let out = select_neighbors(&c, 2, NeighborSelection::Heuristic, |a, b| {
            (pos[&a] - pos[&b]).abs()
        });
        let ids: Vec<u32> = out.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_select_heuristic_backfills_to_m() {
        // All points clustered on one side: only the first passes the
        // diversity test, the rest are back-filled nearest first.
        let pos: HashMap<u32, f32> = [(1, 1.0), (2, 1.05), (3, 1.1), (4, 1.2)]
            .into_iter()
            .collect();
        let c: Vec<Candidate> = pos.iter().map(|(&id, &x)| Candidate::new(x, id)).collect();
        let out = select_neighbors(&c, 3, NeighborSelection::Heuristic, |a, b| {
            (pos[&a] - pos[&b]).abs()
        });
        let ids: Vec<u32> = out.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_first_add_sets_entry_point() {
        let index = HnswIndex::new(HnswConfig::new(2).with_seed(1)).unwrap();
        assert_eq!(index.add(&[1.0, 1.0]).unwrap(), 0);
        assert_eq!(index.entry_point(), Some(0));
        assert_eq!(index.max_level(), index.level(0).unwrap());
        assert_eq!(index.neighbors(0, 0), Some(Vec::new()));
    }

    #[test]
    fn test_add_links_both_directions() {
        let index = HnswIndex::new(HnswConfig::new(2).with_seed(5)).unwrap();
        index.add(&[0.0, 0.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        assert_eq!(index.neighbors(0, 0), Some(vec![1]));
        assert_eq!(index.neighbors(1, 0), Some(vec![0]));
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_add_dimension_mismatch_leaves_index_unchanged() {
        let index = HnswIndex::new(HnswConfig::new(3).with_seed(1)).unwrap();
        index.add(&[1.0, 2.0, 3.0]).unwrap();
        let err = index.add(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            HnswError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_add_batch_validates_first() {
        let index = HnswIndex::new(HnswConfig::new(2).with_seed(1)).unwrap();
        let bad = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(index.add_batch(&bad).is_err());
        assert_eq!(index.len(), 0);

        let good = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        assert_eq!(index.add_batch(&good).unwrap(), vec![0, 1, 2]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_degree_bounds_hold_after_pruning() {
        let cfg = HnswConfig::new(8).with_m(4).with_ef_construction(32).with_seed(9);
        let index = HnswIndex::new(cfg).unwrap();
        for v in random_vectors(400, 8, 11) {
            index.add(&v).unwrap();
        }
        index.validate().unwrap();
        for id in 0..index.len() {
            let level = index.level(id).unwrap();
            for layer in 0..=level {
                let degree = index.neighbors(id, layer).unwrap().len();
                assert!(degree <= index.config().max_connections(layer));
            }
            assert!(index.neighbors(id, level + 1).is_none());
        }
    }

    #[test]
    fn test_simple_selection_builds_valid_graph() {
        let cfg = HnswConfig::new(6)
            .with_m(5)
            .with_neighbor_selection(NeighborSelection::Simple)
            .with_seed(21);
        let index = HnswIndex::new(cfg).unwrap();
        let vectors = random_vectors(300, 6, 4);
        index.add_batch(&vectors).unwrap();
        index.validate().unwrap();
        let hits = index.search(&vectors[17], 1, 64).unwrap();
        assert_eq!(hits[0].id, 17);
    }

    #[test]
    fn test_link_back_reprunes_overflowing_list() {
        let cfg = HnswConfig::new(1)
            .with_m(2)
            .with_neighbor_selection(NeighborSelection::Simple);
        let index = HnswIndex::new(cfg).unwrap();
        // Hub at 0.0 already holding m_max0 = 4 neighbors at 1..=4
        index.publish(|id| Node::new(id, vec![0.0].into_boxed_slice(), 0, vec![vec![1, 2, 3, 4]]));
        for x in 1..=4 {
            index.publish(|id| Node::new(id, vec![x as f32].into_boxed_slice(), 0, vec![vec![0]]));
        }
        let newcomer = index.publish(|id| Node::new(id, vec![0.5].into_boxed_slice(), 0, vec![vec![0]]));
        index.entry.write().entry_point = Some(0);

        let hub = index.node(0);
        index.link_back(&hub, newcomer, 0);
        assert_eq!(hub.neighbors(0), vec![newcomer, 1, 2, 3]);

        // Linking again is a no-op
        index.link_back(&hub, newcomer, 0);
        assert_eq!(hub.degree(0), 4);
        index.validate().unwrap();
    }

    #[test]
    fn test_largest_accepted_config_inserts() {
        let cfg = HnswConfig::new(3)
            .with_m(crate::config::HNSW_MAX_M)
            .with_ef_construction(crate::config::HNSW_MAX_EF_CONSTRUCTION)
            .with_seed(11);
        let index = HnswIndex::new(cfg).unwrap();
        let vectors = random_vectors(40, 3, 21);
        index.add_batch(&vectors).unwrap();
        index.validate().unwrap();
        let hits = index.search(&vectors[5], 1, usize::MAX).unwrap();
        assert_eq!(hits[0].id, 5);
    }

    #[test]
    fn test_add_with_memory_store() {
        let index = HnswIndex::new(HnswConfig::new(2).with_seed(1)).unwrap();
        let store = crate::storage::MemoryVectorStore::new();
        let (id, offset) = index.add_with_store(&[1.0, 2.0], &store).unwrap();
        assert_eq!(id, 0);
        assert_eq!(store.read(offset).unwrap(), vec![1.0, 2.0]);
    }
}
