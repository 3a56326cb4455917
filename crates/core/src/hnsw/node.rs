//! A single vertex of the HNSW graph.
//!
//! `id`, `vector` and `level` are fixed at construction and read without
//! locking. Only the per-layer neighbor lists change after publication, so
//! they sit behind the node's own `RwLock`.

use parking_lot::RwLock;

/// Graph vertex owning its vector and per-layer adjacency.
#[derive(Debug)]
pub struct Node {
    id: u32,
    vector: Box<[f32]>,
    level: usize,
    /// `connections[layer]` holds neighbor ids in insertion order, for `layer` in `0..=level`.
    connections: RwLock<Vec<Vec<u32>>>,
}

impl Node {
    /// Build a node from fully computed neighbor lists.
    ///
    /// Panics if `connections` does not hold exactly `level + 1` layers.
    pub(crate) fn new(id: u32, vector: Box<[f32]>, level: usize, connections: Vec<Vec<u32>>) -> Self {
        assert_eq!(
            connections.len(),
            level + 1,
            "node {id} at level {level} needs one neighbor list per layer"
        );
        Self {
            id,
            vector,
            level,
            connections: RwLock::new(connections),
        }
    }

    /// Build a node with empty neighbor lists on every layer.
    pub(crate) fn isolated(id: u32, vector: Box<[f32]>, level: usize) -> Self {
        Self::new(id, vector, level, vec![Vec::new(); level + 1])
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Highest layer this node participates in.
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Copy of the neighbor list at `layer`, taken under the read lock.
    ///
    /// Returns an empty list for layers above the node's level.
    pub fn neighbors(&self, layer: usize) -> Vec<u32> {
        self.connections
            .read()
            .get(layer)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of neighbors at `layer`.
    pub fn degree(&self, layer: usize) -> usize {
        self.connections.read().get(layer).map_or(0, Vec::len)
    }

    /// Copy of every layer's neighbor list.
    pub fn connections_snapshot(&self) -> Vec<Vec<u32>> {
        self.connections.read().clone()
    }

    /// Run `f` with exclusive access to the neighbor list at `layer`.
    ///
    /// The write lock is held only for the duration of `f`.
    pub(crate) fn with_neighbors_mut<R>(&self, layer: usize, f: impl FnOnce(&mut Vec<u32>) -> R) -> R {
        let mut guard = self.connections.write();
        let list = guard.get_mut(layer).unwrap_or_else(|| {
            panic!(
                "layer {layer} above level {} of node {}",
                self.level, self.id
            )
        });
        f(list)
    }
}
