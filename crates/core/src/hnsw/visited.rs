//! Generation-based visited set for HNSW graph traversal.
//!
//! Replaces `HashSet<u32>` with O(1) array indexing. Each `clear()` increments
//! a generation counter instead of zeroing the array, making repeated searches fast.
//! The set grows on demand: concurrent inserts can publish nodes with ids
//! beyond the capacity seen when a traversal started.

/// Generation-based visited set. Replaces `HashSet<u32>` with O(1) array indexing.
/// Each `clear()` increments a generation counter; `insert()` compares against current generation.
/// Uses u16 generation to reduce full memset frequency to every 65534 clears.
#[derive(Debug)]
pub struct VisitedSet {
    data: Vec<u16>,
    generation: u16,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u16; capacity],
            generation: 1,
        }
    }

    /// Reset the set. O(1) amortized; full memset only every 65534 calls.
    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.data.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Ensure capacity covers at least `cap` elements, growing if needed.
    pub fn ensure_capacity(&mut self, cap: usize) {
        if cap > self.data.len() {
            self.data.resize(cap, 0);
        }
    }

    /// Mark `id` as visited. Returns `true` if it was NOT previously visited (i.e. newly inserted).
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        let idx = id as usize;
        if idx >= self.data.len() {
            self.ensure_capacity((idx + 1).max(self.data.len() * 2));
        }
        if self.data[idx] == self.generation {
            false
        } else {
            self.data[idx] = self.generation;
            true
        }
    }

    /// Returns `true` if `id` was visited since the last `clear()`.
    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.data
            .get(id as usize)
            .is_some_and(|&g| g == self.generation)
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new(0)
    }
}
