//! Priority queues used by greedy layer search.
//!
//! [`CandidateQueue`] is the min-heap frontier of nodes still to expand.
//! [`BoundedMaxHeap`] keeps the best `ef` results seen so far, with the
//! worst one on top so it can be tested and evicted in O(1)/O(log n).
//!
//! Entries compare by `(distance, id)`: on exact distance ties the lower
//! node id counts as closer.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Upper bound on up-front allocation; larger heaps grow on demand.
const PREALLOC_LIMIT: usize = 4096;

/// A `(distance, node id)` pair ordered by distance, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    pub distance: OrderedFloat<f32>,
    pub id: u32,
}

impl Candidate {
    #[inline]
    pub fn new(distance: f32, id: u32) -> Self {
        Self {
            distance: OrderedFloat(distance),
            id,
        }
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance.0
    }
}

/// Min-heap of candidates: `pop` yields the closest entry.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl CandidateQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, candidate: Candidate) {
        self.heap.push(Reverse(candidate));
    }

    /// Remove and return the closest candidate.
    #[inline]
    pub fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop().map(|Reverse(c)| c)
    }

    #[inline]
    pub fn peek(&self) -> Option<&Candidate> {
        self.heap.peek().map(|Reverse(c)| c)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Max-heap holding at most `capacity` entries: the best results so far.
#[derive(Debug)]
pub struct BoundedMaxHeap {
    heap: BinaryHeap<Candidate>,
    capacity: usize,
}

impl BoundedMaxHeap {
    /// Creates an empty heap. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(PREALLOC_LIMIT)),
            capacity,
        }
    }

    /// Insert an entry. If that overflows the capacity, the worst entry is
    /// evicted and returned (possibly the one just pushed).
    pub fn push(&mut self, candidate: Candidate) -> Option<Candidate> {
        self.heap.push(candidate);
        if self.heap.len() > self.capacity {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Remove and return the worst (farthest) entry.
    #[inline]
    pub fn pop_max(&mut self) -> Option<Candidate> {
        self.heap.pop()
    }

    /// The worst (farthest) entry currently kept.
    #[inline]
    pub fn peek_max(&self) -> Option<&Candidate> {
        self.heap.peek()
    }

    /// Distance of the worst entry, or `f32::INFINITY` when empty.
    #[inline]
    pub fn worst_distance(&self) -> f32 {
        self.heap.peek().map_or(f32::INFINITY, Candidate::distance)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Returns `true` if an entry at `distance` would make it into the set.
    #[inline]
    pub fn accepts(&self, distance: f32) -> bool {
        !self.is_full() || distance < self.worst_distance()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consume the heap, returning entries nearest first.
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}
