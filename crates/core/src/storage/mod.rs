//! Vector storage collaborators.
//!
//! The index keeps its graph in memory and does not persist it. Callers that
//! also want the raw vectors on durable storage plug in a [`VectorStore`]:
//! the index hands over `(id, vector)` and keeps the returned offset opaque.

/// Append-only framed vector file with CRC32 checksums.
pub mod vector_log;

pub use vector_log::{FileVectorStore, StoredVector};

use parking_lot::RwLock;
use std::io;

/// External storage for raw vectors, addressed by the offset it returns.
pub trait VectorStore: Send + Sync {
    /// Persist `vector` for node `id`, returning where it was written.
    fn write(&self, id: usize, vector: &[f32]) -> io::Result<u64>;

    /// Read back the vector written at `offset`.
    fn read(&self, offset: u64) -> io::Result<Vec<f32>>;
}

/// In-memory [`VectorStore`]. Offsets are slot positions.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    slots: RwLock<Vec<(usize, Box<[f32]>)>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Node id recorded for the slot at `offset`.
    pub fn id_at(&self, offset: u64) -> Option<usize> {
        self.slots.read().get(offset as usize).map(|(id, _)| *id)
    }
}

impl VectorStore for MemoryVectorStore {
    fn write(&self, id: usize, vector: &[f32]) -> io::Result<u64> {
        let mut slots = self.slots.write();
        let offset = slots.len() as u64;
        slots.push((id, vector.into()));
        Ok(offset)
    }

    fn read(&self, offset: u64) -> io::Result<Vec<f32>> {
        self.slots
            .read()
            .get(offset as usize)
            .map(|(_, v)| v.to_vec())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no vector at offset {offset}"),
                )
            })
    }
}
