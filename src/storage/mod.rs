//! Storage contract consumed by the upload worker.
//!
//! The worker never owns batches. It asks a [`BatchReader`] for the next
//! batch, and acknowledges delivered batches through the same reader.
//! Readers are shared with producers, so implementations synchronise
//! internally.

mod directory;
mod memory;

pub use directory::DirectoryBatchStore;
pub use memory::MemoryBatchStore;

use std::fmt;

/// Opaque handle identifying a stored batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One already-serialized unit of upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub id: BatchId,
    pub data: Vec<u8>,
}

impl Batch {
    pub fn new(id: BatchId, data: Vec<u8>) -> Self {
        Self { id, data }
    }
}

/// Source of batches for one feature.
pub trait BatchReader: Send + Sync {
    /// The oldest batch still eligible for upload, if any.
    fn read_next_batch(&self) -> Option<Batch>;

    /// Delete `batch`; it will not be returned again.
    fn mark_batch_as_read(&self, batch: &Batch);

    /// Invoke `action` for every remaining batch, oldest first.
    ///
    /// `action` may call [`mark_batch_as_read`](Self::mark_batch_as_read).
    /// Returns whether every remaining batch was visited.
    fn on_remaining_batches(&self, action: &mut dyn FnMut(&Batch)) -> bool;
}

impl<T: BatchReader + ?Sized> BatchReader for std::sync::Arc<T> {
    fn read_next_batch(&self) -> Option<Batch> {
        (**self).read_next_batch()
    }

    fn mark_batch_as_read(&self, batch: &Batch) {
        (**self).mark_batch_as_read(batch);
    }

    fn on_remaining_batches(&self, action: &mut dyn FnMut(&Batch)) -> bool {
        (**self).on_remaining_batches(action)
    }
}
