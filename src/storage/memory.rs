//! In-memory FIFO batch store.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{Batch, BatchId, BatchReader};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    batches: VecDeque<Batch>,
}

/// Batches held in memory in write order.
///
/// Useful for processes without a writable disk and as a test collaborator.
#[derive(Debug, Default)]
pub struct MemoryBatchStore {
    inner: Mutex<Inner>,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch and return its handle.
    pub fn write(&self, data: impl Into<Vec<u8>>) -> BatchId {
        let mut inner = self.inner.lock();
        let id = BatchId::new(format!("{:020}", inner.next_id));
        inner.next_id += 1;
        inner.batches.push_back(Batch::new(id.clone(), data.into()));
        id
    }

    pub fn len(&self) -> usize {
        self.inner.lock().batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payloads of all stored batches, oldest first.
    pub fn contents(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .batches
            .iter()
            .map(|batch| batch.data.clone())
            .collect()
    }
}

impl BatchReader for MemoryBatchStore {
    fn read_next_batch(&self) -> Option<Batch> {
        self.inner.lock().batches.front().cloned()
    }

    fn mark_batch_as_read(&self, batch: &Batch) {
        self.inner.lock().batches.retain(|stored| stored.id != batch.id);
    }

    fn on_remaining_batches(&self, action: &mut dyn FnMut(&Batch)) -> bool {
        // Snapshot so that `action` can take the lock to acknowledge batches.
        let snapshot: Vec<Batch> = self.inner.lock().batches.iter().cloned().collect();
        for batch in &snapshot {
            action(batch);
        }
        true
    }
}
