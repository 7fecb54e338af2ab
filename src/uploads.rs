//! Per-exporter collection of upload workers.

use log::{debug, warn};

use crate::worker::UploadWorker;

/// The upload workers of one exporter, one per telemetry feature.
///
/// Workers are independent: each has its own thread, storage and pacing.
/// This type only fans flush and shutdown out to all of them.
#[derive(Debug, Default)]
pub struct TelemetryUploads {
    workers: Vec<UploadWorker>,
}

impl TelemetryUploads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker. A worker for the same feature is cancelled and replaced.
    pub fn register(&mut self, worker: UploadWorker) -> &mut Self {
        if let Some(existing) = self
            .workers
            .iter_mut()
            .find(|existing| existing.feature() == worker.feature())
        {
            debug!("replacing upload worker for {}", worker.feature());
            *existing = worker;
        } else {
            self.workers.push(worker);
        }
        self
    }

    pub fn with_worker(mut self, worker: UploadWorker) -> Self {
        self.register(worker);
        self
    }

    pub fn worker(&self, feature: &str) -> Option<&UploadWorker> {
        self.workers.iter().find(|worker| worker.feature() == feature)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Flush every worker; true only if all of them drained completely.
    pub fn flush(&self) -> bool {
        let mut all_drained = true;
        for worker in &self.workers {
            if !worker.flush() {
                warn!("{} upload worker did not drain its storage", worker.feature());
                all_drained = false;
            }
        }
        all_drained
    }

    /// Flush and then cancel every worker.
    pub fn shutdown(&mut self) -> bool {
        let drained = self.flush();
        for worker in self.workers.drain(..) {
            worker.cancel();
        }
        drained
    }

    /// Upload URLs of all workers, in registration order.
    pub fn endpoint_urls(&self) -> Vec<&str> {
        self.workers.iter().map(UploadWorker::url).collect()
    }
}
