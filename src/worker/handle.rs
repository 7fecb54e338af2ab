//! Caller-side handle for an upload worker thread.

use std::{
    fmt,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::warn;
use parking_lot::Mutex;

use crate::{
    config::{ConfigError, UploadCondition},
    delay::Delay,
    storage::BatchReader,
    upload::DataUploader,
};

use super::scheduler::{Scheduler, WorkerCommand};

/// Commands queued beyond this block the caller until the worker catches up.
const COMMAND_CAPACITY: usize = 16;

/// Pieces the builder hands over to a new worker thread.
pub(crate) struct WorkerParts {
    pub(crate) reader: Arc<dyn BatchReader>,
    pub(crate) uploader: DataUploader,
    pub(crate) upload_condition: UploadCondition,
    pub(crate) delay: Box<dyn Delay>,
    pub(crate) warn_interval: Duration,
}

/// Background uploader for one telemetry feature.
///
/// A dedicated thread named `upload-<feature>` repeatedly takes the oldest
/// batch from storage, uploads it, and paces itself with the configured
/// [`Delay`]. [`flush`](Self::flush) drains storage on the same thread, so a
/// flush never overlaps a scheduled cycle. Dropping the worker cancels it.
pub struct UploadWorker {
    feature: String,
    url: String,
    tx: Mutex<Option<Sender<WorkerCommand>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl UploadWorker {
    pub(crate) fn spawn(parts: WorkerParts) -> Result<Self, ConfigError> {
        let feature = parts.uploader.feature().to_owned();
        let url = parts.uploader.url().to_owned();
        let (tx, rx) = bounded(COMMAND_CAPACITY);
        let scheduler = Scheduler::new(
            parts.reader,
            parts.uploader,
            parts.upload_condition,
            parts.delay,
            parts.warn_interval,
        );
        let handle = thread::Builder::new()
            .name(format!("upload-{feature}"))
            .spawn(move || scheduler.run(rx))?;
        Ok(Self {
            feature,
            url,
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Upload URL including query items.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Upload all remaining batches now and wait for the result.
    ///
    /// Returns whether storage was drained completely. Batches whose upload
    /// fails are left in storage. Returns `false` once the worker has been
    /// cancelled.
    pub fn flush(&self) -> bool {
        let Some(ack_rx) = self.request_flush() else {
            return false;
        };
        ack_rx.recv().unwrap_or(false)
    }

    /// Like [`flush`](Self::flush), but gives up after `timeout`.
    ///
    /// The drain keeps running on the worker thread after a timeout.
    pub fn flush_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let Some(ack_rx) = self.request_flush() else {
            return false;
        };
        let result = match deadline {
            Some(deadline) => ack_rx.recv_deadline(deadline),
            None => ack_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match result {
            Ok(drained) => drained,
            Err(RecvTimeoutError::Timeout) => {
                warn!("{} flush timed out after {timeout:?}", self.feature);
                false
            }
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Stop scheduling cycles and wait for the worker thread to exit.
    ///
    /// An in-flight cycle or flush completes first. Cancelling is permanent
    /// and calling it again is a no-op.
    pub fn cancel(&self) {
        if let Some(tx) = self.tx.lock().take() {
            // A send error means the thread is already gone.
            let _ = tx.send(WorkerCommand::Cancel);
        }
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("{} upload worker thread panicked", self.feature);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.lock().is_none()
    }

    fn request_flush(&self) -> Option<Receiver<bool>> {
        let tx = self.tx.lock().as_ref().cloned()?;
        let (ack_tx, ack_rx) = bounded(1);
        tx.send(WorkerCommand::Flush(ack_tx)).ok()?;
        Some(ack_rx)
    }
}

impl Drop for UploadWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for UploadWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadWorker")
            .field("feature", &self.feature)
            .field("url", &self.url)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
