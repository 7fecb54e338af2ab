//! Thread-side state of an upload worker.
//!
//! The scheduler owns the uploader and the delay controller. Scheduled
//! cycles and flushes both run on the worker thread, one command at a time.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use crate::{
    config::UploadCondition,
    delay::Delay,
    rate_limited_warner::RateLimitedWarner,
    storage::BatchReader,
    upload::{DataUploader, UploadStatus},
};

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Commands processed by the worker thread.
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    /// Drain storage now and report the drain result.
    Flush(Sender<bool>),
    Cancel,
}

/// What one scheduled cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    /// The system was not ready or storage had nothing to upload.
    Idle,
    /// The batch was released from storage.
    Delivered(UploadStatus),
    /// The batch stays in storage for a later cycle.
    Retained(UploadStatus),
}

pub(crate) struct Scheduler {
    reader: Arc<dyn BatchReader>,
    uploader: DataUploader,
    upload_condition: UploadCondition,
    delay: Box<dyn Delay>,
    // Batches a flush left in storage after a retryable failure.
    abandoned: RateLimitedWarner,
    // Batches the collector refused for good and that were dropped.
    rejected: RateLimitedWarner,
}

impl Scheduler {
    pub(crate) fn new(
        reader: Arc<dyn BatchReader>,
        uploader: DataUploader,
        upload_condition: UploadCondition,
        delay: Box<dyn Delay>,
        warn_interval: Duration,
    ) -> Self {
        Self {
            reader,
            uploader,
            upload_condition,
            delay,
            abandoned: RateLimitedWarner::new(warn_interval),
            rejected: RateLimitedWarner::new(warn_interval),
        }
    }

    pub(crate) fn run(mut self, rx: Receiver<WorkerCommand>) {
        let mut next_cycle = deadline_after(self.delay.current());
        loop {
            match rx.recv_deadline(next_cycle) {
                Err(RecvTimeoutError::Timeout) => {
                    self.run_cycle();
                    next_cycle = deadline_after(self.delay.current());
                }
                Ok(WorkerCommand::Flush(ack)) => {
                    let drained = self.flush();
                    // The caller may have given up waiting.
                    let _ = ack.send(drained);
                }
                Ok(WorkerCommand::Cancel) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.report_pending();
        debug!("{} upload worker stopped", self.uploader.feature());
    }

    /// Perform one upload cycle and adjust the pacing interval.
    pub(crate) fn run_cycle(&mut self) -> CycleOutcome {
        let batch = if (self.upload_condition)() {
            self.reader.read_next_batch()
        } else {
            None
        };

        let outcome = match batch {
            None => {
                self.delay.increase();
                CycleOutcome::Idle
            }
            Some(batch) => {
                let status = self.uploader.upload(&batch.data);
                let outcome = if status.needs_retry() {
                    self.delay.increase();
                    CycleOutcome::Retained(status)
                } else {
                    self.reader.mark_batch_as_read(&batch);
                    if status.is_rejected() {
                        self.rejected.record_drop();
                    }
                    self.delay.decrease();
                    CycleOutcome::Delivered(status)
                };
                self.warn_if_due();
                outcome
            }
        };
        debug!(
            "{} upload cycle: {outcome:?}, next in {:?}",
            self.uploader.feature(),
            self.delay.current()
        );
        outcome
    }

    /// Upload every remaining batch once, ignoring the retry policy.
    ///
    /// Batches that fail stay in storage but are not retried by this flush.
    pub(crate) fn flush(&mut self) -> bool {
        let reader = &self.reader;
        let uploader = &self.uploader;
        let (abandoned_warner, rejected_warner) = (&self.abandoned, &self.rejected);
        let mut abandoned = 0_u64;
        let drained = reader.on_remaining_batches(&mut |batch| {
            let status = uploader.upload(&batch.data);
            if status.needs_retry() {
                abandoned += 1;
                abandoned_warner.record_drop();
            } else {
                reader.mark_batch_as_read(batch);
                if status.is_rejected() {
                    rejected_warner.record_drop();
                }
            }
        });

        if drained && abandoned == 0 {
            self.delay.reset();
        }
        self.warn_if_due();
        debug!(
            "{} flush finished: drained={drained}, abandoned={abandoned}",
            self.uploader.feature()
        );
        drained
    }

    /// Report drops, at most once per warning interval and kind.
    fn warn_if_due(&self) {
        let feature = self.uploader.feature();
        self.abandoned.warn_if_due(|count| abandoned_warning(feature, count));
        self.rejected.warn_if_due(|count| rejected_warning(feature, count));
    }

    /// Report every drop not yet reported, regardless of the interval.
    fn report_pending(&self) {
        let feature = self.uploader.feature();
        self.abandoned.flush(|count| abandoned_warning(feature, count));
        self.rejected.flush(|count| rejected_warning(feature, count));
    }
}

fn abandoned_warning(feature: &str, count: u64) {
    warn!("{feature} upload worker abandoned {count} batches during flush");
}

fn rejected_warning(feature: &str, count: u64) {
    warn!("{feature} upload worker dropped {count} batches the collector rejected");
}

fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or(now + FAR_FUTURE)
}
