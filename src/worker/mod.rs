//! Periodic upload worker.
//!
//! Each worker runs on its own thread and processes a strictly serial queue
//! of commands. While idle it waits for the next cycle deadline; a cycle
//! uploads at most one batch. Flush and cancel requests arrive on the same
//! queue, so uploads within one worker never overlap.

mod handle;
mod scheduler;


pub use handle::UploadWorker;
pub(crate) use handle::WorkerParts;
