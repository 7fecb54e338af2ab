//! Directory-backed batch store: one file per batch.
//!
//! File names are the creation time in milliseconds followed by a
//! per-store sequence number, both zero padded, so lexical order is
//! creation order. Rotation, size limits and eviction are left to the
//! producer side.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use log::warn;
use parking_lot::Mutex;

use super::{Batch, BatchId, BatchReader};

/// Batches persisted as individual files in `directory`.
#[derive(Debug)]
pub struct DirectoryBatchStore {
    directory: PathBuf,
    sequence: AtomicU64,
    // Serialises writers with readers so a half-written file is never read.
    io_lock: Mutex<()>,
}

impl DirectoryBatchStore {
    /// Open `directory`, creating it when missing.
    pub fn open(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            sequence: AtomicU64::new(0),
            io_lock: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persist `data` as a new batch file.
    ///
    /// Existing files are never replaced: when another store on the same
    /// directory already took a name, the next sequence number is tried.
    pub fn write(&self, data: &[u8]) -> io::Result<BatchId> {
        let _guard = self.io_lock.lock();
        let millis = chrono::Utc::now().timestamp_millis().max(0);
        let (name, mut file) = loop {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            let name = format!("{millis:015}-{seq:010}");
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.directory.join(&name))
            {
                Ok(file) => break (name, file),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        };
        file.write_all(data)?;
        file.sync_data()?;
        Ok(BatchId::new(name))
    }

    /// Number of stored batch files.
    pub fn len(&self) -> io::Result<usize> {
        let _guard = self.io_lock.lock();
        Ok(self.batch_names()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    fn batch_names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> io::Result<Batch> {
        let data = fs::read(self.directory.join(name))?;
        Ok(Batch::new(BatchId::new(name), data))
    }
}

impl BatchReader for DirectoryBatchStore {
    fn read_next_batch(&self) -> Option<Batch> {
        let _guard = self.io_lock.lock();
        let names = match self.batch_names() {
            Ok(names) => names,
            Err(err) => {
                warn!(
                    "DirectoryBatchStore failed to list {}: {err}",
                    self.directory.display()
                );
                return None;
            }
        };
        let name = names.first()?;
        match self.load(name) {
            Ok(batch) => Some(batch),
            Err(err) => {
                warn!("DirectoryBatchStore failed to read batch {name}: {err}");
                None
            }
        }
    }

    fn mark_batch_as_read(&self, batch: &Batch) {
        let _guard = self.io_lock.lock();
        match fs::remove_file(self.directory.join(batch.id.as_str())) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("DirectoryBatchStore failed to delete batch {}: {err}", batch.id),
        }
    }

    fn on_remaining_batches(&self, action: &mut dyn FnMut(&Batch)) -> bool {
        let names = {
            let _guard = self.io_lock.lock();
            match self.batch_names() {
                Ok(names) => names,
                Err(err) => {
                    warn!(
                        "DirectoryBatchStore failed to list {}: {err}",
                        self.directory.display()
                    );
                    return false;
                }
            }
        };
        let mut completed = true;
        for name in names {
            let loaded = {
                let _guard = self.io_lock.lock();
                self.load(&name)
            };
            match loaded {
                Ok(batch) => action(&batch),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!("DirectoryBatchStore failed to read batch {name}: {err}");
                    completed = false;
                }
            }
        }
        completed
    }
}
