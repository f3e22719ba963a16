//! An append-only log of completed delta ids
//!
//! The log rehydrates the builder's completion set across restarts so that
//! fragments of already-reconstructed deltas stay no-ops. Records are 32-byte
//! fixed-width delta ids; on startup the file is truncated to the newest
//! `horizon` records.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use common::types::smpc::DeltaId;

/// The width of one log record
const RECORD_BYTES: usize = 32;

/// The mutable state behind a completion log
struct CompletionLogInner {
    /// The open append handle
    file: File,
    /// The newest `horizon` ids, oldest first
    recent: VecDeque<DeltaId>,
}

/// An append-only file of completed delta ids
pub struct CompletionLog {
    /// The number of records retained across restarts
    horizon: usize,
    /// The log state, behind a lock so builder insertions serialize appends
    inner: Mutex<CompletionLogInner>,
}

impl CompletionLog {
    /// Open the log at the given path, truncating it to the newest `horizon`
    /// records
    pub fn open(path: &Path, horizon: usize) -> io::Result<Self> {
        let mut recent = VecDeque::with_capacity(horizon);
        if path.exists() {
            let bytes = std::fs::read(path)?;
            // A torn trailing record from an interrupted append is dropped
            for record in bytes.chunks_exact(RECORD_BYTES) {
                let mut id = [0u8; RECORD_BYTES];
                id.copy_from_slice(record);
                recent.push_back(DeltaId(id));
                if recent.len() > horizon {
                    recent.pop_front();
                }
            }
        }

        let mut file =
            OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        for id in &recent {
            file.write_all(&id.0)?;
        }
        file.flush()?;

        Ok(Self { horizon, inner: Mutex::new(CompletionLogInner { file, recent }) })
    }

    /// Append a completed delta id
    pub fn append(&self, id: &DeltaId) -> io::Result<()> {
        let mut inner = self.inner.lock().expect("completion log lock poisoned");
        inner.file.write_all(&id.0)?;
        inner.file.flush()?;

        inner.recent.push_back(*id);
        if inner.recent.len() > self.horizon {
            inner.recent.pop_front();
        }

        Ok(())
    }

    /// The newest retained ids, oldest first
    pub fn recent(&self) -> Vec<DeltaId> {
        self.inner.lock().expect("completion log lock poisoned").recent.iter().copied().collect()
    }
}
