//! Locking variant of the rotating sink.
//!
//! # Design
//! - One mutex covers writes, rotations and the filename accessor, renames included.
//! - Guards are scoped to a single call and released on every exit path.
//! - Poisoning is reported instead of propagated as a panic.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tidelog_config::SinkConfig;

use crate::error::{SinkError, SinkResult};
use crate::record::Record;
use crate::sink::{RotatingFileSink, WriteOutcome};

/// Cloneable, thread-safe handle over one [`RotatingFileSink`].
#[derive(Debug, Clone)]
pub struct SharedRotatingFileSink {
    inner: Arc<Mutex<RotatingFileSink>>,
}

impl SharedRotatingFileSink {
    /// Share an already opened sink.
    #[must_use]
    pub fn new(sink: RotatingFileSink) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Open a sink with default collaborators and share it.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] when the base file cannot be opened.
    pub fn open(config: SinkConfig) -> SinkResult<Self> {
        RotatingFileSink::open(config).map(Self::new)
    }

    /// Locked [`RotatingFileSink::write`].
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Poisoned`] or any error of the underlying write.
    pub fn write(&self, record: &Record) -> SinkResult<WriteOutcome> {
        self.lock()?.write(record)
    }

    /// Locked [`RotatingFileSink::write_rendered`].
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Poisoned`] or any error of the underlying write.
    pub fn write_rendered(
        &self,
        timestamp: DateTime<Utc>,
        bytes: &[u8],
    ) -> SinkResult<WriteOutcome> {
        self.lock()?.write_rendered(timestamp, bytes)
    }

    /// Locked [`RotatingFileSink::flush`].
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Poisoned`] or any error of the underlying flush.
    pub fn flush(&self) -> SinkResult<()> {
        self.lock()?.flush()
    }

    /// Path of the active file, read under the lock.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Poisoned`] when a writer panicked.
    pub fn filename(&self) -> SinkResult<PathBuf> {
        Ok(self.lock()?.filename().to_path_buf())
    }

    /// Next rotation boundary, read under the lock.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Poisoned`] when a writer panicked.
    pub fn next_rotation(&self) -> SinkResult<DateTime<Utc>> {
        Ok(self.lock()?.next_rotation())
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, RotatingFileSink>> {
        self.inner.lock().map_err(|_| SinkError::Poisoned)
    }
}
